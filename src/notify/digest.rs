// src/notify/digest.rs
//! Plain-text digest rendering for a notification batch.

use crate::fingerprint::ContentKind;
use crate::model::ContentItem;

use super::NotificationBatch;

pub fn subject(batch: &NotificationBatch) -> String {
    let total = batch.total();
    let firms = batch.groups.iter().filter(|g| g.firm.is_some()).count();
    format!("firmwatch: {total} new item(s) across {firms} firm(s)")
}

pub fn render(batch: &NotificationBatch) -> String {
    let mut lines = vec![format!(
        "Found {} new item(s) from quantitative finance firms:",
        batch.total()
    )];

    for group in &batch.groups {
        lines.push(String::new());
        match &group.firm {
            Some(firm) => lines.push(format!("{firm}:")),
            None => lines.push("Unattributed:".to_string()),
        }
        for (i, item) in group.items.iter().enumerate() {
            render_item(&mut lines, i + 1, item);
        }
    }

    lines.join("\n")
}

fn render_item(lines: &mut Vec<String>, index: usize, item: &ContentItem) {
    lines.push(format!("{index}. [{}] {}", kind_label(item.kind), item.title));
    if let Some(start) = item.event_start {
        lines.push(format!("   Date: {}", start.format("%Y-%m-%d %H:%M")));
    }
    if let Some(location) = &item.event_location {
        lines.push(format!("   Location: {location}"));
    }
    if let Some(published) = item.published_at {
        lines.push(format!("   Published: {}", published.format("%Y-%m-%d")));
    }
    lines.push(format!("   URL: {}", item.source_url));
    lines.push(format!("   Source: {}", item.source_name));
}

fn kind_label(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Event => "event",
        ContentKind::JobPosting => "job",
        ContentKind::BlogPost => "blog",
        ContentKind::InvestorReport => "report",
        ContentKind::VideoTranscript => "video",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn item(title: &str, firm: Option<&str>, kind: ContentKind) -> ContentItem {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 18, 0, 0).unwrap();
        ContentItem {
            fingerprint: format!("fp-{title}"),
            kind,
            source_name: "MIT CSAIL".into(),
            source_url: "https://www.csail.mit.edu/events/quant".into(),
            firm: firm.map(str::to_string),
            title: title.into(),
            published_at: None,
            body_path: None,
            event_start: Some(now),
            event_location: Some("32-123".into()),
            notified: false,
            first_seen: now,
            last_seen: now,
        }
    }

    #[test]
    fn digest_lists_items_under_firm_headers() {
        let batch = NotificationBatch::group(vec![
            item("Quant Night", Some("Citadel"), ContentKind::Event),
            item("Campus mixer", None, ContentKind::Event),
        ]);
        let text = render(&batch);
        assert!(text.contains("Citadel:"));
        assert!(text.contains("1. [event] Quant Night"));
        assert!(text.contains("Location: 32-123"));
        assert!(text.contains("Unattributed:"));
        assert_eq!(subject(&batch), "firmwatch: 2 new item(s) across 1 firm(s)");
    }
}
