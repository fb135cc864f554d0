// src/model.rs
//! Core data model shared across the pipeline, store and notifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::ContentKind;

/// One configured origin of content (a specific event page, job portal,
/// blog index, ...). Adapters are constructed from a descriptor; the core
/// never talks to the network itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub name: String,
    pub url: String,
    pub kind: ContentKind,
}

impl SourceDescriptor {
    pub fn new(name: impl Into<String>, url: impl Into<String>, kind: ContentKind) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind,
        }
    }
}

/// A raw item as yielded by a source adapter, before detection and
/// fingerprinting. `body` carries the full payload destined for the file
/// area; `body_excerpt` is what the fingerprinter sees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawItem {
    pub kind: ContentKind,
    pub source_url: String,
    pub title: String,
    #[serde(default)]
    pub body_excerpt: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub event_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub event_location: Option<String>,
}

/// A canonical, firm-attributed, de-duplicated record as persisted by the
/// hybrid store. Identity is the fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentItem {
    pub fingerprint: String,
    pub kind: ContentKind,
    pub source_name: String,
    pub source_url: String,
    /// Canonical firm name, if attribution succeeded. Unattributed items
    /// are retained, not dropped.
    pub firm: Option<String>,
    pub title: String,
    pub published_at: Option<DateTime<Utc>>,
    /// Relative path into the file area, if a body was stored.
    pub body_path: Option<String>,
    pub event_start: Option<DateTime<Utc>>,
    pub event_location: Option<String>,
    pub notified: bool,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Input to `HybridStore::upsert`: everything the pipeline knows about an
/// item before the store assigns first/last-seen and the notified flag.
#[derive(Debug, Clone)]
pub struct CandidateItem {
    pub fingerprint: String,
    pub kind: ContentKind,
    pub source_name: String,
    pub source_url: String,
    pub firm: Option<String>,
    pub title: String,
    pub published_at: Option<DateTime<Utc>>,
    pub body: Option<String>,
    pub event_start: Option<DateTime<Utc>>,
    pub event_location: Option<String>,
}

/// Outcome of a scrape of one source in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeStatus {
    Success,
    Partial,
    Failed,
}

impl ScrapeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeStatus::Success => "success",
            ScrapeStatus::Partial => "partial",
            ScrapeStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(ScrapeStatus::Success),
            "partial" => Some(ScrapeStatus::Partial),
            "failed" => Some(ScrapeStatus::Failed),
            _ => None,
        }
    }
}

/// One record per source per run; append-only audit trail.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeLog {
    pub source_name: String,
    pub run_at: DateTime<Utc>,
    pub status: ScrapeStatus,
    /// Items successfully processed (not necessarily new).
    pub item_count: u32,
    /// Items inserted for the first time in this run.
    pub items_new: u32,
    pub error_detail: Option<String>,
}

impl ScrapeLog {
    pub fn failed(source_name: &str, run_at: DateTime<Utc>, detail: String) -> Self {
        Self {
            source_name: source_name.to_string(),
            run_at,
            status: ScrapeStatus::Failed,
            item_count: 0,
            items_new: 0,
            error_detail: Some(detail),
        }
    }
}

/// Result of one end-to-end run across all configured sources.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub sources: Vec<ScrapeLog>,
    pub items_new: u64,
    pub notifications_sent: u64,
}

impl RunSummary {
    pub fn source_counts(&self) -> (usize, usize, usize) {
        let mut ok = 0;
        let mut partial = 0;
        let mut failed = 0;
        for log in &self.sources {
            match log.status {
                ScrapeStatus::Success => ok += 1,
                ScrapeStatus::Partial => partial += 1,
                ScrapeStatus::Failed => failed += 1,
            }
        }
        (ok, partial, failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrape_status_roundtrips_through_str() {
        for s in [
            ScrapeStatus::Success,
            ScrapeStatus::Partial,
            ScrapeStatus::Failed,
        ] {
            assert_eq!(ScrapeStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(ScrapeStatus::parse("bogus"), None);
    }

    #[test]
    fn run_summary_counts_by_status() {
        let now = Utc::now();
        let summary = RunSummary {
            sources: vec![
                ScrapeLog {
                    source_name: "a".into(),
                    run_at: now,
                    status: ScrapeStatus::Success,
                    item_count: 3,
                    items_new: 1,
                    error_detail: None,
                },
                ScrapeLog::failed("b", now, "boom".into()),
            ],
            items_new: 1,
            notifications_sent: 0,
        };
        assert_eq!(summary.source_counts(), (1, 0, 1));
    }
}
