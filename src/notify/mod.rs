// src/notify/mod.rs
//! Notification decider and the consumed transport boundary.
//!
//! Items are marked notified only after the transport acknowledges
//! delivery; on failure the whole batch stays unnotified and the next run
//! retries. That makes notification at-least-once: losing a notification
//! is worse than a rare duplicate when delivery itself is flaky.

pub mod digest;
pub mod email;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{DeliveryError, StoreError};
use crate::model::ContentItem;
use crate::store::HybridStore;

/// Unnotified items grouped by firm for digest readability. Attributed
/// groups come first in firm-name order; unattributed items last.
#[derive(Debug, Clone)]
pub struct NotificationBatch {
    pub groups: Vec<FirmGroup>,
}

#[derive(Debug, Clone)]
pub struct FirmGroup {
    pub firm: Option<String>,
    pub items: Vec<ContentItem>,
}

impl NotificationBatch {
    pub fn group(items: Vec<ContentItem>) -> Self {
        let mut by_firm: BTreeMap<String, Vec<ContentItem>> = BTreeMap::new();
        let mut unattributed = Vec::new();
        for item in items {
            match item.firm.clone() {
                Some(firm) => by_firm.entry(firm).or_default().push(item),
                None => unattributed.push(item),
            }
        }

        let mut groups: Vec<FirmGroup> = by_firm
            .into_iter()
            .map(|(firm, items)| FirmGroup {
                firm: Some(firm),
                items,
            })
            .collect();
        if !unattributed.is_empty() {
            groups.push(FirmGroup {
                firm: None,
                items: unattributed,
            });
        }
        Self { groups }
    }

    pub fn total(&self) -> usize {
        self.groups.iter().map(|g| g.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn fingerprints(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .flat_map(|g| g.items.iter())
            .map(|i| i.fingerprint.as_str())
    }
}

/// The external delivery boundary, synchronous from the core's view.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn deliver(&self, batch: &NotificationBatch) -> Result<(), DeliveryError>;
    fn name(&self) -> &'static str;
}

/// Console "delivery" is considered always-successful.
pub struct ConsoleTransport;

#[async_trait]
impl NotificationTransport for ConsoleTransport {
    async fn deliver(&self, batch: &NotificationBatch) -> Result<(), DeliveryError> {
        let ruler = "=".repeat(80);
        println!("\n{ruler}");
        println!("{}", digest::subject(batch));
        println!("{ruler}");
        println!("{}", digest::render(batch));
        println!("{ruler}\n");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

/// Selects not-yet-notified records, hands the digest to the transport,
/// and flips the notified flag only on acknowledged delivery.
pub struct NotificationDecider {
    store: HybridStore,
    transport: Arc<dyn NotificationTransport>,
}

impl NotificationDecider {
    pub fn new(store: HybridStore, transport: Arc<dyn NotificationTransport>) -> Self {
        Self { store, transport }
    }

    /// Returns the number of items notified in this run (0 when there was
    /// nothing to send or delivery failed).
    pub async fn run(&self) -> Result<usize, StoreError> {
        let items = self.store.unnotified(None).await?;
        if items.is_empty() {
            debug!("no unnotified items");
            return Ok(0);
        }

        let batch = NotificationBatch::group(items);
        let total = batch.total();

        match self.transport.deliver(&batch).await {
            Ok(()) => {
                for fingerprint in batch.fingerprints() {
                    self.store.mark_notified(fingerprint).await?;
                }
                info!(transport = self.transport.name(), count = total, "batch delivered");
                Ok(total)
            }
            Err(e) => {
                warn!(
                    transport = self.transport.name(),
                    error = %e,
                    count = total,
                    "delivery failed, items stay unnotified for the next run"
                );
                Ok(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::ContentKind;
    use chrono::Utc;

    fn item(fp: &str, firm: Option<&str>) -> ContentItem {
        let now = Utc::now();
        ContentItem {
            fingerprint: fp.into(),
            kind: ContentKind::Event,
            source_name: "src".into(),
            source_url: "https://x.test".into(),
            firm: firm.map(str::to_string),
            title: format!("title {fp}"),
            published_at: None,
            body_path: None,
            event_start: None,
            event_location: None,
            notified: false,
            first_seen: now,
            last_seen: now,
        }
    }

    #[test]
    fn grouping_orders_firms_and_puts_unattributed_last() {
        let batch = NotificationBatch::group(vec![
            item("1", None),
            item("2", Some("Two Sigma")),
            item("3", Some("Citadel")),
            item("4", Some("Citadel")),
        ]);
        let firms: Vec<Option<&str>> = batch.groups.iter().map(|g| g.firm.as_deref()).collect();
        assert_eq!(firms, vec![Some("Citadel"), Some("Two Sigma"), None]);
        assert_eq!(batch.total(), 4);
        assert_eq!(batch.groups[0].items.len(), 2);
    }
}
