// src/pipeline.rs
//! Ingestion pipeline: per source, fetch -> detect -> fingerprint ->
//! upsert, with partial-failure isolation. One source failing must never
//! abort the run; that is the central reliability contract here.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::adapters::SourceAdapter;
use crate::detect::FirmDetector;
use crate::error::{ItemError, StoreError};
use crate::fingerprint;
use crate::model::{CandidateItem, RawItem, ScrapeLog, ScrapeStatus, SourceDescriptor};
use crate::store::HybridStore;

/// Bound on concurrently ingesting sources. Small by default to respect
/// target-site rate limits; the store is the only shared resource.
pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Clone)]
pub struct Pipeline {
    store: HybridStore,
    detector: FirmDetector,
    concurrency: usize,
}

impl Pipeline {
    pub fn new(store: HybridStore, detector: FirmDetector, concurrency: usize) -> Self {
        Self {
            store,
            detector,
            concurrency: concurrency.max(1),
        }
    }

    pub fn store(&self) -> &HybridStore {
        &self.store
    }

    /// Turn one raw item into a store candidate: attribute a firm from the
    /// title + excerpt, then derive the fingerprint. Pure except for the
    /// registry snapshot read.
    fn build_candidate(
        &self,
        source: &SourceDescriptor,
        raw: RawItem,
    ) -> Result<CandidateItem, ItemError> {
        if raw.title.trim().is_empty() {
            return Err(ItemError::Invalid("empty title".into()));
        }
        if raw.source_url.trim().is_empty() {
            return Err(ItemError::Invalid("empty source url".into()));
        }

        let haystack = format!("{} {}", raw.title, raw.body_excerpt);
        let firm = self.detector.detect(&haystack).map(|m| m.firm.name);

        let fp = fingerprint::fingerprint(raw.kind, &raw.source_url, &raw.title, &raw.body_excerpt);

        Ok(CandidateItem {
            fingerprint: fp,
            kind: raw.kind,
            source_name: source.name.clone(),
            source_url: raw.source_url,
            firm,
            title: raw.title,
            published_at: raw.published_at,
            body: raw.body,
            event_start: raw.event_start,
            event_location: raw.event_location,
        })
    }

    async fn process_item(
        &self,
        source: &SourceDescriptor,
        raw: RawItem,
    ) -> Result<bool, ItemError> {
        let candidate = self.build_candidate(source, raw)?;
        let outcome = self.store.upsert(&candidate).await?;
        Ok(outcome.is_new())
    }

    /// Ingest a single source. Fetch failures are recorded as a `failed`
    /// scrape log and swallowed; per-item failures are skipped and
    /// counted; only a store failure escalates.
    ///
    /// Items are processed in adapter-yielded order so the first
    /// occurrence of a fingerprint wins the first-seen timestamp.
    pub async fn ingest(&self, adapter: &dyn SourceAdapter) -> Result<ScrapeLog, StoreError> {
        let source = adapter.descriptor().clone();
        let run_at = Utc::now();

        let raw_items = match adapter.fetch().await {
            Ok(items) => items,
            Err(e) => {
                warn!(source = %source.name, error = %e, "fetch failed, run continues");
                let log = ScrapeLog::failed(&source.name, run_at, e.to_string());
                self.store.log_scrape(&log).await?;
                return Ok(log);
            }
        };

        let total = raw_items.len();
        let mut processed = 0u32;
        let mut new_items = 0u32;
        let mut skipped = 0u32;
        let mut last_error: Option<String> = None;

        for raw in raw_items {
            match self.process_item(&source, raw).await {
                Ok(is_new) => {
                    processed += 1;
                    if is_new {
                        new_items += 1;
                    }
                }
                Err(ItemError::Store(e)) => return Err(e),
                Err(e) => {
                    skipped += 1;
                    warn!(source = %source.name, error = %e, "skipping malformed item");
                    last_error = Some(e.to_string());
                }
            }
        }

        let status = if skipped == 0 {
            ScrapeStatus::Success
        } else if processed > 0 {
            ScrapeStatus::Partial
        } else {
            ScrapeStatus::Failed
        };

        let log = ScrapeLog {
            source_name: source.name.clone(),
            run_at,
            status,
            item_count: processed,
            items_new: new_items,
            error_detail: last_error.map(|e| format!("{skipped} of {total} items failed; last: {e}")),
        };
        self.store.log_scrape(&log).await?;
        info!(
            source = %source.name,
            status = log.status.as_str(),
            items = processed,
            new = new_items,
            "source ingested"
        );
        Ok(log)
    }

    /// Ingest all sources with bounded concurrency. Sources have no
    /// ordering dependency on each other; the returned logs are sorted by
    /// source name for a stable summary.
    ///
    /// A cancellation request stops launching new sources; in-flight
    /// ingestions finish or fail naturally rather than leaving partial
    /// upserts uncommitted.
    pub async fn run(
        &self,
        adapters: Vec<Arc<dyn SourceAdapter>>,
        cancel: watch::Receiver<bool>,
    ) -> Result<Vec<ScrapeLog>, StoreError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for adapter in adapters {
            if *cancel.borrow() {
                info!("cancellation requested, not launching remaining sources");
                break;
            }
            let semaphore = semaphore.clone();
            let pipeline = self.clone();
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore not closed");
                pipeline.ingest(adapter.as_ref()).await
            });
        }

        let mut logs = Vec::new();
        let mut fatal: Option<StoreError> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(log)) => logs.push(log),
                Ok(Err(e)) => {
                    error!(error = %e, "store failure, aborting run after in-flight sources");
                    fatal.get_or_insert(e);
                }
                Err(e) => {
                    fatal.get_or_insert(StoreError::Corrupt(format!("ingest task failed: {e}")));
                }
            }
        }
        if let Some(e) = fatal {
            return Err(e);
        }

        logs.sort_by(|a, b| a.source_name.cmp(&b.source_name));
        Ok(logs)
    }
}
