// src/scheduler.rs
//! Run orchestration: wires registry, pipeline, store and notifier
//! together, exposes the `run_once` scheduler boundary, and provides the
//! daily HH:MM loop. The scheduler owns "when"; the core owns nothing
//! about timing.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveTime, Utc};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::adapters::{FixtureAdapter, SourceAdapter};
use crate::config::Config;
use crate::detect::FirmDetector;
use crate::error::StoreError;
use crate::model::{RunSummary, SourceDescriptor};
use crate::notify::email::EmailTransport;
use crate::notify::{ConsoleTransport, NotificationDecider, NotificationTransport};
use crate::pipeline::Pipeline;
use crate::registry::FirmRegistry;
use crate::store::HybridStore;

/// Everything one monitoring run needs, built once from config.
pub struct Monitor {
    pipeline: Pipeline,
    decider: NotificationDecider,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    cancel: watch::Receiver<bool>,
}

impl Monitor {
    pub async fn from_config(config: &Config, cancel: watch::Receiver<bool>) -> Result<Self> {
        let store = HybridStore::open(&config.database.path, &config.storage.dir)
            .await
            .context("opening hybrid store")?;

        let registry = Arc::new(FirmRegistry::builtin());
        // Mirror the registry into the relational side for operator joins.
        for firm in registry.all() {
            store.record_firm(firm).await?;
        }

        let detector = FirmDetector::new(registry);
        let pipeline = Pipeline::new(store.clone(), detector, config.ingest.concurrency);

        let transport: Arc<dyn NotificationTransport> = if config.email.enabled {
            Arc::new(EmailTransport::from_config(&config.email).context("email transport")?)
        } else {
            Arc::new(ConsoleTransport)
        };
        let decider = NotificationDecider::new(store, transport);

        let adapters = build_adapters(config);
        Ok(Self {
            pipeline,
            decider,
            adapters,
            cancel,
        })
    }

    /// Attach additional (typically out-of-crate) source adapters.
    pub fn with_adapters(mut self, extra: Vec<Arc<dyn SourceAdapter>>) -> Self {
        self.adapters.extend(extra);
        self
    }

    pub fn store(&self) -> &HybridStore {
        self.pipeline.store()
    }

    /// One end-to-end run: ingest every source, then notify. Only a store
    /// failure aborts; per-source and delivery failures are contained and
    /// reported through the summary.
    pub async fn run_once(&self) -> Result<RunSummary, StoreError> {
        let logs = self
            .pipeline
            .run(self.adapters.clone(), self.cancel.clone())
            .await?;
        let items_new: u64 = logs.iter().map(|l| u64::from(l.items_new)).sum();

        let notifications_sent = self.decider.run().await? as u64;

        let summary = RunSummary {
            sources: logs,
            items_new,
            notifications_sent,
        };
        let (ok, partial, failed) = summary.source_counts();
        info!(
            ok,
            partial,
            failed,
            items_new = summary.items_new,
            notifications_sent = summary.notifications_sent,
            "run complete"
        );
        Ok(summary)
    }

    /// Run once per day at `schedule_time` (HH:MM, UTC) until cancelled.
    pub async fn run_daily(&self, schedule_time: &str) -> Result<()> {
        let mut cancel = self.cancel.clone();
        loop {
            let now = Utc::now();
            let next = next_run_after(now, schedule_time)?;
            let wait = (next - now).to_std().unwrap_or_default();
            info!(next = %next, "waiting for next scheduled run");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = cancel.changed() => {
                    // A dropped sender can never request another run;
                    // treat a closed channel like cancellation.
                    if changed.is_err() || *cancel.borrow() {
                        info!("scheduler stopped");
                        return Ok(());
                    }
                    continue;
                }
            }

            // A store failure is fatal; everything else was already
            // contained inside run_once.
            let summary = self.run_once().await.context("scheduled run")?;
            if summary.sources.iter().all(|l| l.item_count == 0) && summary.items_new == 0 {
                warn!("run produced no items from any source");
            }
        }
    }
}

fn build_adapters(config: &Config) -> Vec<Arc<dyn SourceAdapter>> {
    let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();
    for source in &config.ingest.sources {
        let descriptor = SourceDescriptor::new(&source.name, &source.url, source.kind);
        match &source.fixture {
            Some(path) => {
                adapters.push(Arc::new(FixtureAdapter::new(descriptor, path)));
            }
            None => {
                // Live site scrapers run out of process; without a fixture
                // drop there is nothing the core can fetch for this source.
                warn!(
                    source = %source.name,
                    "source has no fixture path and no registered adapter, skipping"
                );
            }
        }
    }
    adapters
}

/// The next wall-clock instant matching `HH:MM` strictly after `now`.
pub fn next_run_after(now: DateTime<Utc>, schedule_time: &str) -> Result<DateTime<Utc>> {
    let time = NaiveTime::parse_from_str(schedule_time.trim(), "%H:%M")
        .map_err(|e| anyhow!("invalid schedule_time {schedule_time:?}: {e}"))?;
    let today = now.date_naive().and_time(time).and_utc();
    if today > now {
        Ok(today)
    } else {
        Ok(today + chrono::Duration::days(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn next_run_is_today_when_still_ahead() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
        let next = next_run_after(now, "20:00").unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 2, 20, 0, 0).unwrap());
    }

    #[test]
    fn next_run_rolls_to_tomorrow_when_passed() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 21, 30, 0).unwrap();
        let next = next_run_after(now, "20:00").unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 3, 20, 0, 0).unwrap());
    }

    #[test]
    fn bad_schedule_time_is_rejected() {
        let now = Utc::now();
        assert!(next_run_after(now, "25:99").is_err());
        assert!(next_run_after(now, "8pm").is_err());
    }

    #[tokio::test]
    async fn daily_loop_stops_when_cancel_sender_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.database.path = dir.path().join("firmwatch.db");
        config.storage.dir = dir.path().join("content");

        let (tx, rx) = watch::channel(false);
        let monitor = Monitor::from_config(&config, rx).await.unwrap();
        drop(tx);

        // With no sender left the loop must exit instead of spinning.
        tokio::time::timeout(std::time::Duration::from_secs(5), monitor.run_daily("20:00"))
            .await
            .expect("daily loop kept running without a cancel sender")
            .unwrap();
    }
}
