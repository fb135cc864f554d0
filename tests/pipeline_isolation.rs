// tests/pipeline_isolation.rs
use std::sync::Arc;

use async_trait::async_trait;
use firmwatch::adapters::SourceAdapter;
use firmwatch::detect::FirmDetector;
use firmwatch::error::FetchError;
use firmwatch::fingerprint::ContentKind;
use firmwatch::model::{RawItem, ScrapeStatus, SourceDescriptor};
use firmwatch::pipeline::Pipeline;
use firmwatch::registry::FirmRegistry;
use firmwatch::store::HybridStore;
use tokio::sync::watch;

struct MockAdapter {
    descriptor: SourceDescriptor,
    items: Vec<RawItem>,
    fail: bool,
}

impl MockAdapter {
    fn ok(name: &str, items: Vec<RawItem>) -> Arc<dyn SourceAdapter> {
        Arc::new(Self {
            descriptor: SourceDescriptor::new(name, "https://src.test", ContentKind::Event),
            items,
            fail: false,
        })
    }

    fn failing(name: &str) -> Arc<dyn SourceAdapter> {
        Arc::new(Self {
            descriptor: SourceDescriptor::new(name, "https://src.test", ContentKind::Event),
            items: Vec::new(),
            fail: true,
        })
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn fetch(&self) -> Result<Vec<RawItem>, FetchError> {
        if self.fail {
            return Err(FetchError::Unreachable("connection refused".into()));
        }
        Ok(self.items.clone())
    }
}

fn raw(title: &str, url: &str, excerpt: &str) -> RawItem {
    RawItem {
        kind: ContentKind::Event,
        source_url: url.into(),
        title: title.into(),
        body_excerpt: excerpt.into(),
        body: None,
        published_at: None,
        event_start: None,
        event_location: None,
    }
}

async fn pipeline(dir: &std::path::Path) -> Pipeline {
    let store = HybridStore::open(&dir.join("firmwatch.db"), &dir.join("content"))
        .await
        .expect("open store");
    let detector = FirmDetector::new(Arc::new(FirmRegistry::builtin()));
    Pipeline::new(store, detector, 4)
}

#[tokio::test]
async fn one_failing_source_never_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(dir.path()).await;

    let adapters = vec![
        MockAdapter::ok(
            "MIT CSAIL",
            vec![raw("Quant Night with Citadel", "https://a.test/1", "evening talk")],
        ),
        MockAdapter::failing("Stanford CS"),
        MockAdapter::ok(
            "CMU CS",
            vec![raw("Two Sigma tech talk", "https://b.test/2", "systematic trading")],
        ),
    ];

    let (_tx, rx) = watch::channel(false);
    let logs = p.run(adapters, rx).await.unwrap();

    assert_eq!(logs.len(), 3);
    let by_status = |s: ScrapeStatus| logs.iter().filter(|l| l.status == s).count();
    assert_eq!(by_status(ScrapeStatus::Success), 2);
    assert_eq!(by_status(ScrapeStatus::Failed), 1);

    let failed = logs.iter().find(|l| l.status == ScrapeStatus::Failed).unwrap();
    assert_eq!(failed.source_name, "Stanford CS");
    assert!(failed.error_detail.as_deref().unwrap().contains("connection refused"));

    // Items from the healthy sources are present in the store.
    assert_eq!(p.store().item_count().await.unwrap(), 2);
}

#[tokio::test]
async fn malformed_items_are_skipped_and_source_goes_partial() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(dir.path()).await;

    let adapters = vec![MockAdapter::ok(
        "MIT CSAIL",
        vec![
            raw("Quant Night", "https://a.test/1", "with Citadel"),
            raw("   ", "https://a.test/2", "missing title"),
        ],
    )];

    let (_tx, rx) = watch::channel(false);
    let logs = p.run(adapters, rx).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, ScrapeStatus::Partial);
    assert_eq!(logs[0].item_count, 1);
    assert_eq!(p.store().item_count().await.unwrap(), 1);
}

#[tokio::test]
async fn rerunning_identical_output_yields_zero_new_items() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(dir.path()).await;

    let items = vec![
        raw("Quant Night with Citadel", "https://a.test/1", "evening talk"),
        raw("Jane Street puzzles", "https://a.test/2", "ocaml and probability"),
    ];

    let (_tx, rx) = watch::channel(false);
    let first = p
        .run(vec![MockAdapter::ok("MIT CSAIL", items.clone())], rx.clone())
        .await
        .unwrap();
    assert_eq!(first[0].items_new, 2);

    let second = p
        .run(vec![MockAdapter::ok("MIT CSAIL", items)], rx)
        .await
        .unwrap();
    assert_eq!(second[0].items_new, 0);
    assert_eq!(second[0].status, ScrapeStatus::Success);
    assert_eq!(p.store().item_count().await.unwrap(), 2);
}

#[tokio::test]
async fn duplicate_fingerprints_within_a_source_keep_first_seen() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(dir.path()).await;

    // Same logical item twice, differing only in markup noise.
    let adapters = vec![MockAdapter::ok(
        "MIT CSAIL",
        vec![
            raw("Quant Night", "https://a.test/1", "with Citadel"),
            raw("  Quant  Night ", "https://a.test/1/", "<p>with Citadel</p>"),
        ],
    )];

    let (_tx, rx) = watch::channel(false);
    let logs = p.run(adapters, rx).await.unwrap();
    assert_eq!(logs[0].item_count, 2);
    assert_eq!(logs[0].items_new, 1);
    assert_eq!(p.store().item_count().await.unwrap(), 1);
}

#[tokio::test]
async fn cancellation_stops_launching_new_sources() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(dir.path()).await;

    let adapters = vec![
        MockAdapter::ok("a", vec![raw("t", "https://a.test/1", "")]),
        MockAdapter::ok("b", vec![raw("t", "https://b.test/1", "")]),
    ];

    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();
    let logs = p.run(adapters, rx).await.unwrap();
    assert!(logs.is_empty());
    assert_eq!(p.store().item_count().await.unwrap(), 0);
}
