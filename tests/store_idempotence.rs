// tests/store_idempotence.rs
use chrono::Utc;
use firmwatch::fingerprint::ContentKind;
use firmwatch::model::{CandidateItem, ScrapeLog, ScrapeStatus};
use firmwatch::store::HybridStore;

async fn open_store(dir: &std::path::Path) -> HybridStore {
    HybridStore::open(&dir.join("firmwatch.db"), &dir.join("content"))
        .await
        .expect("open store")
}

fn candidate(fp: &str, body: Option<&str>) -> CandidateItem {
    CandidateItem {
        fingerprint: fp.into(),
        kind: ContentKind::BlogPost,
        source_name: "Jane Street blog".into(),
        source_url: "https://blog.janestreet.com/ocaml".into(),
        firm: Some("Jane Street".into()),
        title: "Why OCaml".into(),
        published_at: None,
        body: body.map(str::to_string),
        event_start: None,
        event_location: None,
    }
}

#[tokio::test]
async fn upsert_twice_creates_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;

    let item = candidate("fp-1", Some("full post body"));
    assert!(store.upsert(&item).await.unwrap().is_new());
    assert!(!store.upsert(&item).await.unwrap().is_new());
    assert_eq!(store.item_count().await.unwrap(), 1);

    let stored = store.get("fp-1").await.unwrap().unwrap();
    assert!(!stored.notified);
    assert!(stored.last_seen >= stored.first_seen);
    assert_eq!(store.read_body(&stored).await.unwrap().as_deref(), Some("full post body"));
}

#[tokio::test]
async fn second_observation_bumps_last_seen_only() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;

    let item = candidate("fp-2", None);
    store.upsert(&item).await.unwrap();
    let first = store.get("fp-2").await.unwrap().unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    store.upsert(&item).await.unwrap();
    let second = store.get("fp-2").await.unwrap().unwrap();

    assert_eq!(second.first_seen, first.first_seen);
    assert!(second.last_seen > first.last_seen);
    assert!(!second.notified);
}

#[tokio::test]
async fn body_rewrite_is_idempotent_on_the_same_path() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;

    store.upsert(&candidate("fp-3", Some("v1"))).await.unwrap();
    store.upsert(&candidate("fp-3", Some("v1"))).await.unwrap();
    // Trivially re-rendered body overwrites in place, never duplicates.
    store.upsert(&candidate("fp-3", Some("v2"))).await.unwrap();

    let stored = store.get("fp-3").await.unwrap().unwrap();
    let body_dir = dir
        .path()
        .join("content")
        .join("blog_posts")
        .join("jane_street");
    let files: Vec<_> = std::fs::read_dir(&body_dir).unwrap().collect();
    assert_eq!(files.len(), 1);
    assert_eq!(store.read_body(&stored).await.unwrap().as_deref(), Some("v2"));
}

#[tokio::test]
async fn concurrent_upserts_of_one_fingerprint_all_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;

    // Two sources fetching the same logical item race on the same
    // fingerprint; every writer must succeed and exactly one creates.
    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..8 {
        let store = store.clone();
        tasks.spawn(async move {
            let mut item = candidate("shared-fp", None);
            item.body = Some(format!("render variant {i}"));
            store.upsert(&item).await
        });
    }

    let mut created = 0;
    while let Some(joined) = tasks.join_next().await {
        if joined.unwrap().unwrap().is_new() {
            created += 1;
        }
    }
    assert_eq!(created, 1);
    assert_eq!(store.item_count().await.unwrap(), 1);

    // The file area holds exactly one body file for the fingerprint,
    // whichever writer renamed last.
    let body_dir = dir
        .path()
        .join("content")
        .join("blog_posts")
        .join("jane_street");
    let files: Vec<_> = std::fs::read_dir(&body_dir).unwrap().collect();
    assert_eq!(files.len(), 1);
    let stored = store.get("shared-fp").await.unwrap().unwrap();
    assert!(store
        .read_body(&stored)
        .await
        .unwrap()
        .unwrap()
        .starts_with("render variant"));
}

#[tokio::test]
async fn mark_notified_is_idempotent_and_filters_unnotified() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;

    store.upsert(&candidate("fp-4", None)).await.unwrap();
    let mut event = candidate("fp-5", None);
    event.kind = ContentKind::Event;
    store.upsert(&event).await.unwrap();

    assert_eq!(store.unnotified(None).await.unwrap().len(), 2);
    assert_eq!(
        store.unnotified(Some(ContentKind::Event)).await.unwrap().len(),
        1
    );

    store.mark_notified("fp-4").await.unwrap();
    store.mark_notified("fp-4").await.unwrap(); // no-op, never an error
    store.mark_notified("missing").await.unwrap(); // also a no-op

    let rest = store.unnotified(None).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].fingerprint, "fp-5");
}

#[tokio::test]
async fn scrape_logs_are_appended_and_readable() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;

    let log = ScrapeLog {
        source_name: "MIT CSAIL".into(),
        run_at: Utc::now(),
        status: ScrapeStatus::Partial,
        item_count: 4,
        items_new: 2,
        error_detail: Some("1 of 5 items failed; last: item rejected: empty title".into()),
    };
    store.log_scrape(&log).await.unwrap();
    store
        .log_scrape(&ScrapeLog::failed("Stanford CS", Utc::now(), "timeout".into()))
        .await
        .unwrap();

    let logs = store.recent_scrape_logs(10).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().any(|l| l.status == ScrapeStatus::Partial && l.items_new == 2));
    assert!(logs.iter().any(|l| l.status == ScrapeStatus::Failed));
}
