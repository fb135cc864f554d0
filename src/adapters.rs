// src/adapters.rs
//! The consumed adapter boundary. Site-specific scraping (HTML/DOM
//! extraction, HTTP retries) lives outside the core behind this trait;
//! the pipeline only sees sequences of `RawItem`s or a `FetchError`.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::model::{RawItem, SourceDescriptor};

/// One configured source of raw items.
///
/// `fetch` must be timeout-bounded by the implementation; the pipeline
/// treats a timeout exactly like any other fetch failure.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn descriptor(&self) -> &SourceDescriptor;
    async fn fetch(&self) -> Result<Vec<RawItem>, FetchError>;
}

/// Replays raw items from a JSON file. Useful for tests, dry runs and
/// wiring up a source whose scraper runs out-of-process and drops its
/// output somewhere the core can read.
pub struct FixtureAdapter {
    descriptor: SourceDescriptor,
    path: PathBuf,
}

impl FixtureAdapter {
    pub fn new(descriptor: SourceDescriptor, path: impl Into<PathBuf>) -> Self {
        Self {
            descriptor,
            path: path.into(),
        }
    }
}

#[async_trait]
impl SourceAdapter for FixtureAdapter {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn fetch(&self) -> Result<Vec<RawItem>, FetchError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| FetchError::Unreachable(format!("{}: {e}", self.path.display())))?;
        let items: Vec<RawItem> = serde_json::from_str(&raw)
            .map_err(|e| FetchError::Malformed(format!("{}: {e}", self.path.display())))?;
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::ContentKind;
    use std::io::Write;

    #[tokio::test]
    async fn fixture_adapter_replays_json_items() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"[{{"kind":"event","source_url":"https://x.test/e","title":"Quant Night","body_excerpt":"with Citadel"}}]"#
        )
        .unwrap();

        let adapter = FixtureAdapter::new(
            SourceDescriptor::new("fixture", "https://x.test", ContentKind::Event),
            f.path(),
        );
        let items = adapter.fetch().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Quant Night");
        assert!(items[0].published_at.is_none());
    }

    #[tokio::test]
    async fn missing_fixture_is_a_fetch_error() {
        let adapter = FixtureAdapter::new(
            SourceDescriptor::new("fixture", "https://x.test", ContentKind::Event),
            "/nonexistent/items.json",
        );
        assert!(matches!(
            adapter.fetch().await,
            Err(FetchError::Unreachable(_))
        ));
    }
}
