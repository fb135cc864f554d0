// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod adapters;
pub mod config;
pub mod detect;
pub mod error;
pub mod fingerprint;
pub mod model;
pub mod notify;
pub mod pipeline;
pub mod registry;
pub mod scheduler;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::adapters::SourceAdapter;
pub use crate::detect::{FirmDetector, FirmMatch};
pub use crate::error::{DeliveryError, FetchError, ItemError, StoreError};
pub use crate::fingerprint::ContentKind;
pub use crate::model::{
    ContentItem, RawItem, RunSummary, ScrapeLog, ScrapeStatus, SourceDescriptor,
};
pub use crate::notify::{NotificationBatch, NotificationDecider, NotificationTransport};
pub use crate::pipeline::Pipeline;
pub use crate::registry::{Firm, FirmRegistry};
pub use crate::scheduler::Monitor;
pub use crate::store::{HybridStore, UpsertOutcome};
