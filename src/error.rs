// src/error.rs
//! Error kinds for the ingestion core. Each kind maps to a different
//! recovery policy: fetch errors isolate to one source, item errors skip
//! one raw item, store errors abort the run, delivery errors leave the
//! unnotified set intact for the next run.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Adapter-boundary failure. Recovered locally: the source is logged as
/// `failed` and the run continues with the remaining sources.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("source unreachable: {0}")]
    Unreachable(String),
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("reading source payload: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Persistence failure. Fatal for the current run: without the store no
/// dedup or notification guarantee can be honored.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("file area error at {path}: {source}")]
    FileArea {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid stored value: {0}")]
    Corrupt(String),
}

/// Failure while turning one raw item into a stored record. An invalid
/// item is skipped and counted; a store failure underneath escalates.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("item rejected: {0}")]
    Invalid(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Transport-boundary failure. Recovered by design: nothing is marked
/// notified, so the same batch is retried on the next run.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("smtp delivery failed: {0}")]
    Smtp(String),
    #[error("notification transport not configured: {0}")]
    NotConfigured(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
