//! Record store gateway.
//!
//! A store exposes two scans, unfiltered and filtered. Both return a lazy
//! stream that pages through the whole table on demand; every call starts a
//! fresh scan. Failures are surfaced as they happen and are never retried.

use catalog_contracts::RawRecord;
use futures::stream::BoxStream;

use crate::filter::CompiledFilter;

pub mod dynamo;

pub use dynamo::{DynamoStore, DynamoStoreConfig};

pub type RecordStream = BoxStream<'static, Result<RawRecord, StoreError>>;

pub trait RecordStore: Send + Sync {
    fn fetch_all(&self) -> RecordStream;

    fn fetch_filtered(&self, filter: CompiledFilter) -> RecordStream;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store request timed out")]
    Timeout,
    #[error("store HTTP error: {0}")]
    Http(#[source] reqwest::Error),
    #[error("store rejected the scan ({error_type}): {message}")]
    Rejected {
        status: u16,
        error_type: String,
        message: String,
    },
    #[error("store returned an invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid store request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            StoreError::Timeout
        } else {
            StoreError::Http(value)
        }
    }
}
