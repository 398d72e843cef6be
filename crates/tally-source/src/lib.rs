//! tally-source
//!
//! Fetch boundary for upstream time-tracking records.
//!
//! This crate owns the fetcher trait and the Harvest v2 HTTP client. It hands
//! back raw JSON objects; turning them into engine records (and rejecting
//! ones without an identity) is the caller's job.

pub mod error;
pub mod harvest;

use chrono::NaiveDate;
use serde_json::Value;

pub use error::FetchError;
pub use harvest::{HarvestFetcher, DEFAULT_HARVEST_URL, MAX_PER_PAGE, REQUEST_TIMEOUT};

/// Inclusive date range to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl FetchRequest {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }
}

/// Every record for the requested range, plus how many pages it took.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    pub records: Vec<Value>,
    pub pages: u32,
}

/// Upstream record source.
///
/// Implementations page internally until the provider reports no further
/// pages and return either the complete list or an error, never a silent
/// partial result.
#[async_trait::async_trait]
pub trait RecordFetcher: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch_all(&self, req: FetchRequest) -> Result<FetchOutcome, FetchError>;
}
