//! Harvest v2 `time_entries` client.
//!
//! Access token is passed in by the caller; it is sent as a bearer header
//! and never logged or formatted into errors.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::{FetchError, FetchOutcome, FetchRequest, RecordFetcher};

pub const DEFAULT_HARVEST_URL: &str = "https://api.harvestapp.com/v2/time_entries";

/// Largest page size the Harvest API accepts.
pub const MAX_PER_PAGE: u32 = 2000;

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("tally/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct HarvestFetcher {
    account_id: String,
    access_token: String,
    url: String,
    per_page: u32,
    timeout: Duration,
    http: reqwest::Client,
}

impl fmt::Debug for HarvestFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarvestFetcher")
            .field("account_id", &self.account_id)
            .field("access_token", &"<REDACTED>")
            .field("url", &self.url)
            .field("per_page", &self.per_page)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HarvestFetcher {
    pub fn new(
        account_id: impl Into<String>,
        access_token: impl Into<String>,
        url: impl Into<String>,
    ) -> Result<Self, FetchError> {
        Self::with_timeout(account_id, access_token, url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        account_id: impl Into<String>,
        access_token: impl Into<String>,
        url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::ClientInit(e.to_string()))?;

        Ok(Self {
            account_id: account_id.into(),
            access_token: access_token.into(),
            url: url.into(),
            per_page: MAX_PER_PAGE,
            timeout,
            http,
        })
    }

    /// Override the page size (clamped to `1..=MAX_PER_PAGE`).
    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.clamp(1, MAX_PER_PAGE);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn map_send_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                url: self.url.clone(),
                after: self.timeout,
            }
        } else {
            FetchError::Transport(format!("{} ({})", e.without_url(), self.url))
        }
    }

    async fn fetch_page(&self, req: FetchRequest, page: u32) -> Result<TimeEntriesPage, FetchError> {
        let from = req.from.format("%Y-%m-%d").to_string();
        let to = req.to.format("%Y-%m-%d").to_string();

        let resp = self
            .http
            .get(&self.url)
            .header("Harvest-Account-ID", &self.account_id)
            .bearer_auth(&self.access_token)
            .query(&[
                ("from", from),
                ("to", to),
                ("page", page.to_string()),
                ("per_page", self.per_page.to_string()),
            ])
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                code: status.as_u16(),
                url: self.url.clone(),
            });
        }

        let body = resp.bytes().await.map_err(|e| self.map_send_error(e))?;
        serde_json::from_slice::<TimeEntriesPage>(&body).map_err(|e| {
            FetchError::Decode(format!(
                "harvest response is not valid JSON (status {}, url {}): {e}",
                status.as_u16(),
                self.url
            ))
        })
    }
}

#[async_trait::async_trait]
impl RecordFetcher for HarvestFetcher {
    fn source_name(&self) -> &'static str {
        "harvest"
    }

    async fn fetch_all(&self, req: FetchRequest) -> Result<FetchOutcome, FetchError> {
        info!(from = %req.from, to = %req.to, "fetching harvest time entries");

        let mut out = FetchOutcome::default();
        let mut page: u32 = 1;

        loop {
            let body = self.fetch_page(req, page).await?;
            out.pages = page;

            let entries = body.time_entries.unwrap_or_default();
            if entries.is_empty() {
                break;
            }
            let n = entries.len();
            out.records.extend(entries);

            let total_pages = body.total_pages.unwrap_or(1);
            debug!(page, total_pages, entries = n, "harvest page received");
            if page >= total_pages {
                break;
            }
            page += 1;
        }

        info!(
            total = out.records.len(),
            pages = out.pages,
            "harvest fetch complete"
        );
        Ok(out)
    }
}

/// Missing or `null` `time_entries` both mean an empty page.
#[derive(Debug, Deserialize)]
struct TimeEntriesPage {
    #[serde(default)]
    time_entries: Option<Vec<Value>>,
    #[serde(default)]
    total_pages: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_token() {
        let f = HarvestFetcher::new("123", "super-secret-token", DEFAULT_HARVEST_URL).unwrap();
        let s = format!("{f:?}");
        assert!(s.contains("<REDACTED>"));
        assert!(!s.contains("super-secret-token"));
    }

    #[test]
    fn per_page_is_clamped() {
        let f = HarvestFetcher::new("1", "t", DEFAULT_HARVEST_URL)
            .unwrap()
            .with_per_page(50_000);
        assert_eq!(f.per_page, MAX_PER_PAGE);
        let f = f.with_per_page(0);
        assert_eq!(f.per_page, 1);
    }

    #[test]
    fn page_without_total_pages_defaults() {
        let p: TimeEntriesPage = serde_json::from_str(r#"{"time_entries":[{"id":1}]}"#).unwrap();
        assert_eq!(p.time_entries.map(|e| e.len()), Some(1));
        assert_eq!(p.total_pages, None);
    }

    #[test]
    fn page_without_entries_is_empty() {
        let p: TimeEntriesPage = serde_json::from_str(r#"{"total_pages":3}"#).unwrap();
        assert!(p.time_entries.is_none());
    }

    #[test]
    fn page_with_null_entries_decodes() {
        let p: TimeEntriesPage =
            serde_json::from_str(r#"{"time_entries":null,"total_pages":3}"#).unwrap();
        assert!(p.time_entries.is_none());
    }
}
