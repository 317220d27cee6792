//! Batched lookups against the authoritative document service.
//!
//! # Architecture
//!
//! - [`LookupService`] - Async trait for one raw batched call (the seam tests fake)
//! - [`HttpLookupService`] - reqwest implementation posting `{"Lookup_ID": [..]}`
//! - [`LookupClient`] - Runs the service through the retry executor and parses
//!   the response into [`LookupResults`](crate::record::LookupResults)
//!
//! # Example
//!
//! ```no_run
//! use std::collections::BTreeSet;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use hyperlink_core::lookup::{HttpLookupService, LookupClient};
//! use hyperlink_core::retry::{RetryExecutor, RetryPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = HttpLookupService::new("https://lookup.example.com/api", Duration::from_secs(30))?;
//! let client = LookupClient::new(Arc::new(service), RetryExecutor::new(RetryPolicy::default()));
//!
//! let ids = BTreeSet::from(["TSRC-ABC-123456".to_string()]);
//! let batch = client.lookup(&ids).await;
//! println!("{} results", batch.results.len());
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod http_client;
mod response;

pub use client::{CURRENT_SERVICE_VERSION, LookupBatch, LookupClient};
pub use error::LookupError;
pub use response::{ParsedResponse, parse_lookup_response};

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::retry::Attempt;

use http_client::build_lookup_http_client;

/// One raw batched call to the lookup service.
///
/// Implementations return the response body on success, the HTTP status for
/// any non-success answer, and `Err` only for transport failures.
#[async_trait]
pub trait LookupService: Send + Sync {
    /// Posts one batch of lookup identifiers.
    async fn post_batch(&self, lookup_ids: &[String]) -> Result<Attempt<String>, LookupError>;
}

/// Request body understood by every service version.
#[derive(Debug, Serialize)]
struct LookupRequest<'a> {
    #[serde(rename = "Lookup_ID")]
    lookup_ids: &'a [String],
}

/// Lookup service reached over HTTP POST.
pub struct HttpLookupService {
    client: Client,
    endpoint: String,
}

impl HttpLookupService {
    /// Creates a service client for `endpoint` with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] if the endpoint is not an http(s) URL or the
    /// HTTP client cannot be constructed.
    #[tracing::instrument(skip_all, fields(endpoint))]
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, LookupError> {
        let endpoint = endpoint.into();
        let parsed = Url::parse(&endpoint)
            .map_err(|e| LookupError::invalid_service_url(&endpoint, e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(LookupError::invalid_service_url(
                &endpoint,
                format!("scheme '{}' is not supported", parsed.scheme()),
            ));
        }

        let client = build_lookup_http_client(timeout)?;
        Ok(Self { client, endpoint })
    }
}

impl std::fmt::Debug for HttpLookupService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLookupService")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LookupService for HttpLookupService {
    #[tracing::instrument(skip(self, lookup_ids), fields(endpoint = %self.endpoint, ids = lookup_ids.len()))]
    async fn post_batch(&self, lookup_ids: &[String]) -> Result<Attempt<String>, LookupError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&LookupRequest { lookup_ids })
            .send()
            .await
            .map_err(|e| LookupError::network(&self.endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "lookup service returned error status");
            return Ok(Attempt::Status {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| LookupError::network(&self.endpoint, e))?;
        Ok(Attempt::Success(body))
    }
}
