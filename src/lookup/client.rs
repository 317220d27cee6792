//! Batched lookup client with retry and defensive response parsing.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, instrument, warn};

use crate::record::LookupResults;
use crate::retry::{RetryExecutor, RetryOutcome};

use super::LookupService;
use super::response::parse_lookup_response;

/// Service version this client was built against.
pub const CURRENT_SERVICE_VERSION: &str = "2.0";

/// Outcome of one batched lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupBatch {
    pub results: LookupResults,
    /// Service-reported version.
    pub version: Option<String>,
    /// Service changelog notes.
    pub notes: Vec<String>,
    /// Terminal failure text when the call did not succeed.
    pub failure: Option<String>,
}

/// Sends identifier batches to a [`LookupService`] through a [`RetryExecutor`].
pub struct LookupClient {
    service: Arc<dyn LookupService>,
    executor: RetryExecutor,
    needs_update: AtomicBool,
}

impl std::fmt::Debug for LookupClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupClient")
            .field("executor", &self.executor)
            .field("needs_update", &self.needs_update())
            .finish_non_exhaustive()
    }
}

impl LookupClient {
    #[must_use]
    pub fn new(service: Arc<dyn LookupService>, executor: RetryExecutor) -> Self {
        Self {
            service,
            executor,
            needs_update: AtomicBool::new(false),
        }
    }

    /// True once the service reported a version other than [`CURRENT_SERVICE_VERSION`].
    ///
    /// Advisory only; processing continues either way.
    #[must_use]
    pub fn needs_update(&self) -> bool {
        self.needs_update.load(Ordering::SeqCst)
    }

    /// Looks up all identifiers in one batched request.
    ///
    /// Never fails: transport errors and unusable responses produce an empty
    /// result set, with [`LookupBatch::failure`] describing a failed call.
    #[instrument(skip_all, fields(ids = lookup_ids.len()))]
    pub async fn lookup(&self, lookup_ids: &BTreeSet<String>) -> LookupBatch {
        if lookup_ids.is_empty() {
            return LookupBatch::default();
        }

        let ids: Vec<String> = lookup_ids.iter().cloned().collect();
        let outcome = self
            .executor
            .execute(|_attempt| self.service.post_batch(&ids))
            .await;

        let body = match outcome {
            RetryOutcome::Success(body) => body,
            failed => {
                let failure = failed
                    .failure_message()
                    .unwrap_or_else(|| "lookup failed".to_string());
                warn!(error = %failure, "lookup batch failed; continuing without results");
                return LookupBatch {
                    failure: Some(failure),
                    ..LookupBatch::default()
                };
            }
        };

        let parsed = parse_lookup_response(&body);
        if let Some(version) = &parsed.version
            && version != CURRENT_SERVICE_VERSION
        {
            self.needs_update.store(true, Ordering::SeqCst);
            info!(
                service_version = %version,
                client_version = CURRENT_SERVICE_VERSION,
                "lookup service version differs; update advised"
            );
        }

        info!(
            requested = ids.len(),
            returned = parsed.results.len(),
            "lookup batch complete"
        );

        LookupBatch {
            results: parsed.results,
            version: parsed.version,
            notes: parsed.notes,
            failure: None,
        }
    }
}
