//! HTTP client construction for the lookup service.
//!
//! Every lookup request carries the configured timeout and the fixed
//! User-Agent, so both are baked into the client rather than set per call.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use reqwest::{Client, ClientBuilder};
use tracing::warn;

use crate::user_agent;

use super::LookupError;

/// Connect timeout cap; the overall request timeout is configurable.
const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the lookup HTTP client with the given request timeout.
///
/// # Errors
///
/// Returns [`LookupError::ClientBuild`] when client construction fails.
pub fn build_lookup_http_client(timeout: Duration) -> Result<Client, LookupError> {
    let user_agent = user_agent::default_lookup_user_agent();

    match try_build_client(&user_agent, timeout, false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // Restricted sandboxes can panic while reading system proxy
            // settings; retry without system proxy lookup.
            warn!("lookup client hit system proxy panic; building without system proxy");
            match try_build_client(&user_agent, timeout, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Panic) => Err(LookupError::client_build(
                    "HTTP client construction panicked while initializing networking",
                )),
                Err(BuildClientFailure::Build(error)) => {
                    Err(LookupError::client_build(error.to_string()))
                }
            }
        }
        Err(BuildClientFailure::Build(error)) => Err(LookupError::client_build(error.to_string())),
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build_client(
    user_agent: &str,
    timeout: Duration,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    let user_agent = user_agent.to_string();
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_builder(user_agent, timeout);
        if disable_system_proxy_lookup {
            builder = builder.no_proxy();
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_builder(user_agent: String, timeout: Duration) -> ClientBuilder {
    Client::builder()
        .connect_timeout(timeout.min(MAX_CONNECT_TIMEOUT))
        .timeout(timeout)
        .user_agent(user_agent)
        .gzip(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_lookup_http_client_succeeds() {
        assert!(build_lookup_http_client(Duration::from_secs(5)).is_ok());
    }
}
