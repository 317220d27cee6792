//! Fixed User-Agent string sent on every lookup service call.
//!
//! The lookup service identifies batch tooling by this header, so its format
//! stays stable across releases apart from the crate version.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/hyperlink-repair";

/// User-Agent for lookup service requests.
#[must_use]
pub(crate) fn default_lookup_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("hyperlink-repair/{version} (link-integrity-tool; +{PROJECT_UA_URL})")
}
