//! Hyperlink Repair Core Library
//!
//! Validates and repairs the hyperlinks of one document per processing pass:
//! invisible links are removed, external links are reconciled against an
//! authoritative lookup service, internal bookmark links are repaired, and
//! every mutation is recorded in a categorized changelog.
//!
//! # Architecture
//!
//! - [`record`] - Hyperlink records, lookup results, replacement rules
//! - [`identifier`] - Lookup identifier extraction and content-id suffixes
//! - [`filter`] - Invisible link removal
//! - [`replace`] - User-defined title replacement rules
//! - [`lookup`] - Batched lookup service client
//! - [`retry`] - Retry policy and executor for service calls
//! - [`reconcile`] - Status, title and content-id reconciliation
//! - [`anchor`] - Internal anchor validation and repair
//! - [`changelog`] - Categorized audit log and report
//! - [`progress`] - Progress events and cooperative cancellation
//! - [`pipeline`] - One complete processing pass
//! - [`config`] - TOML configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod anchor;
pub mod changelog;
pub mod config;
pub mod filter;
pub mod identifier;
pub mod lookup;
pub mod pipeline;
pub mod progress;
pub mod reconcile;
pub mod record;
pub mod replace;
pub mod retry;
mod user_agent;

// Re-export commonly used types
pub use changelog::{Category, Changelog, ChangelogEntry, build_report};
pub use config::{ConfigError, EngineConfig, LoadedConfig};
pub use lookup::{HttpLookupService, LookupClient, LookupError, LookupService};
pub use pipeline::{PassInput, PassOptions, PassOutput, RepairPipeline, TitleMode};
pub use progress::{PassControl, Phase, ProgressEvent};
pub use record::{HyperlinkRecord, LookupResult, ReplacementRule, TargetSettings};
pub use retry::{RetryExecutor, RetryPolicy};
