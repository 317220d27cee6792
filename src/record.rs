//! Hyperlink records and the authoritative data they are reconciled against.
//!
//! Records are supplied by the document collaborator for one processing pass,
//! mutated in place, and handed back. Nothing in this module performs I/O.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Marker appended to display text when a lookup result reports expiry.
pub const EXPIRED_MARKER: &str = " - Expired";

/// Marker appended to display text when the service has no matching record.
pub const NOT_FOUND_MARKER: &str = " - Not Found";

/// Marker appended to display text when an internal anchor cannot be repaired.
pub const BROKEN_MARKER: &str = " - Broken";

/// One hyperlink found in a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HyperlinkRecord {
    /// External target; empty for purely internal links.
    pub address: String,
    /// In-document bookmark target (sub-address).
    pub anchor: String,
    /// Visible label.
    pub display_text: String,
    /// 1-based page hint, used only for changelog keys.
    pub page_number: u32,
    /// 1-based line hint, used only for changelog keys.
    pub line_number: u32,
    pub content_id: String,
    pub status: String,
    /// Opaque handle owned by the document collaborator.
    pub element_id: String,
}

/// How the processing stages treat a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Non-empty address.
    External,
    /// Empty address, non-empty anchor.
    Internal,
    /// Both empty; skipped by every stage.
    Inert,
}

impl HyperlinkRecord {
    /// Creates a record with the given target and label, positioned at page 1, line 1.
    #[must_use]
    pub fn new(
        address: impl Into<String>,
        anchor: impl Into<String>,
        display_text: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            anchor: anchor.into(),
            display_text: display_text.into(),
            page_number: 1,
            line_number: 1,
            ..Self::default()
        }
    }

    /// Sets the page/line position hint.
    #[must_use]
    pub fn at(mut self, page_number: u32, line_number: u32) -> Self {
        self.page_number = page_number;
        self.line_number = line_number;
        self
    }

    #[must_use]
    pub fn kind(&self) -> LinkKind {
        if !self.address.is_empty() {
            LinkKind::External
        } else if !self.anchor.is_empty() {
            LinkKind::Internal
        } else {
            LinkKind::Inert
        }
    }

    #[must_use]
    pub fn location(&self) -> Location {
        Location {
            page: self.page_number,
            line: self.line_number,
        }
    }

    /// Returns true when display text carries an expired or not-found marker.
    ///
    /// Such records are finalized and excluded from title and content-id work.
    #[must_use]
    pub fn has_lookup_status_marker(&self) -> bool {
        let lower = self.display_text.to_lowercase();
        lower.contains(&EXPIRED_MARKER.to_lowercase())
            || lower.contains(&NOT_FOUND_MARKER.to_lowercase())
    }

    /// Appends `marker` to the display text unless it is already present.
    ///
    /// Returns true when the text changed.
    pub fn append_marker(&mut self, marker: &str) -> bool {
        if self.display_text.contains(marker) {
            return false;
        }
        self.display_text = format!("{}{marker}", self.display_text);
        true
    }
}

/// Page/line position of a record, used as the changelog key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    pub page: u32,
    pub line: u32,
}

impl Location {
    /// Compact `page:line` tracking key.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}", self.page, self.line)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page:{} | Line:{}", self.page, self.line)
    }
}

/// Authoritative record returned by the lookup service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupResult {
    pub document_id: String,
    pub content_id: String,
    pub title: String,
    pub status: String,
}

impl LookupResult {
    /// Returns true when the service reports the document as expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("expired")
    }
}

/// Lookup results keyed by lookup identifier, alive for one pass.
pub type LookupResults = HashMap<String, LookupResult>;

/// Finds the result for `lookup_id`, falling back to a case-insensitive key match.
#[must_use]
pub fn find_result<'a>(results: &'a LookupResults, lookup_id: &str) -> Option<&'a LookupResult> {
    results.get(lookup_id).or_else(|| {
        results
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(lookup_id))
            .map(|(_, result)| result)
    })
}

/// Where canonical document links point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSettings {
    /// Address written into rewritten records.
    pub base_url: String,
    /// Prefix joined with a document id to form the anchor.
    pub view_path_prefix: String,
}

impl TargetSettings {
    #[must_use]
    pub fn new(base_url: impl Into<String>, view_path_prefix: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            view_path_prefix: view_path_prefix.into(),
        }
    }

    /// Anchor addressing `document_id` under the view path.
    #[must_use]
    pub fn anchor_for(&self, document_id: &str) -> String {
        format!("{}{}", self.view_path_prefix, document_id.trim())
    }
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self::new("https://docs.example.com/portal", "view/")
    }
}

/// User directive replacing one title with another, independent of the lookup service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplacementRule {
    pub old_title: String,
    pub new_title: String,
    pub new_content_id: String,
}

impl ReplacementRule {
    #[must_use]
    pub fn new(
        old_title: impl Into<String>,
        new_title: impl Into<String>,
        new_content_id: impl Into<String>,
    ) -> Self {
        Self {
            old_title: old_title.into(),
            new_title: new_title.into(),
            new_content_id: new_content_id.into(),
        }
    }

    /// A rule is usable only when all three fields are non-blank.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.old_title.trim().is_empty()
            && !self.new_title.trim().is_empty()
            && !self.new_content_id.trim().is_empty()
    }
}
