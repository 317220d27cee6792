//! Reconciliation of external links against authoritative lookup results.
//!
//! Runs as three stages over the same record slice:
//!
//! 1. [`apply_lookup_status`] marks not-found and expired records and
//!    rewrites outdated targets to the canonical view address,
//! 2. [`detect_title_mismatches`] or [`apply_title_updates`] compares display
//!    titles with the service's title,
//! 3. [`append_content_ids`] makes sure display text ends with the six-digit
//!    content id derived from the lookup identifier.
//!
//! Every stage reads the record's identifier from [`LookupIds`], captured
//! before the first stage runs, so a rewritten target never changes which
//! result a record reconciles against. Records carrying an expired or
//! not-found marker are final and are skipped by every stage.

use std::collections::BTreeSet;

use tracing::{debug, info, instrument};

use crate::changelog::{Category, Changelog, ChangelogEntry};
use crate::identifier::{
    content_id_suffix, extract_lookup_id, last_chars, strip_content_id_suffix, titles_match,
};
use crate::progress::{PassControl, Phase};
use crate::record::{
    EXPIRED_MARKER, HyperlinkRecord, LinkKind, Location, LookupResults, NOT_FOUND_MARKER,
    TargetSettings, find_result,
};

pub const UPDATED_URL_NOTE: &str = "Updated URL";
pub const UPDATED_TITLE_NOTE: &str = "Updated Title";
pub const APPENDED_CONTENT_ID_NOTE: &str = "Appended Content ID";
pub const UPDATED_URL_AND_CONTENT_ID_NOTE: &str = "Updated URL and Appended Content ID";

/// Digits in a full content id suffix.
const CONTENT_ID_DIGITS: usize = 6;

/// Locations whose record received an Updated entry during this pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlUpdates {
    locations: BTreeSet<Location>,
}

impl UrlUpdates {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, location: Location) -> bool {
        self.locations.insert(location)
    }

    #[must_use]
    pub fn contains(&self, location: Location) -> bool {
        self.locations.contains(&location)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn merge(&mut self, other: UrlUpdates) {
        self.locations.extend(other.locations);
    }
}

/// Lookup identifier for a record taking part in reconciliation.
///
/// Returns `None` for internal/inert records, finalized records, and records
/// with no extractable identifier.
#[must_use]
pub fn reconcilable_id(record: &HyperlinkRecord) -> Option<String> {
    if record.kind() != LinkKind::External || record.has_lookup_status_marker() {
        return None;
    }
    let id = extract_lookup_id(&record.address, &record.anchor);
    (!id.is_empty()).then_some(id)
}

/// Lookup identifiers captured before any stage rewrites a target.
///
/// Indexed like the record slice it was captured from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupIds {
    ids: Vec<Option<String>>,
}

impl LookupIds {
    #[must_use]
    pub fn capture(records: &[HyperlinkRecord]) -> Self {
        Self {
            ids: records.iter().map(reconcilable_id).collect(),
        }
    }

    /// Identifier captured for record `index`, if it had one.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.ids.get(index).and_then(Option::as_deref)
    }

    /// Distinct identifiers, the batch sent to the lookup service.
    #[must_use]
    pub fn unique(&self) -> BTreeSet<String> {
        self.ids.iter().flatten().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Captured identifier for record `index`, unless a marker has since finalized it.
fn eligible_id<'a>(ids: &'a LookupIds, index: usize, record: &HyperlinkRecord) -> Option<&'a str> {
    if record.has_lookup_status_marker() {
        return None;
    }
    ids.get(index)
}

/// Canonical anchor for a resolved record.
///
/// Prefers the document id, falling back to the lookup id, and only accepts
/// an anchor that extracts back to `lookup_id`. `None` means no canonical
/// form can carry this identifier.
fn canonical_anchor(target: &TargetSettings, lookup_id: &str, document_id: &str) -> Option<String> {
    [document_id, lookup_id]
        .into_iter()
        .filter(|id| !id.is_empty())
        .map(|id| target.anchor_for(id))
        .find(|anchor| extract_lookup_id(&target.base_url, anchor).eq_ignore_ascii_case(lookup_id))
}

/// Applies lookup status: not-found and expired markers, then URL rewrites.
#[instrument(skip_all, fields(records = records.len(), results = results.len()))]
pub fn apply_lookup_status(
    records: &mut [HyperlinkRecord],
    ids: &LookupIds,
    results: &LookupResults,
    target: &TargetSettings,
    control: &PassControl,
    changelog: &mut Changelog,
) -> UrlUpdates {
    let mut updates = UrlUpdates::new();
    let total = records.len();

    for (index, record) in records.iter_mut().enumerate() {
        if !control.checkpoint(Phase::Reconciling, index, total) {
            break;
        }
        let Some(lookup_id) = eligible_id(ids, index, record) else {
            continue;
        };

        let Some(result) = find_result(results, lookup_id) else {
            record.append_marker(NOT_FOUND_MARKER);
            changelog.push(
                ChangelogEntry::new(Category::NotFound, "Not Found")
                    .at(record.location())
                    .with_detail(format!("Lookup ID: {lookup_id}")),
            );
            continue;
        };

        if !record.status.is_empty() && !result.status.is_empty() {
            record.status.clone_from(&result.status);
        }

        if result.is_expired() {
            record.append_marker(EXPIRED_MARKER);
            changelog.push(
                ChangelogEntry::new(Category::Expired, "Expired")
                    .at(record.location())
                    .with_detail(format!("Lookup ID: {lookup_id}")),
            );
            continue;
        }

        let document_id = result.document_id.trim();
        if document_id.is_empty() {
            continue;
        }
        let Some(anchor) = canonical_anchor(target, lookup_id, document_id) else {
            debug!(lookup_id, "no canonical target carries this identifier");
            continue;
        };
        if record.address == target.base_url && record.anchor == anchor {
            continue;
        }

        let old_target = describe_target(record);
        record.address.clone_from(&target.base_url);
        record.anchor = anchor;
        updates.insert(record.location());
        debug!(lookup_id, "rewrote outdated target");
        changelog.push(
            ChangelogEntry::new(Category::Updated, UPDATED_URL_NOTE)
                .at(record.location())
                .with_detail(format!("Old URL: {old_target}"))
                .with_detail(format!("New URL: {}", describe_target(record))),
        );
    }

    updates
}

/// Authoritative title differing from the record's sanitized display title.
fn title_change<'a>(
    record: &HyperlinkRecord,
    lookup_id: &str,
    results: &'a LookupResults,
) -> Option<(String, &'a str)> {
    let result = find_result(results, lookup_id)?;
    let authoritative = result.title.trim();
    if authoritative.is_empty() {
        return None;
    }
    let current = strip_content_id_suffix(&record.display_text);
    (!titles_match(&current, authoritative)).then_some((current, authoritative))
}

/// Records a Title Mismatch entry for every differing title without mutating.
#[instrument(skip_all, fields(records = records.len()))]
pub fn detect_title_mismatches(
    records: &[HyperlinkRecord],
    ids: &LookupIds,
    results: &LookupResults,
    control: &PassControl,
    changelog: &mut Changelog,
) -> usize {
    let mut mismatches = 0;
    let total = records.len();

    for (index, record) in records.iter().enumerate() {
        if !control.checkpoint(Phase::Reconciling, index, total) {
            break;
        }
        let Some(lookup_id) = eligible_id(ids, index, record) else {
            continue;
        };
        let Some((current, authoritative)) = title_change(record, lookup_id, results) else {
            continue;
        };
        mismatches += 1;
        changelog.push(
            ChangelogEntry::new(Category::TitleMismatch, "Title Mismatch")
                .at(record.location())
                .with_detail(format!("Current Title: {current}"))
                .with_detail(format!("Authoritative Title: {authoritative}")),
        );
    }

    if mismatches > 0 {
        info!(mismatches, "title mismatches detected");
    }
    mismatches
}

/// Rewrites differing titles, keeping any existing content-id suffix.
#[instrument(skip_all, fields(records = records.len()))]
pub fn apply_title_updates(
    records: &mut [HyperlinkRecord],
    ids: &LookupIds,
    results: &LookupResults,
    control: &PassControl,
    changelog: &mut Changelog,
) -> UrlUpdates {
    let mut updates = UrlUpdates::new();
    let total = records.len();

    for (index, record) in records.iter_mut().enumerate() {
        if !control.checkpoint(Phase::Reconciling, index, total) {
            break;
        }
        let Some(lookup_id) = eligible_id(ids, index, record) else {
            continue;
        };
        let Some((current, authoritative)) = title_change(record, lookup_id, results) else {
            continue;
        };

        let new_text = match content_id_suffix(&record.display_text) {
            Some(suffix) => format!("{authoritative} ({suffix})"),
            None => authoritative.to_string(),
        };
        record.display_text = new_text;
        updates.insert(record.location());
        changelog.push(
            ChangelogEntry::new(Category::Updated, UPDATED_TITLE_NOTE)
                .at(record.location())
                .with_detail(format!("Old Title: {current}"))
                .with_detail(format!("New Title: {authoritative}")),
        );
    }

    if !updates.is_empty() {
        info!(updated = updates.len(), "titles updated");
    }
    updates
}

/// Ensures every eligible external display text ends with `(NNNNNN)`.
///
/// A trailing five-digit suffix equal to the id's last five digits is
/// widened in place, a suffix for any other id is replaced, and otherwise
/// the six-digit suffix is appended. Records in
/// `url_updates` have their existing Updated entry amended instead of
/// getting a second one.
#[instrument(skip_all, fields(records = records.len(), url_updates = url_updates.len()))]
pub fn append_content_ids(
    records: &mut [HyperlinkRecord],
    ids: &LookupIds,
    url_updates: &UrlUpdates,
    control: &PassControl,
    changelog: &mut Changelog,
) -> usize {
    let mut appended = 0;
    let total = records.len();

    for (index, record) in records.iter_mut().enumerate() {
        if !control.checkpoint(Phase::Reconciling, index, total) {
            break;
        }
        let Some(lookup_id) = eligible_id(ids, index, record) else {
            continue;
        };
        let Some(new_text) = with_content_id(&record.display_text, lookup_id) else {
            continue;
        };

        record.display_text = new_text;
        appended += 1;

        let detail = format!(
            "Content ID: ({})",
            last_chars(lookup_id, CONTENT_ID_DIGITS)
        );
        let location = record.location();
        if url_updates.contains(location)
            && changelog.amend(
                Category::Updated,
                location,
                UPDATED_URL_AND_CONTENT_ID_NOTE,
                Some(detail.clone()),
            )
        {
            continue;
        }
        let note = if url_updates.contains(location) {
            UPDATED_URL_AND_CONTENT_ID_NOTE
        } else {
            APPENDED_CONTENT_ID_NOTE
        };
        changelog.push(
            ChangelogEntry::new(Category::Updated, note)
                .at(location)
                .with_detail(detail),
        );
    }

    if appended > 0 {
        info!(appended, "content ids appended");
    }
    appended
}

/// Display text with the content id suffix applied, or `None` if unchanged.
fn with_content_id(display_text: &str, lookup_id: &str) -> Option<String> {
    let six = last_chars(lookup_id, CONTENT_ID_DIGITS);
    if six.chars().count() != CONTENT_ID_DIGITS || !six.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let trimmed = display_text.trim_end();
    if trimmed.ends_with(&format!("({six})")) {
        return None;
    }

    let five = last_chars(six, CONTENT_ID_DIGITS - 1);
    let short_suffix = format!("({five})");
    if let Some(prefix) = trimmed.strip_suffix(&short_suffix) {
        return Some(format!("{prefix}({six})"));
    }

    // A stale id belonging to another document is replaced, never stacked.
    if content_id_suffix(trimmed).is_some() {
        let title = strip_content_id_suffix(trimmed);
        return Some(if title.is_empty() {
            format!("({six})")
        } else {
            format!("{title} ({six})")
        });
    }

    Some(format!("{trimmed} ({six})"))
}

fn describe_target(record: &HyperlinkRecord) -> String {
    if record.anchor.is_empty() {
        record.address.clone()
    } else {
        format!("{}#{}", record.address, record.anchor)
    }
}
