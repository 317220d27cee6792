//! Internal hyperlink (bookmark anchor) validation and repair.
//!
//! Anchors are compared after stripping one leading `_` or `!` and ignoring
//! case. An anchor that does not resolve is matched against the valid set in
//! three tiers: case-insensitive equality, substring containment in either
//! direction, then fuzzy similarity. Anything left over is marked broken.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info, instrument};

use crate::changelog::{Category, Changelog, ChangelogEntry};
use crate::progress::{PassControl, Phase};
use crate::record::{BROKEN_MARKER, HyperlinkRecord, LinkKind};

/// Fuzzy similarity (0.0-1.0) at or above which a candidate is accepted.
pub const ANCHOR_FUZZY_THRESHOLD: f64 = 0.75;

pub const FIXED_NOTE: &str = "Fixed, No Review Necessary";
pub const ATTEMPTED_NOTE: &str = "Attempted Fix, Please Review";
pub const BROKEN_NOTE: &str = "Broken Internal Hyperlink";

/// Strips one leading `_` or `!`.
#[must_use]
pub fn clean_anchor(anchor: &str) -> &str {
    anchor
        .strip_prefix('_')
        .or_else(|| anchor.strip_prefix('!'))
        .unwrap_or(anchor)
}

/// How a broken anchor matched a valid one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AnchorMatchKind {
    Fuzzy,
    Substring,
    CaseInsensitive,
}

/// Best candidate for a broken anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorMatch {
    /// Cleaned canonical anchor, without the `_` prefix.
    pub anchor: String,
    pub kind: AnchorMatchKind,
    pub similarity: f64,
}

/// The set of anchors that resolve inside the document.
#[derive(Debug, Clone, Default)]
pub struct ValidAnchors {
    /// Cleaned anchors exactly as written.
    exact: HashSet<String>,
    /// Lower-cased cleaned anchor -> first canonical spelling in sorted order.
    by_lower: BTreeMap<String, String>,
}

impl ValidAnchors {
    /// Builds the set from the document's bookmark names.
    #[must_use]
    pub fn from_bookmarks<I, S>(bookmarks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut cleaned: Vec<String> = bookmarks
            .into_iter()
            .map(|name| clean_anchor(name.as_ref().trim()).to_string())
            .filter(|name| !name.is_empty())
            .collect();
        cleaned.sort();
        cleaned.dedup();

        let mut anchors = Self::default();
        for name in cleaned {
            anchors
                .by_lower
                .entry(name.to_lowercase())
                .or_insert_with(|| name.clone());
            anchors.exact.insert(name);
        }
        anchors
    }

    /// Builds the set from every non-empty record anchor, external ones included.
    ///
    /// Used when the document exposes no bookmark list.
    #[must_use]
    pub fn from_records(records: &[HyperlinkRecord]) -> Self {
        Self::from_bookmarks(records.iter().map(|record| record.anchor.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.exact.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    /// Case-sensitive membership of a cleaned anchor.
    #[must_use]
    pub fn contains(&self, cleaned: &str) -> bool {
        self.exact.contains(cleaned)
    }

    /// Finds the best repair candidate for a cleaned anchor.
    #[must_use]
    pub fn find_match(&self, cleaned: &str) -> Option<AnchorMatch> {
        let query = cleaned.trim().to_lowercase();
        if query.is_empty() {
            return None;
        }

        if let Some(canonical) = self.by_lower.get(&query) {
            return Some(AnchorMatch {
                anchor: canonical.clone(),
                kind: AnchorMatchKind::CaseInsensitive,
                similarity: 1.0,
            });
        }

        // Iteration is over sorted lower-cased keys, so ties stay deterministic.
        let substring = self
            .by_lower
            .iter()
            .filter(|(lower, _)| lower.contains(&query) || query.contains(lower.as_str()))
            .min_by(|(left, _), (right, _)| {
                left.chars()
                    .count()
                    .cmp(&right.chars().count())
                    .then_with(|| left.cmp(right))
            });
        if let Some((lower, canonical)) = substring {
            return Some(AnchorMatch {
                anchor: canonical.clone(),
                kind: AnchorMatchKind::Substring,
                similarity: strsim::normalized_levenshtein(&query, lower),
            });
        }

        self.by_lower
            .iter()
            .map(|(lower, canonical)| {
                (
                    lower,
                    canonical,
                    strsim::normalized_levenshtein(&query, lower),
                )
            })
            .filter(|(_, _, similarity)| *similarity >= ANCHOR_FUZZY_THRESHOLD)
            .min_by(compare_fuzzy)
            .map(|(_, canonical, similarity)| AnchorMatch {
                anchor: canonical.clone(),
                kind: AnchorMatchKind::Fuzzy,
                similarity,
            })
    }
}

/// Highest similarity first, then shorter, then lexicographic.
fn compare_fuzzy(left: &(&String, &String, f64), right: &(&String, &String, f64)) -> Ordering {
    right
        .2
        .partial_cmp(&left.2)
        .unwrap_or(Ordering::Equal)
        .then_with(|| left.0.chars().count().cmp(&right.0.chars().count()))
        .then_with(|| left.0.cmp(right.0))
}

/// What the repair stage decided for one internal record.
#[derive(Debug, Clone, PartialEq)]
pub enum AnchorRepair {
    /// Resolves and needs no change.
    Valid,
    /// Rewritten with no review required.
    Fixed(String),
    /// Rewritten to a guessed target; a human should check it.
    Attempted(String),
    /// No candidate; display text gets the broken marker.
    Broken,
    /// Already carries the broken marker.
    AlreadyBroken,
}

/// Classifies one internal record against the valid anchors.
#[must_use]
pub fn classify_anchor(record: &HyperlinkRecord, valid: &ValidAnchors) -> AnchorRepair {
    let anchor = record.anchor.as_str();
    let cleaned = clean_anchor(anchor);

    if valid.contains(cleaned) {
        if anchor.starts_with('_') || anchor.starts_with('!') {
            return AnchorRepair::Valid;
        }
        return AnchorRepair::Fixed(format!("_{cleaned}"));
    }

    if record.display_text.contains(BROKEN_MARKER) {
        return AnchorRepair::AlreadyBroken;
    }

    match valid.find_match(cleaned) {
        Some(found) if found.kind == AnchorMatchKind::CaseInsensitive => {
            AnchorRepair::Fixed(format!("_{}", found.anchor))
        }
        Some(found) => AnchorRepair::Attempted(format!("_{}", found.anchor)),
        None => AnchorRepair::Broken,
    }
}

/// Totals from one repair run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnchorRepairStats {
    pub checked: usize,
    pub fixed: usize,
    pub attempted: usize,
    pub broken: usize,
}

/// Validates and repairs every internal record in place.
///
/// External and inert records are left alone. Stops early when the pass is
/// cancelled; records already processed keep their changes.
#[instrument(skip_all, fields(records = records.len(), valid = valid.len()))]
pub fn repair_internal_links(
    records: &mut [HyperlinkRecord],
    valid: &ValidAnchors,
    control: &PassControl,
    changelog: &mut Changelog,
) -> AnchorRepairStats {
    let mut stats = AnchorRepairStats::default();
    let total = records.len();

    for (index, record) in records.iter_mut().enumerate() {
        if !control.checkpoint(Phase::RepairingAnchors, index, total) {
            debug!(index, "anchor repair cancelled");
            break;
        }
        if record.kind() != LinkKind::Internal {
            continue;
        }
        stats.checked += 1;

        match classify_anchor(record, valid) {
            AnchorRepair::Valid | AnchorRepair::AlreadyBroken => {}
            AnchorRepair::Fixed(new_anchor) => {
                stats.fixed += 1;
                rewrite_anchor(record, new_anchor, FIXED_NOTE, changelog);
            }
            AnchorRepair::Attempted(new_anchor) => {
                stats.attempted += 1;
                rewrite_anchor(record, new_anchor, ATTEMPTED_NOTE, changelog);
            }
            AnchorRepair::Broken => {
                stats.broken += 1;
                record.append_marker(BROKEN_MARKER);
                changelog.push(
                    ChangelogEntry::new(Category::InternalHyperlinkIssue, BROKEN_NOTE)
                        .at(record.location())
                        .with_detail(format!("Anchor: {}", record.anchor)),
                );
            }
        }
    }

    if stats.fixed + stats.attempted + stats.broken > 0 {
        info!(
            fixed = stats.fixed,
            attempted = stats.attempted,
            broken = stats.broken,
            "internal links repaired"
        );
    }
    stats
}

fn rewrite_anchor(
    record: &mut HyperlinkRecord,
    new_anchor: String,
    note: &str,
    changelog: &mut Changelog,
) {
    let old_anchor = std::mem::replace(&mut record.anchor, new_anchor);
    debug!(old = %old_anchor, new = %record.anchor, note, "anchor rewritten");
    changelog.push(
        ChangelogEntry::new(Category::InternalHyperlinkIssue, note)
            .at(record.location())
            .with_detail(format!("Old Anchor: {old_anchor}"))
            .with_detail(format!("New Anchor: {}", record.anchor)),
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn valid() -> ValidAnchors {
        ValidAnchors::from_bookmarks(["_intro", "_summary"])
    }

    fn internal(anchor: &str, text: &str) -> HyperlinkRecord {
        HyperlinkRecord::new("", anchor, text)
    }

    // ==================== Matching Tests ====================

    #[test]
    fn test_clean_anchor_strips_one_prefix() {
        assert_eq!(clean_anchor("_intro"), "intro");
        assert_eq!(clean_anchor("!intro"), "intro");
        assert_eq!(clean_anchor("__intro"), "_intro");
        assert_eq!(clean_anchor("intro"), "intro");
    }

    #[test]
    fn test_from_bookmarks_is_sorted_and_deduplicated() {
        let anchors = ValidAnchors::from_bookmarks(["_b", "a", "!a", "", "_"]);
        assert_eq!(anchors.len(), 2);
        assert!(anchors.contains("a"));
        assert!(anchors.contains("b"));
    }

    #[test]
    fn test_from_records_takes_every_non_empty_anchor() {
        let records = vec![
            internal("_intro", "Intro"),
            HyperlinkRecord::new("https://docs.example.com/guide", "setup", "Guide"),
            HyperlinkRecord::new("https://docs.example.com/plain", "", "Plain"),
        ];
        let anchors = ValidAnchors::from_records(&records);
        assert_eq!(anchors.len(), 2);
        assert!(anchors.contains("intro"));
        assert!(anchors.contains("setup"));
    }

    #[test]
    fn test_find_match_prefers_shortest_substring() {
        let anchors = ValidAnchors::from_bookmarks(["_scope_details", "_scope", "_scopes"]);
        let found = anchors.find_match("scop").unwrap();
        assert_eq!(found.kind, AnchorMatchKind::Substring);
        assert_eq!(found.anchor, "scope");
    }

    #[test]
    fn test_find_match_substring_either_direction() {
        let anchors = ValidAnchors::from_bookmarks(["_intro"]);
        let found = anchors.find_match("intro_section").unwrap();
        assert_eq!(found.kind, AnchorMatchKind::Substring);
        assert_eq!(found.anchor, "intro");
    }

    #[test]
    fn test_find_match_fuzzy_tier() {
        let found = valid().find_match("Into").unwrap();
        assert_eq!(found.kind, AnchorMatchKind::Fuzzy);
        assert_eq!(found.anchor, "intro");
        assert!(found.similarity >= ANCHOR_FUZZY_THRESHOLD);
    }

    #[test]
    fn test_find_match_none_for_unrelated_or_empty() {
        assert!(valid().find_match("zzz").is_none());
        assert!(valid().find_match("").is_none());
    }

    // ==================== Classification Tests ====================

    #[test]
    fn test_classify_valid_prefixed_anchor_is_unchanged() {
        assert_eq!(classify_anchor(&internal("_intro", "Intro"), &valid()), AnchorRepair::Valid);
        assert_eq!(classify_anchor(&internal("!intro", "Intro"), &valid()), AnchorRepair::Valid);
    }

    #[test]
    fn test_classify_bare_valid_anchor_gets_prefix() {
        assert_eq!(
            classify_anchor(&internal("intro", "Intro"), &valid()),
            AnchorRepair::Fixed("_intro".to_string())
        );
    }

    #[test]
    fn test_classify_case_mismatch_is_fixed() {
        assert_eq!(
            classify_anchor(&internal("_INTRO", "Intro"), &valid()),
            AnchorRepair::Fixed("_intro".to_string())
        );
    }

    #[test]
    fn test_classify_near_miss_is_attempted() {
        assert_eq!(
            classify_anchor(&internal("Into", "Intro"), &valid()),
            AnchorRepair::Attempted("_intro".to_string())
        );
    }

    #[test]
    fn test_classify_already_broken() {
        assert_eq!(
            classify_anchor(&internal("zzz", "Appendix - Broken"), &valid()),
            AnchorRepair::AlreadyBroken
        );
    }

    // ==================== Repair Tests ====================

    #[test]
    fn test_repair_records_and_changelog() {
        let mut records = vec![
            internal("_INTRO", "Intro").at(1, 1),
            internal("Into", "Intro").at(1, 2),
            internal("zzz", "Appendix").at(1, 3),
            internal("_summary", "Summary").at(1, 4),
            HyperlinkRecord::new("https://x", "zzz", "External").at(1, 5),
        ];
        let mut changelog = Changelog::new();

        let stats = repair_internal_links(&mut records, &valid(), &PassControl::new(), &mut changelog);

        assert_eq!(records[0].anchor, "_intro");
        assert_eq!(records[1].anchor, "_intro");
        assert_eq!(records[2].display_text, "Appendix - Broken");
        assert_eq!(records[3].anchor, "_summary");
        assert_eq!(records[4].anchor, "zzz");
        assert_eq!(
            stats,
            AnchorRepairStats {
                checked: 4,
                fixed: 1,
                attempted: 1,
                broken: 1
            }
        );

        let notes: Vec<_> = changelog.entries().iter().map(|e| e.note.as_str()).collect();
        assert_eq!(notes, vec![FIXED_NOTE, ATTEMPTED_NOTE, BROKEN_NOTE]);
        assert!(changelog
            .entries()
            .iter()
            .all(|e| e.category == Category::InternalHyperlinkIssue));
    }

    #[test]
    fn test_repair_is_idempotent() {
        let mut records = vec![
            internal("_INTRO", "Intro"),
            internal("Into", "Intro"),
            internal("zzz", "Appendix"),
        ];
        let mut first = Changelog::new();
        repair_internal_links(&mut records, &valid(), &PassControl::new(), &mut first);
        let after_first = records.clone();

        let mut second = Changelog::new();
        let stats = repair_internal_links(&mut records, &valid(), &PassControl::new(), &mut second);

        assert!(second.is_empty());
        assert_eq!(records, after_first);
        assert_eq!(stats.fixed + stats.attempted + stats.broken, 0);
    }

    #[test]
    fn test_repair_from_records_treats_all_anchors_as_valid() {
        let mut records = vec![internal("_intro", "Intro"), internal("!legacy", "Legacy")];
        let anchors = ValidAnchors::from_records(&records);
        let mut changelog = Changelog::new();
        repair_internal_links(&mut records, &anchors, &PassControl::new(), &mut changelog);
        assert!(changelog.is_empty());
    }

    #[test]
    fn test_repair_stops_when_cancelled() {
        let control = PassControl::new();
        control.cancel();
        let mut records = vec![internal("zzz", "Appendix")];
        let mut changelog = Changelog::new();
        let stats = repair_internal_links(&mut records, &valid(), &control, &mut changelog);
        assert_eq!(stats.checked, 0);
        assert_eq!(records[0].display_text, "Appendix");
    }
}
