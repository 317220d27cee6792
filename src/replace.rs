//! User-defined title replacement rules.
//!
//! Rules retarget links whose sanitized display title matches `old_title`
//! (case-insensitively) to a new title and document. They run before any
//! lookup work and need no service access.

use tracing::{info, instrument, warn};

use crate::changelog::{Category, Changelog, ChangelogEntry};
use crate::identifier::{last_chars, strip_content_id_suffix, titles_match};
use crate::progress::{PassControl, Phase};
use crate::record::{HyperlinkRecord, LinkKind, ReplacementRule, TargetSettings};

/// Applies `rules` to `records`; a record is rewritten by at most one rule.
///
/// Rules are tried in order and the first match wins. Invalid rules (any
/// blank field) are ignored. Returns the number of records replaced.
#[instrument(skip_all, fields(records = records.len(), rules = rules.len()))]
pub fn apply_replacement_rules(
    records: &mut [HyperlinkRecord],
    rules: &[ReplacementRule],
    target: &TargetSettings,
    control: &PassControl,
    changelog: &mut Changelog,
) -> usize {
    let valid: Vec<&ReplacementRule> = rules.iter().filter(|rule| rule.is_valid()).collect();
    if valid.len() < rules.len() {
        warn!(
            ignored = rules.len() - valid.len(),
            "ignoring replacement rules with blank fields"
        );
    }
    if valid.is_empty() {
        return 0;
    }

    let mut replaced = 0;
    let total = records.len();

    for (index, record) in records.iter_mut().enumerate() {
        if !control.checkpoint(Phase::Replacing, index, total) {
            break;
        }
        if record.kind() == LinkKind::Inert {
            continue;
        }

        let title = strip_content_id_suffix(&record.display_text);
        let Some(rule) = valid
            .iter()
            .find(|rule| titles_match(&title, &rule.old_title))
        else {
            continue;
        };

        if apply_rule(record, rule, target, changelog) {
            replaced += 1;
        }
    }

    if replaced > 0 {
        info!(replaced, "replacement rules applied");
    }
    replaced
}

/// Rewrites one record; returns false when it is already in the target state.
fn apply_rule(
    record: &mut HyperlinkRecord,
    rule: &ReplacementRule,
    target: &TargetSettings,
    changelog: &mut Changelog,
) -> bool {
    let content_id = rule.new_content_id.trim();
    let display_text = format!("{} ({})", rule.new_title.trim(), last_chars(content_id, 6));
    let anchor = target.anchor_for(content_id);

    if record.display_text == display_text
        && record.address == target.base_url
        && record.anchor == anchor
    {
        return false;
    }

    let old_text = std::mem::replace(&mut record.display_text, display_text);
    record.address.clone_from(&target.base_url);
    record.anchor = anchor;

    changelog.push(
        ChangelogEntry::new(Category::Replaced, "Replaced")
            .at(record.location())
            .with_detail(format!("Old: {old_text}"))
            .with_detail(format!("New: {}", record.display_text)),
    );
    true
}
