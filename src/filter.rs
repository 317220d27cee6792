//! Removal of hyperlinks with nothing to click on.

use tracing::debug;

use crate::changelog::{Category, Changelog, ChangelogEntry};
use crate::record::HyperlinkRecord;

/// Changelog note for a removed link.
pub const INVISIBLE_LINK_NOTE: &str = "Invisible Hyperlink Deleted";

/// True when the display text is empty or whitespace only.
#[must_use]
pub fn is_invisible(record: &HyperlinkRecord) -> bool {
    record.display_text.trim().is_empty()
}

/// Removes invisible records, preserving the order of the survivors.
///
/// Returns the removed records so the caller can delete them from the
/// document.
pub fn remove_invisible_links(records: &mut Vec<HyperlinkRecord>) -> Vec<HyperlinkRecord> {
    let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(records)
        .into_iter()
        .partition(is_invisible);
    *records = kept;

    if !removed.is_empty() {
        debug!(removed = removed.len(), remaining = records.len(), "removed invisible links");
    }
    removed
}

/// One Error entry per removed record.
pub fn log_removed(removed: &[HyperlinkRecord], changelog: &mut Changelog) {
    changelog.extend(removed.iter().map(|record| {
        ChangelogEntry::new(Category::Error, INVISIBLE_LINK_NOTE)
            .at(record.location())
            .with_detail(format!("Address: {}", describe_target(record)))
    }));
}

fn describe_target(record: &HyperlinkRecord) -> String {
    match (record.address.is_empty(), record.anchor.is_empty()) {
        (false, false) => format!("{}#{}", record.address, record.anchor),
        (false, true) => record.address.clone(),
        (true, false) => format!("#{}", record.anchor),
        (true, true) => "(none)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_blank_and_whitespace_links_in_order() {
        let mut records = vec![
            HyperlinkRecord::new("https://a", "", "A").at(1, 1),
            HyperlinkRecord::new("https://b", "", "").at(1, 2),
            HyperlinkRecord::new("https://c", "", "C").at(1, 3),
            HyperlinkRecord::new("", "x", " \t\n").at(1, 4),
        ];

        let removed = remove_invisible_links(&mut records);

        let kept: Vec<_> = records.iter().map(|r| r.display_text.as_str()).collect();
        assert_eq!(kept, vec!["A", "C"]);
        assert_eq!(removed.len(), 2);
        assert_eq!(removed[0].address, "https://b");
    }

    #[test]
    fn test_nothing_removed_when_all_visible() {
        let mut records = vec![HyperlinkRecord::new("https://a", "", "A")];
        assert!(remove_invisible_links(&mut records).is_empty());
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_log_removed_writes_error_entries() {
        let removed = vec![HyperlinkRecord::new("https://b", "frag", "").at(2, 7)];
        let mut changelog = Changelog::new();
        log_removed(&removed, &mut changelog);

        assert_eq!(changelog.count(Category::Error), 1);
        let entry = &changelog.entries()[0];
        assert_eq!(entry.note, INVISIBLE_LINK_NOTE);
        assert_eq!(entry.render_lines()[0], "Page:2 | Line:7 | Invisible Hyperlink Deleted");
        assert_eq!(entry.details, vec!["Address: https://b#frag"]);
    }
}
