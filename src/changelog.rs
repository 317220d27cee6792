//! Categorized, append-only audit log of every mutation made in one pass.
//!
//! Each stage tags its entries with a [`Category`] when it creates them, so
//! the report never has to reclassify text after the fact.

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;

use crate::record::Location;

/// Indentation for entry lines under a section header.
const ENTRY_INDENT: &str = "    ";

/// Changelog category, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Updated,
    Expired,
    NotFound,
    Error,
    TitleMismatch,
    InternalHyperlinkIssue,
    Replaced,
}

impl Category {
    /// All categories in report order.
    pub const ALL: [Category; 7] = [
        Category::Updated,
        Category::Expired,
        Category::NotFound,
        Category::Error,
        Category::TitleMismatch,
        Category::InternalHyperlinkIssue,
        Category::Replaced,
    ];

    /// Section heading used in the report.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Updated => "Updated",
            Self::Expired => "Expired",
            Self::NotFound => "Not Found",
            Self::Error => "Error",
            Self::TitleMismatch => "Title Mismatch",
            Self::InternalHyperlinkIssue => "Internal Hyperlink Issues",
            Self::Replaced => "Replaced",
        }
    }

    /// Whether the section is printed even with zero entries.
    #[must_use]
    pub fn always_reported(self) -> bool {
        matches!(
            self,
            Self::Updated | Self::Expired | Self::NotFound | Self::Error
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One audit line (or block), decoupled from the record it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogEntry {
    pub category: Category,
    pub location: Option<Location>,
    pub note: String,
    /// Extra lines rendered beneath the headline, already relative-indented.
    pub details: Vec<String>,
}

impl ChangelogEntry {
    #[must_use]
    pub fn new(category: Category, note: impl Into<String>) -> Self {
        Self {
            category,
            location: None,
            note: note.into(),
            details: Vec::new(),
        }
    }

    #[must_use]
    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }

    /// Headline followed by indented detail lines.
    #[must_use]
    pub fn render_lines(&self) -> Vec<String> {
        let headline = match self.location {
            Some(location) => format!("{location} | {}", self.note),
            None => self.note.clone(),
        };
        std::iter::once(headline)
            .chain(
                self.details
                    .iter()
                    .map(|detail| format!("{ENTRY_INDENT}{detail}")),
            )
            .collect()
    }
}

/// Append-only collection of entries for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changelog {
    entries: Vec<ChangelogEntry>,
}

impl Changelog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ChangelogEntry) {
        self.entries.push(entry);
    }

    #[must_use]
    pub fn entries(&self) -> &[ChangelogEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter_category(&self, category: Category) -> impl Iterator<Item = &ChangelogEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.category == category)
    }

    #[must_use]
    pub fn count(&self, category: Category) -> usize {
        self.iter_category(category).count()
    }

    /// Per-category counts, including zeroes.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<Category, usize> {
        Category::ALL
            .iter()
            .map(|category| (*category, self.count(*category)))
            .collect()
    }

    /// Rewrites the note of the latest `category` entry at `location`.
    ///
    /// Returns false when no such entry exists; nothing is changed then.
    pub fn amend(
        &mut self,
        category: Category,
        location: Location,
        note: &str,
        detail: Option<String>,
    ) -> bool {
        let Some(entry) = self
            .entries
            .iter_mut()
            .rev()
            .find(|entry| entry.category == category && entry.location == Some(location))
        else {
            return false;
        };
        entry.note = note.to_string();
        if let Some(detail) = detail {
            entry.details.push(detail);
        }
        true
    }
}

impl Extend<ChangelogEntry> for Changelog {
    fn extend<T: IntoIterator<Item = ChangelogEntry>>(&mut self, iter: T) {
        self.entries.extend(iter);
    }
}

/// Formats a [`Changelog`] into the human-readable report.
///
/// Updated, Expired, Not Found and Error always appear with their count;
/// the remaining sections appear only when they have entries.
#[must_use]
pub fn build_report(changelog: &Changelog) -> String {
    let mut report = String::new();

    for category in Category::ALL {
        let count = changelog.count(category);
        if count == 0 && !category.always_reported() {
            continue;
        }

        let _ = writeln!(report, "{} ({count}):", category.label());
        for entry in changelog.iter_category(category) {
            for line in entry.render_lines() {
                let _ = writeln!(report, "{ENTRY_INDENT}{line}");
            }
        }
    }

    report
}
