//! One complete processing pass over a document's hyperlinks.
//!
//! Stage order:
//!
//! 1. remove invisible links,
//! 2. apply replacement rules,
//! 3. batch-look up every external identifier (skipped when offline),
//! 4. apply lookup status (not found, expired, canonical URL),
//! 5. detect or apply title changes,
//! 6. append content ids,
//! 7. repair internal anchors,
//! 8. build the report.
//!
//! Each stage finishes before the next begins. The pass owns its records and
//! changelog and hands both back in [`PassOutput`]; a cancelled pass returns
//! whatever was done so far with [`PassOutput::cancelled`] set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::anchor::{ValidAnchors, repair_internal_links};
use crate::changelog::{Category, Changelog, ChangelogEntry, build_report};
use crate::filter::{log_removed, remove_invisible_links};
use crate::lookup::{LookupBatch, LookupClient};
use crate::progress::{PassControl, Phase};
use crate::reconcile::{
    LookupIds, UrlUpdates, append_content_ids, apply_lookup_status, apply_title_updates,
    detect_title_mismatches,
};
use crate::record::{HyperlinkRecord, ReplacementRule, TargetSettings};
use crate::replace::apply_replacement_rules;

/// Changelog note logged when the lookup call fails.
pub const LOOKUP_FAILED_NOTE: &str = "Lookup Service Unavailable";

/// What to do with titles that differ from the authoritative title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TitleMode {
    /// Rewrite display titles.
    #[default]
    Apply,
    /// Only report mismatches.
    DetectOnly,
}

/// Records and document metadata supplied by the document collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassInput {
    pub records: Vec<HyperlinkRecord>,
    /// Bookmark names in the document; record anchors are used when absent.
    pub bookmarks: Option<Vec<String>>,
}

/// Settings that stay fixed for a pass.
#[derive(Debug, Clone, Default)]
pub struct PassOptions {
    pub target: TargetSettings,
    pub replacements: Vec<ReplacementRule>,
    pub title_mode: TitleMode,
}

/// Everything a pass produced.
#[derive(Debug, Clone, Default)]
pub struct PassOutput {
    /// Surviving records with their new field values.
    pub records: Vec<HyperlinkRecord>,
    /// Invisible records the caller must delete from the document.
    pub removed: Vec<HyperlinkRecord>,
    pub changelog: Changelog,
    /// Rendered report text.
    pub report: String,
    pub counts: BTreeMap<Category, usize>,
    /// Service reported a different version; advisory only.
    pub service_needs_update: bool,
    /// Service changelog notes accompanying a version change.
    pub service_notes: Vec<String>,
    pub cancelled: bool,
}

/// Runs processing passes with a fixed configuration.
#[derive(Debug)]
pub struct RepairPipeline {
    options: PassOptions,
    lookup: Option<LookupClient>,
    control: PassControl,
}

impl RepairPipeline {
    /// Creates an offline pipeline; attach a client with [`Self::with_lookup`].
    #[must_use]
    pub fn new(options: PassOptions) -> Self {
        Self {
            options,
            lookup: None,
            control: PassControl::new(),
        }
    }

    #[must_use]
    pub fn with_lookup(mut self, client: LookupClient) -> Self {
        self.lookup = Some(client);
        self
    }

    #[must_use]
    pub fn with_control(mut self, control: PassControl) -> Self {
        self.control = control;
        self
    }

    #[must_use]
    pub fn control(&self) -> &PassControl {
        &self.control
    }

    /// Runs one full pass.
    #[instrument(skip_all, fields(records = input.records.len()))]
    pub async fn run(&self, input: PassInput) -> PassOutput {
        let PassInput {
            mut records,
            bookmarks,
        } = input;
        let mut changelog = Changelog::new();
        let control = &self.control;

        control.report(Phase::Filtering, 0, records.len());
        let removed = remove_invisible_links(&mut records);
        log_removed(&removed, &mut changelog);

        let mut output = PassOutput {
            removed,
            ..PassOutput::default()
        };

        if !control.is_cancelled() && !self.options.replacements.is_empty() {
            apply_replacement_rules(
                &mut records,
                &self.options.replacements,
                &self.options.target,
                control,
                &mut changelog,
            );
        }
        tokio::task::yield_now().await;

        if !control.is_cancelled() {
            let ids = LookupIds::capture(&records);
            let batch = self.lookup_all(&ids).await;
            if let Some(client) = &self.lookup {
                output.service_needs_update = client.needs_update();
            }
            if let Some(batch) = &batch {
                output.service_notes.clone_from(&batch.notes);
            }
            self.reconcile(&mut records, &ids, batch, &mut changelog);
        }
        tokio::task::yield_now().await;

        if !control.is_cancelled() {
            let valid = match &bookmarks {
                Some(names) => ValidAnchors::from_bookmarks(names),
                None => ValidAnchors::from_records(&records),
            };
            repair_internal_links(&mut records, &valid, control, &mut changelog);
        }

        output.cancelled = control.is_cancelled();
        if output.cancelled {
            warn!("pass cancelled; returning partial results");
        } else {
            control.report(Phase::Complete, records.len(), records.len());
        }

        output.report = build_report(&changelog);
        output.counts = changelog.counts();
        info!(
            records = records.len(),
            removed = output.removed.len(),
            entries = changelog.len(),
            cancelled = output.cancelled,
            "pass complete"
        );
        output.records = records;
        output.changelog = changelog;
        output
    }

    /// Collects identifiers and performs the single batched lookup.
    async fn lookup_all(&self, ids: &LookupIds) -> Option<LookupBatch> {
        let client = self.lookup.as_ref()?;
        let ids = ids.unique();
        self.control.report(Phase::LookingUp, 0, ids.len());
        let batch = client.lookup(&ids).await;
        self.control.report(Phase::LookingUp, ids.len(), ids.len());
        Some(batch)
    }

    fn reconcile(
        &self,
        records: &mut [HyperlinkRecord],
        ids: &LookupIds,
        batch: Option<LookupBatch>,
        changelog: &mut Changelog,
    ) {
        let control = &self.control;
        let mut url_updates = UrlUpdates::new();

        match batch {
            Some(LookupBatch {
                failure: Some(failure),
                ..
            }) => {
                changelog.push(
                    ChangelogEntry::new(Category::Error, LOOKUP_FAILED_NOTE).with_detail(failure),
                );
            }
            Some(batch) => {
                url_updates = apply_lookup_status(
                    records,
                    ids,
                    &batch.results,
                    &self.options.target,
                    control,
                    changelog,
                );
                match self.options.title_mode {
                    TitleMode::Apply => {
                        url_updates.merge(apply_title_updates(
                            records,
                            ids,
                            &batch.results,
                            control,
                            changelog,
                        ));
                    }
                    TitleMode::DetectOnly => {
                        detect_title_mismatches(records, ids, &batch.results, control, changelog);
                    }
                }
            }
            None => {}
        }

        if !control.is_cancelled() {
            append_content_ids(records, ids, &url_updates, control, changelog);
        }
    }
}
