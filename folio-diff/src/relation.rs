//! Relation diff.
//!
//! Matching runs in two passes so an explicit row id is never stolen by an
//! earlier target match:
//!
//! 1. incoming records carrying a row id claim the existing row with that id;
//! 2. the rest claim the first unclaimed existing row with the same
//!    (`relation_to`, `relation_id`, `locale`).
//!
//! Existing rows of another locale than the one being written are out of
//! scope: they are reported in [`RelationDiff::preserved`] and never deleted.

use folio_model::RelationRecord;
use folio_types::Locale;
use std::collections::HashSet;
use tracing::debug;

/// The writes needed to turn the stored relations into the incoming ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationDiff {
    /// Incoming records with no stored counterpart.
    pub to_add: Vec<RelationRecord>,
    /// Matched records, carrying the stored row id and the incoming
    /// `path`/`position`.
    pub to_update: Vec<RelationRecord>,
    /// In-scope stored rows nothing matched.
    pub to_delete: Vec<RelationRecord>,
    /// Stored rows of other locales, left untouched.
    pub preserved: Vec<RelationRecord>,
}

impl RelationDiff {
    /// True when persisting the diff would write nothing.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }
}

fn in_scope(record: &RelationRecord, locale: Option<&Locale>) -> bool {
    match &record.locale {
        None => true,
        Some(own) => Some(own) == locale,
    }
}

fn same_target(a: &RelationRecord, b: &RelationRecord) -> bool {
    a.relation_to == b.relation_to && a.relation_id == b.relation_id && a.locale == b.locale
}

/// Diffs the stored relations of one document against the incoming ones.
///
/// `locale` is the locale being written; shared rows (`locale == None`) are
/// always in scope.
pub fn diff_relations(
    existing: &[RelationRecord],
    incoming: &[RelationRecord],
    locale: Option<&Locale>,
) -> RelationDiff {
    let mut diff = RelationDiff::default();
    let mut candidates: Vec<&RelationRecord> = Vec::with_capacity(existing.len());
    for record in existing {
        if in_scope(record, locale) {
            candidates.push(record);
        } else {
            diff.preserved.push(record.clone());
        }
    }

    let mut consumed: HashSet<usize> = HashSet::new();
    let mut matches: Vec<Option<usize>> = vec![None; incoming.len()];

    for (slot, record) in matches.iter_mut().zip(incoming) {
        let Some(id) = record.id else {
            continue;
        };
        let found = candidates
            .iter()
            .enumerate()
            .find(|(i, c)| c.id == Some(id) && !consumed.contains(i))
            .map(|(i, _)| i);
        if let Some(index) = found {
            consumed.insert(index);
            *slot = Some(index);
        }
    }

    for (slot, record) in matches.iter_mut().zip(incoming) {
        if slot.is_some() {
            continue;
        }
        let found = candidates
            .iter()
            .enumerate()
            .find(|(i, c)| !consumed.contains(i) && same_target(c, record))
            .map(|(i, _)| i);
        if let Some(index) = found {
            consumed.insert(index);
            *slot = Some(index);
        }
    }

    for (slot, record) in matches.into_iter().zip(incoming) {
        match slot {
            Some(index) => {
                let stored = candidates[index];
                diff.to_update.push(RelationRecord {
                    id: stored.id,
                    path: record.path.clone(),
                    position: record.position,
                    relation_to: record.relation_to.clone(),
                    relation_id: record.relation_id,
                    locale: stored.locale.clone(),
                });
            }
            None => diff.to_add.push(RelationRecord {
                id: None,
                ..record.clone()
            }),
        }
    }

    diff.to_delete = candidates
        .iter()
        .enumerate()
        .filter(|(i, _)| !consumed.contains(i))
        .map(|(_, c)| (*c).clone())
        .collect();

    debug!(
        "Relation diff: {} add, {} update, {} delete, {} preserved",
        diff.to_add.len(),
        diff.to_update.len(),
        diff.to_delete.len(),
        diff.preserved.len()
    );
    diff
}
