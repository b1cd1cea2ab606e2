//! Bookkeeping for restoring a snapshot into a store that may already hold data.
//!
//! The store-facing loop lives with the store; this module holds the parts
//! that are pure decisions and can be tested without a database.
//!
//! # Algorithm
//!
//! 1. Under [`RestorePolicy::ReplaceAll`], clear included kinds children first
//! 2. Reconcile trips, recording every source id in the [`IdMap`]
//! 3. Reconcile routes, points and tags with `trip_id` remapped through the
//!    [`IdMap`]; children whose trip did not resolve are skipped as orphans
//! 4. Reconcile settings
//! 5. Return a [`RestoreReport`] with per-kind outcome counts

use crate::{EntityId, EntityKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// How records matching an existing row are handled.
///
/// Has no default: every restore names its policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestorePolicy {
    /// Keep existing rows untouched, insert only what is missing
    SkipExisting,
    /// Overwrite the mutable fields of existing rows, insert the rest
    UpdateExisting,
    /// Clear included kinds first, then insert everything
    ReplaceAll,
}

impl RestorePolicy {
    /// Whether records must be looked up by natural key before acting.
    pub fn matches_existing(&self) -> bool {
        match self {
            RestorePolicy::SkipExisting | RestorePolicy::UpdateExisting => true,
            RestorePolicy::ReplaceAll => false,
        }
    }

    /// Whether included kinds are cleared before reconciling.
    pub fn clears_first(&self) -> bool {
        matches!(self, RestorePolicy::ReplaceAll)
    }

    /// Decide what to do with a record given its natural-key match, if any.
    pub fn action(&self, existing: Option<EntityId>) -> Action {
        match (self, existing) {
            (RestorePolicy::SkipExisting, Some(id)) => Action::Skip(id),
            (RestorePolicy::UpdateExisting, Some(id)) => Action::Update(id),
            (RestorePolicy::SkipExisting | RestorePolicy::UpdateExisting, None) => Action::Insert,
            (RestorePolicy::ReplaceAll, _) => Action::Insert,
        }
    }
}

impl fmt::Display for RestorePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestorePolicy::SkipExisting => f.write_str("skip_existing"),
            RestorePolicy::UpdateExisting => f.write_str("update_existing"),
            RestorePolicy::ReplaceAll => f.write_str("replace_all"),
        }
    }
}

/// What the restore loop does with one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Insert a new row
    Insert,
    /// Update the mutable fields of the given row
    Update(EntityId),
    /// Leave the given row alone
    Skip(EntityId),
}

/// Result of reconciling a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Imported,
    Updated,
    /// A matching row already existed
    SkippedDuplicate,
    /// The record's trip could not be resolved in the target store
    SkippedOrphan,
}

/// Translation from snapshot-local ids to target-store ids.
///
/// Lives for a single restore call.
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    ids: BTreeMap<EntityKind, HashMap<EntityId, EntityId>>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `source` in the snapshot is `target` in the store.
    pub fn insert(&mut self, kind: EntityKind, source: EntityId, target: EntityId) {
        self.ids.entry(kind).or_default().insert(source, target);
    }

    /// Resolve a snapshot id to its target-store id.
    pub fn resolve(&self, kind: EntityKind, source: EntityId) -> Option<EntityId> {
        self.ids.get(&kind)?.get(&source).copied()
    }

    /// Number of ids mapped for `kind`.
    pub fn len(&self, kind: EntityKind) -> usize {
        self.ids.get(&kind).map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.values().all(HashMap::is_empty)
    }
}

/// Outcome counts for one kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KindReport {
    pub imported: usize,
    pub updated: usize,
    pub skipped_duplicate: usize,
    pub skipped_orphan: usize,
}

impl KindReport {
    /// Total records skipped for any reason.
    pub fn skipped(&self) -> usize {
        self.skipped_duplicate + self.skipped_orphan
    }

    /// Total records seen.
    pub fn total(&self) -> usize {
        self.imported + self.updated + self.skipped()
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Imported => self.imported += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::SkippedDuplicate => self.skipped_duplicate += 1,
            Outcome::SkippedOrphan => self.skipped_orphan += 1,
        }
    }
}

/// Per-kind outcome of a restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RestoreReport {
    kinds: BTreeMap<EntityKind, KindReport>,
}

impl RestoreReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `kind` appear in the report even if it had no records.
    pub fn touch(&mut self, kind: EntityKind) {
        self.kinds.entry(kind).or_default();
    }

    /// Count one record outcome.
    pub fn record(&mut self, kind: EntityKind, outcome: Outcome) {
        self.kinds.entry(kind).or_default().record(outcome);
    }

    /// Counts for `kind` (zero if it was not part of the restore).
    pub fn kind(&self, kind: EntityKind) -> KindReport {
        self.kinds.get(&kind).copied().unwrap_or_default()
    }

    /// Iterate over the kinds present in the report.
    pub fn iter(&self) -> impl Iterator<Item = (EntityKind, &KindReport)> {
        self.kinds.iter().map(|(kind, report)| (*kind, report))
    }

    pub fn total_imported(&self) -> usize {
        self.kinds.values().map(|r| r.imported).sum()
    }

    pub fn total_updated(&self) -> usize {
        self.kinds.values().map(|r| r.updated).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.kinds.values().map(KindReport::skipped).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn skip_existing_actions() {
        let policy = RestorePolicy::SkipExisting;
        assert!(policy.matches_existing());
        assert_eq!(policy.action(Some(4)), Action::Skip(4));
        assert_eq!(policy.action(None), Action::Insert);
    }

    #[test]
    fn update_existing_actions() {
        let policy = RestorePolicy::UpdateExisting;
        assert!(policy.matches_existing());
        assert!(!policy.clears_first());
        assert_eq!(policy.action(Some(4)), Action::Update(4));
        assert_eq!(policy.action(None), Action::Insert);
    }

    #[test]
    fn replace_all_always_inserts() {
        let policy = RestorePolicy::ReplaceAll;
        assert!(!policy.matches_existing());
        assert!(policy.clears_first());
        assert_eq!(policy.action(Some(4)), Action::Insert);
        assert_eq!(policy.action(None), Action::Insert);
    }

    #[test]
    fn policy_serialization() {
        assert_eq!(
            serde_json::to_value(RestorePolicy::UpdateExisting).unwrap(),
            json!("update_existing")
        );
        let parsed: RestorePolicy = serde_json::from_value(json!("replace_all")).unwrap();
        assert_eq!(parsed, RestorePolicy::ReplaceAll);
        assert!(serde_json::from_value::<RestorePolicy>(json!("merge")).is_err());
        assert_eq!(RestorePolicy::SkipExisting.to_string(), "skip_existing");
    }

    #[test]
    fn id_map_resolves_per_kind() {
        let mut ids = IdMap::new();
        assert!(ids.is_empty());

        ids.insert(EntityKind::Trip, 10, 1);
        ids.insert(EntityKind::Trip, 11, 2);
        ids.insert(EntityKind::Setting, 10, 99);

        assert_eq!(ids.resolve(EntityKind::Trip, 10), Some(1));
        assert_eq!(ids.resolve(EntityKind::Trip, 12), None);
        assert_eq!(ids.resolve(EntityKind::Route, 10), None);
        assert_eq!(ids.len(EntityKind::Trip), 2);
        assert!(!ids.is_empty());
    }

    #[test]
    fn report_counts_outcomes() {
        let mut report = RestoreReport::new();
        report.touch(EntityKind::Setting);
        report.record(EntityKind::Trip, Outcome::Imported);
        report.record(EntityKind::Trip, Outcome::SkippedDuplicate);
        report.record(EntityKind::Point, Outcome::SkippedOrphan);
        report.record(EntityKind::Point, Outcome::Updated);

        let trips = report.kind(EntityKind::Trip);
        assert_eq!(trips.imported, 1);
        assert_eq!(trips.skipped_duplicate, 1);
        assert_eq!(trips.total(), 2);

        let points = report.kind(EntityKind::Point);
        assert_eq!(points.skipped_orphan, 1);
        assert_eq!(points.skipped(), 1);

        assert_eq!(report.kind(EntityKind::Setting), KindReport::default());
        assert_eq!(report.kind(EntityKind::Route), KindReport::default());
        assert_eq!(report.total_imported(), 1);
        assert_eq!(report.total_updated(), 1);
        assert_eq!(report.total_skipped(), 2);
        assert_eq!(report.iter().count(), 3);
    }

    #[test]
    fn report_serializes_by_kind_name() {
        let mut report = RestoreReport::new();
        report.record(EntityKind::Tag, Outcome::Imported);

        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({
                "tags": {"imported": 1, "updated": 0, "skippedDuplicate": 0, "skippedOrphan": 0}
            })
        );
    }
}
