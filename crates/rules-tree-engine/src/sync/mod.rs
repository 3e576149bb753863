//! # Sync
//!
//! Reconciles a freshly parsed forest with the persisted rows of one
//! rule-set.
//!
//! ## Flow
//!
//! 1. **Diff** (`changeset`): partition every id into delete / insert /
//!    update / unchanged by comparing flattened `id -> text` maps
//! 2. **Review**: the [`ChangeSet`] renders as a human-readable report;
//!    a dry run stops here
//! 3. **Apply**: deletions, dangling-parent repair, updates, then insertions
//!    in section order, all inside one store transaction
//! 4. **Relink**: existing rows stored without a parent are linked to their
//!    fresh parent once that parent is stored
//!
//! Annotations are never touched by a sync. Any failure during apply leaves
//! the store exactly as it was.

pub mod changeset;
pub mod json_store;
pub mod store;

use std::fmt;

use crate::codec;
use crate::models::{RuleSetId, SectionForest};

pub use changeset::{ChangeSet, Insertion, Update};
pub use json_store::JsonFileStore;
pub use store::{MemoryStore, RecordTable, SectionStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Sync of rule-set {rule_set} aborted, nothing was committed: {source}")]
    Aborted {
        rule_set: RuleSetId,
        source: StoreError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Counts of what an apply changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    /// Surviving rows whose parent was deleted and now have none.
    pub detached: usize,
    /// Existing top-level rows linked under a parent that is now stored.
    pub relinked: usize,
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Inserted: {}, Updated: {}, Deleted: {}, Unchanged: {}",
            self.inserted, self.updated, self.deleted, self.unchanged
        )?;
        if self.detached > 0 {
            write!(f, ", Detached: {}", self.detached)?;
        }
        if self.relinked > 0 {
            write!(f, ", Relinked: {}", self.relinked)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum SyncOutcome {
    DryRun(ChangeSet),
    Applied {
        changes: ChangeSet,
        report: SyncReport,
    },
}

impl SyncOutcome {
    pub fn changes(&self) -> &ChangeSet {
        match self {
            SyncOutcome::DryRun(changes) | SyncOutcome::Applied { changes, .. } => changes,
        }
    }
}

/// Diff `fresh` against the store without changing it.
pub fn plan<S: SectionStore>(
    store: &S,
    rule_set: &RuleSetId,
    fresh: &SectionForest,
) -> Result<ChangeSet, SyncError> {
    let table = store.load(rule_set)?;
    Ok(ChangeSet::diff(rule_set.clone(), fresh, &table.texts()))
}

/// Apply a change set to a working table.
///
/// A new row's parent is its fresh parent when that row exists by then
/// (persisted earlier or inserted earlier in this batch), otherwise none.
pub fn apply(table: &mut RecordTable, changes: &ChangeSet) -> Result<SyncReport, StoreError> {
    for id in &changes.to_delete {
        table.delete(id)?;
    }
    let detached = table.detach_dangling();
    for id in &detached {
        log::warn!("Parent of section {id} was deleted, section moved to top level");
    }

    for update in &changes.to_update {
        table.update_text(&update.section, &update.new_text)?;
    }

    // Parents sort before their children, so a child listed first still
    // finds a parent inserted in the same batch.
    let mut insertions: Vec<&Insertion> = changes.to_insert.iter().collect();
    insertions.sort_by(|a, b| a.section.cmp(&b.section));
    for insertion in insertions {
        let parent = insertion
            .parent
            .as_ref()
            .filter(|parent| table.contains(parent))
            .cloned();
        if let Some(missing) = &insertion.parent
            && parent.is_none()
        {
            log::warn!(
                "Parent {missing} of section {} is not stored, inserting without parent",
                insertion.section
            );
        }
        table.insert(insertion.section.clone(), insertion.text.clone(), parent)?;
    }

    Ok(SyncReport {
        inserted: changes.to_insert.len(),
        updated: changes.to_update.len(),
        deleted: changes.to_delete.len(),
        unchanged: changes.unchanged.len(),
        detached: detached.len(),
        relinked: 0,
    })
}

/// Link rows stored without a parent to their parent in `fresh`, when that
/// parent is stored. Rows that already have a parent are left alone.
pub fn relink_orphans(table: &mut RecordTable, fresh: &SectionForest) -> Result<usize, StoreError> {
    let pending: Vec<_> = fresh
        .iter()
        .filter_map(|node| {
            let parent = fresh.parent_id(&node.id)?;
            let row = table.get(&node.id).ok()?;
            (row.parent.is_none() && table.contains(parent))
                .then(|| (node.id.clone(), parent.clone()))
        })
        .collect();

    for (section, parent) in &pending {
        log::info!("Linking section {section} under {parent}");
        table.set_parent(section, parent.clone())?;
    }
    Ok(pending.len())
}

/// Diff and, unless `dry_run`, apply atomically.
pub fn sync<S: SectionStore>(
    store: &mut S,
    rule_set: &RuleSetId,
    fresh: &SectionForest,
    dry_run: bool,
) -> Result<SyncOutcome, SyncError> {
    let changes = plan(store, rule_set, fresh)?;
    if dry_run {
        return Ok(SyncOutcome::DryRun(changes));
    }

    let report = store
        .transaction(rule_set, |table| {
            let mut report = apply(table, &changes)?;
            report.relinked = relink_orphans(table, fresh)?;
            Ok::<_, StoreError>(report)
        })
        .map_err(|source| SyncError::Aborted {
            rule_set: rule_set.clone(),
            source,
        })?;
    log::info!("Synced rule-set {rule_set}: {report}");
    Ok(SyncOutcome::Applied { changes, report })
}

/// Replace every stored row of `rule_set` with `forest`, keeping the
/// forest's annotations. Returns the number of rows written.
pub fn import<S: SectionStore>(
    store: &mut S,
    rule_set: &RuleSetId,
    forest: &SectionForest,
) -> Result<usize, SyncError> {
    let rows = codec::to_persisted(forest, rule_set);
    let count = rows.len();
    store
        .transaction(rule_set, |table| {
            *table = RecordTable::from_rows(rule_set.clone(), rows)?;
            Ok::<_, StoreError>(())
        })
        .map_err(|source| SyncError::Aborted {
            rule_set: rule_set.clone(),
            source,
        })?;
    log::info!("Imported {count} sections into rule-set {rule_set}");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Depth;
    use crate::models::SectionNumber;
    use crate::parsing::{SourceLayout, parse_rules};
    use pretty_assertions::assert_eq;

    fn n(s: &str) -> SectionNumber {
        s.parse().unwrap()
    }

    fn tr() -> RuleSetId {
        "tr".parse().unwrap()
    }

    fn forest(text: &str) -> SectionForest {
        parse_rules(text, SourceLayout::Lines).forest
    }

    const V1: &str = "100. Intro\n103. Resp\n103.1. Attendees\n103.2. Spectators\n200. Defs";
    const V2: &str = "100. Introduction\n103. Resp\n103.2. Spectators\n103.3. Staff\n103.3.a. Judges\n300. New";

    fn store_with(text: &str) -> MemoryStore {
        let mut store = MemoryStore::new();
        sync(&mut store, &tr(), &forest(text), false).unwrap();
        store
    }

    #[test]
    fn test_first_sync_inserts_everything() {
        let mut store = MemoryStore::new();
        let outcome = sync(&mut store, &tr(), &forest(V1), false).unwrap();

        let SyncOutcome::Applied { report, .. } = outcome else {
            panic!("expected an applied sync");
        };
        assert_eq!(report.inserted, 5);
        let table = store.load(&tr()).unwrap();
        assert_eq!(table.get(&n("103.1")).unwrap().parent, Some(n("103")));
        assert_eq!(table.get(&n("200")).unwrap().parent, None);
    }

    #[test]
    fn test_resync_converges() {
        // Given a store synced from an older document
        let mut store = store_with(V1);
        let fresh = forest(V2);

        // When syncing the new document
        let outcome = sync(&mut store, &tr(), &fresh, false).unwrap();

        // Then the stored texts equal the fresh parse and a second diff is empty
        let SyncOutcome::Applied { report, .. } = outcome else {
            panic!("expected an applied sync");
        };
        assert_eq!(
            report,
            SyncReport {
                inserted: 3,
                updated: 1,
                deleted: 2,
                unchanged: 2,
                detached: 0,
                relinked: 0,
            }
        );
        assert_eq!(store.load(&tr()).unwrap().texts(), fresh.flatten());
        assert!(plan(&store, &tr(), &fresh).unwrap().is_empty());
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let mut store = store_with(V1);
        let before = store.load(&tr()).unwrap();

        let outcome = sync(&mut store, &tr(), &forest(V2), true).unwrap();

        assert!(matches!(outcome, SyncOutcome::DryRun(_)));
        assert!(!outcome.changes().is_empty());
        assert_eq!(store.load(&tr()).unwrap(), before);
    }

    #[test]
    fn test_inserted_children_link_to_inserted_parents() {
        let mut store = store_with(V1);
        sync(&mut store, &tr(), &forest(V2), false).unwrap();

        let table = store.load(&tr()).unwrap();
        assert_eq!(table.get(&n("103.3")).unwrap().parent, Some(n("103")));
        assert_eq!(table.get(&n("103.3.a")).unwrap().parent, Some(n("103.3")));
    }

    #[test]
    fn test_apply_inserts_parents_before_children() {
        // Given a change set that lists a child ahead of its new parent
        let mut table = RecordTable::new(tr());
        let changes = ChangeSet {
            rule_set: tr(),
            to_delete: Vec::new(),
            to_insert: vec![
                Insertion {
                    section: n("500.1"),
                    text: "Child".into(),
                    parent: Some(n("500")),
                },
                Insertion {
                    section: n("500"),
                    text: "Parent".into(),
                    parent: None,
                },
            ],
            to_update: Vec::new(),
            unchanged: Vec::new(),
        };

        // When applying it
        let report = apply(&mut table, &changes).unwrap();

        // Then the child is linked to the parent from the same batch
        assert_eq!(report.inserted, 2);
        assert_eq!(table.get(&n("500.1")).unwrap().parent, Some(n("500")));
    }

    #[test]
    fn test_orphan_rows_link_to_parent_added_later() {
        // Given 204.1 stored before its parent existed, with a note on it
        let mut store = store_with("100. Intro\n204.1. Sub");
        store.update_annotation(&tr(), &n("204.1"), "Keep me").unwrap();
        assert_eq!(store.section(&tr(), &n("204.1")).unwrap().parent, None);

        // When a later edition adds 204
        let SyncOutcome::Applied { report, .. } = sync(
            &mut store,
            &tr(),
            &forest("100. Intro\n204. Parent\n204.1. Sub"),
            false,
        )
        .unwrap() else {
            panic!("expected an applied sync");
        };

        // Then the existing row is linked under it and keeps its annotation
        assert_eq!(report.inserted, 1);
        assert_eq!(report.unchanged, 2);
        assert_eq!(report.relinked, 1);
        let row = store.section(&tr(), &n("204.1")).unwrap();
        assert_eq!(row.parent, Some(n("204")));
        assert_eq!(row.annotation, "Keep me");
        assert_eq!(
            report.to_string(),
            "Inserted: 1, Updated: 0, Deleted: 0, Unchanged: 2, Relinked: 1"
        );
    }

    #[test]
    fn test_unchanged_rows_keep_annotations() {
        let mut store = store_with(V1);
        store
            .update_annotation(&tr(), &n("103.2"), "Seating chart on page 4")
            .unwrap();

        sync(&mut store, &tr(), &forest(V2), false).unwrap();

        assert_eq!(
            store.section(&tr(), &n("103.2")).unwrap().annotation,
            "Seating chart on page 4"
        );
    }

    #[test]
    fn test_deleted_parent_detaches_surviving_children() {
        // Given 103 persisted with a child, and a fresh parse that drops 103
        let mut store = store_with("100. Intro\n103. Resp\n103.1. Attendees");
        let fresh = forest("100. Intro\n103.1. Attendees");

        // When syncing
        let SyncOutcome::Applied { report, .. } =
            sync(&mut store, &tr(), &fresh, false).unwrap()
        else {
            panic!("expected an applied sync");
        };

        // Then the child survives without a dangling parent reference
        assert_eq!(report.deleted, 1);
        assert_eq!(report.detached, 1);
        assert_eq!(store.section(&tr(), &n("103.1")).unwrap().parent, None);
    }

    #[test]
    fn test_failed_apply_rolls_back() {
        // Given a change set built against a stale view of the store
        let mut store = store_with(V1);
        let stale = plan(&store, &tr(), &forest(V2)).unwrap();
        sync(&mut store, &tr(), &forest(V2), false).unwrap();
        let before = store.load(&tr()).unwrap();

        // When applying it inside a transaction
        let result = store.transaction(&tr(), |table| apply(table, &stale));

        // Then it fails and nothing from the partial batch is visible
        assert!(result.is_err());
        assert_eq!(store.load(&tr()).unwrap(), before);
    }

    #[test]
    fn test_sync_leaves_other_rule_sets_alone() {
        let mut store = store_with(V1);
        let cr: RuleSetId = "cr".parse().unwrap();
        sync(&mut store, &cr, &forest("100. Game Concepts"), false).unwrap();

        assert_eq!(store.load(&tr()).unwrap().len(), 5);
        assert_eq!(store.load(&cr).unwrap().len(), 1);
    }

    #[test]
    fn test_import_replaces_everything() {
        let mut store = store_with(V1);
        let mut fresh = forest("100. Intro\n101. Purpose");
        let purpose = fresh.lookup(&n("101")).unwrap();
        fresh.set_annotation(purpose, "Imported note");

        let count = import(&mut store, &tr(), &fresh).unwrap();

        assert_eq!(count, 2);
        let table = store.load(&tr()).unwrap();
        assert_eq!(table.texts(), fresh.flatten());
        assert_eq!(table.get(&n("101")).unwrap().annotation, "Imported note");
        let record = store.subtree(&tr(), &n("100"), Depth::Full).unwrap();
        assert_eq!(record.count(), 2);
    }
}
