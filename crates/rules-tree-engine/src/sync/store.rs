use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::codec::{Depth, PersistedTree};
use crate::models::{PersistedSection, RuleSetId, SectionNumber, SectionRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Section {section} not found in rule-set {rule_set}")]
    NotFound {
        rule_set: RuleSetId,
        section: SectionNumber,
    },
    #[error("Section {section} already exists in rule-set {rule_set}")]
    Conflict {
        rule_set: RuleSetId,
        section: SectionNumber,
    },
    #[error("Row for section {section} belongs to rule-set {found}, expected {expected}")]
    WrongRuleSet {
        expected: RuleSetId,
        found: RuleSetId,
        section: SectionNumber,
    },
    #[error("Failed to read store file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write store file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Corrupt store file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// All persisted rows of one rule-set, keyed by section number.
///
/// Enforces the `(rule_set, section)` uniqueness constraint. A table is the
/// unit of work of a store transaction: it is loaded, mutated and committed
/// as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordTable {
    rule_set: RuleSetId,
    rows: BTreeMap<SectionNumber, PersistedSection>,
}

impl RecordTable {
    pub fn new(rule_set: RuleSetId) -> Self {
        Self {
            rule_set,
            rows: BTreeMap::new(),
        }
    }

    pub fn from_rows(
        rule_set: RuleSetId,
        rows: impl IntoIterator<Item = PersistedSection>,
    ) -> Result<Self, StoreError> {
        let mut table = Self::new(rule_set);
        for row in rows {
            if row.rule_set != table.rule_set {
                return Err(StoreError::WrongRuleSet {
                    expected: table.rule_set.clone(),
                    found: row.rule_set,
                    section: row.section,
                });
            }
            if table.rows.contains_key(&row.section) {
                return Err(table.conflict(&row.section));
            }
            table.rows.insert(row.section.clone(), row);
        }
        Ok(table)
    }

    pub fn rule_set(&self) -> &RuleSetId {
        &self.rule_set
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, section: &SectionNumber) -> bool {
        self.rows.contains_key(section)
    }

    /// Rows in section-number order.
    pub fn rows(&self) -> impl Iterator<Item = &PersistedSection> {
        self.rows.values()
    }

    pub fn to_rows(&self) -> Vec<PersistedSection> {
        self.rows.values().cloned().collect()
    }

    pub fn get(&self, section: &SectionNumber) -> Result<&PersistedSection, StoreError> {
        self.rows
            .get(section)
            .ok_or_else(|| self.not_found(section))
    }

    /// Flattened `id -> text` view of the persisted rows.
    pub fn texts(&self) -> BTreeMap<SectionNumber, String> {
        self.rows
            .iter()
            .map(|(id, row)| (id.clone(), row.text.clone()))
            .collect()
    }

    /// Insert a new row. `parent` must already be present when given.
    pub fn insert(
        &mut self,
        section: SectionNumber,
        text: String,
        parent: Option<SectionNumber>,
    ) -> Result<&PersistedSection, StoreError> {
        if self.rows.contains_key(&section) {
            return Err(self.conflict(&section));
        }
        if let Some(parent) = &parent
            && !self.rows.contains_key(parent)
        {
            return Err(self.not_found(parent));
        }
        let row = PersistedSection {
            rule_set: self.rule_set.clone(),
            order: section.order_within_parent(),
            section: section.clone(),
            text,
            annotation: String::new(),
            parent,
        };
        Ok(self.rows.entry(section).or_insert(row))
    }

    pub fn update_text(&mut self, section: &SectionNumber, text: &str) -> Result<(), StoreError> {
        let row = self.get_mut(section)?;
        row.text = text.to_string();
        Ok(())
    }

    pub fn set_annotation(
        &mut self,
        section: &SectionNumber,
        annotation: &str,
    ) -> Result<(), StoreError> {
        let row = self.get_mut(section)?;
        row.annotation = annotation.to_string();
        Ok(())
    }

    /// Re-point a row. The new parent must already be present.
    pub fn set_parent(
        &mut self,
        section: &SectionNumber,
        parent: SectionNumber,
    ) -> Result<(), StoreError> {
        if !self.rows.contains_key(&parent) {
            return Err(self.not_found(&parent));
        }
        let row = self.get_mut(section)?;
        row.parent = Some(parent);
        Ok(())
    }

    pub fn delete(&mut self, section: &SectionNumber) -> Result<PersistedSection, StoreError> {
        self.rows
            .remove(section)
            .ok_or_else(|| self.not_found(section))
    }

    /// Clear `parent` on rows whose parent no longer exists. Returns the
    /// affected sections.
    pub fn detach_dangling(&mut self) -> Vec<SectionNumber> {
        let dangling: Vec<SectionNumber> = self
            .rows
            .values()
            .filter(|row| {
                row.parent
                    .as_ref()
                    .is_some_and(|parent| !self.rows.contains_key(parent))
            })
            .map(|row| row.section.clone())
            .collect();
        for section in &dangling {
            if let Some(row) = self.rows.get_mut(section) {
                row.parent = None;
            }
        }
        dangling
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    fn get_mut(&mut self, section: &SectionNumber) -> Result<&mut PersistedSection, StoreError> {
        self.rows
            .get_mut(section)
            .ok_or_else(|| StoreError::NotFound {
                rule_set: self.rule_set.clone(),
                section: section.clone(),
            })
    }

    fn not_found(&self, section: &SectionNumber) -> StoreError {
        StoreError::NotFound {
            rule_set: self.rule_set.clone(),
            section: section.clone(),
        }
    }

    fn conflict(&self, section: &SectionNumber) -> StoreError {
        StoreError::Conflict {
            rule_set: self.rule_set.clone(),
            section: section.clone(),
        }
    }
}

/// Persistence for section rows, one independent table per rule-set.
///
/// `commit` replaces a rule-set's rows atomically: readers see either the
/// previous table or the new one, never a mix. Callers must not run two
/// writers for the same rule-set at once.
pub trait SectionStore {
    fn load(&self, rule_set: &RuleSetId) -> Result<RecordTable, StoreError>;

    fn commit(&mut self, table: RecordTable) -> Result<(), StoreError>;

    /// Run `f` against a working copy of the rule-set and commit it only if
    /// `f` succeeds.
    fn transaction<T, E, F>(&mut self, rule_set: &RuleSetId, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut RecordTable) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut table = self.load(rule_set)?;
        let value = f(&mut table)?;
        self.commit(table)?;
        Ok(value)
    }

    fn section(
        &self,
        rule_set: &RuleSetId,
        section: &SectionNumber,
    ) -> Result<PersistedSection, StoreError> {
        self.load(rule_set)?.get(section).cloned()
    }

    /// Interchange record of `section` and its descendants down to `depth`.
    fn subtree(
        &self,
        rule_set: &RuleSetId,
        section: &SectionNumber,
        depth: Depth,
    ) -> Result<SectionRecord, StoreError> {
        let rows = self.load(rule_set)?.to_rows();
        PersistedTree::new(&rows)
            .encode(section, depth)
            .ok_or_else(|| StoreError::NotFound {
                rule_set: rule_set.clone(),
                section: section.clone(),
            })
    }

    fn update_annotation(
        &mut self,
        rule_set: &RuleSetId,
        section: &SectionNumber,
        annotation: &str,
    ) -> Result<(), StoreError> {
        self.transaction(rule_set, |table| table.set_annotation(section, annotation))
    }
}

/// Store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<RuleSetId, RecordTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SectionStore for MemoryStore {
    fn load(&self, rule_set: &RuleSetId) -> Result<RecordTable, StoreError> {
        Ok(self
            .tables
            .get(rule_set)
            .cloned()
            .unwrap_or_else(|| RecordTable::new(rule_set.clone())))
    }

    fn commit(&mut self, table: RecordTable) -> Result<(), StoreError> {
        self.tables.insert(table.rule_set().clone(), table);
        Ok(())
    }
}
