use std::fs;
use std::path::{Path, PathBuf};

use super::store::{RecordTable, SectionStore, StoreError};
use crate::models::{PersistedSection, RuleSetId};

/// File-backed store: one JSON array of rows per rule-set at
/// `<dir>/<RULE_SET>.json`.
///
/// Commits write a sibling temp file and rename it over the table, so a
/// reader opens either the old or the new file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Write {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn table_path(&self, rule_set: &RuleSetId) -> PathBuf {
        self.dir.join(format!("{rule_set}.json"))
    }
}

impl SectionStore for JsonFileStore {
    fn load(&self, rule_set: &RuleSetId) -> Result<RecordTable, StoreError> {
        let path = self.table_path(rule_set);
        if !path.exists() {
            return Ok(RecordTable::new(rule_set.clone()));
        }
        let text = fs::read_to_string(&path).map_err(|source| StoreError::Read {
            path: path.clone(),
            source,
        })?;
        let rows: Vec<PersistedSection> =
            serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?;
        RecordTable::from_rows(rule_set.clone(), rows)
    }

    fn commit(&mut self, table: RecordTable) -> Result<(), StoreError> {
        let path = self.table_path(table.rule_set());
        let tmp = path.with_extension("json.tmp");

        let json = serde_json::to_string_pretty(&table.to_rows()).map_err(|source| {
            StoreError::Corrupt {
                path: path.clone(),
                source,
            }
        })?;
        fs::write(&tmp, json).map_err(|source| StoreError::Write {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })?;
        log::debug!("Committed {} rows to {}", table.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SectionNumber;
    use crate::tests::{create_test_file, create_test_sections_dir};
    use pretty_assertions::assert_eq;

    fn n(s: &str) -> SectionNumber {
        s.parse().unwrap()
    }

    fn cr() -> RuleSetId {
        "cr".parse().unwrap()
    }

    #[test]
    fn test_commit_then_load() {
        // Given a store with one committed table
        let dir = create_test_sections_dir();
        let mut store = JsonFileStore::open(dir.path()).unwrap();
        let mut table = RecordTable::new(cr());
        table.insert(n("100"), "Game Concepts".into(), None).unwrap();
        table
            .insert(n("101"), "General".into(), Some(n("100")))
            .unwrap();
        store.commit(table.clone()).unwrap();

        // When reopening the store
        let reopened = JsonFileStore::open(dir.path()).unwrap();

        // Then the same rows come back and no temp file is left behind
        assert_eq!(reopened.load(&cr()).unwrap(), table);
        assert!(dir.path().join("CR.json").exists());
        assert!(!dir.path().join("CR.json.tmp").exists());
    }

    #[test]
    fn test_missing_table_is_empty() {
        let dir = create_test_sections_dir();
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert!(store.load(&cr()).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_table() {
        let dir = create_test_sections_dir();
        create_test_file(&dir, "CR.json", "[{\"rule_set_id\": ");
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.load(&cr()),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_duplicate_rows_on_disk_are_rejected() {
        let dir = create_test_sections_dir();
        let row = r#"{"rule_set_id":"CR","section_id":"100","text":"A","annotation":"","parent_id":null,"order":100}"#;
        create_test_file(&dir, "CR.json", &format!("[{row},{row}]"));
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.load(&cr()),
            Err(StoreError::Conflict { .. })
        ));
    }
}
