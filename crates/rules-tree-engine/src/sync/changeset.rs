use std::collections::BTreeMap;
use std::fmt;

use crate::models::{RuleSetId, SectionForest, SectionNumber};

const INSERT_PREVIEWS: usize = 20;
const INSERT_PREVIEW_CHARS: usize = 50;
const UPDATE_PREVIEWS: usize = 10;
const UPDATE_PREVIEW_CHARS: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion {
    pub section: SectionNumber,
    pub text: String,
    /// Parent in the fresh tree.
    pub parent: Option<SectionNumber>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub section: SectionNumber,
    pub old_text: String,
    pub new_text: String,
}

/// Difference between a freshly parsed forest and the persisted state of one
/// rule-set.
///
/// Every id of either side lands in exactly one bucket. All buckets are
/// sorted by section number, so a parent is always inserted before its
/// children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    pub rule_set: RuleSetId,
    pub to_delete: Vec<SectionNumber>,
    pub to_insert: Vec<Insertion>,
    pub to_update: Vec<Update>,
    pub unchanged: Vec<SectionNumber>,
}

impl ChangeSet {
    /// Compare `fresh` against the persisted `id -> text` view.
    pub fn diff(
        rule_set: RuleSetId,
        fresh: &SectionForest,
        persisted: &BTreeMap<SectionNumber, String>,
    ) -> Self {
        let mut changes = ChangeSet {
            rule_set,
            to_delete: Vec::new(),
            to_insert: Vec::new(),
            to_update: Vec::new(),
            unchanged: Vec::new(),
        };

        for (id, text) in fresh.flatten() {
            match persisted.get(&id) {
                None => changes.to_insert.push(Insertion {
                    parent: fresh.parent_id(&id).cloned(),
                    section: id,
                    text,
                }),
                Some(old) if *old != text => changes.to_update.push(Update {
                    section: id,
                    old_text: old.clone(),
                    new_text: text,
                }),
                Some(_) => changes.unchanged.push(id),
            }
        }

        changes.to_delete = persisted
            .keys()
            .filter(|id| fresh.get(id).is_none())
            .cloned()
            .collect();

        changes
    }

    /// True when applying would not change anything.
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_insert.is_empty() && self.to_update.is_empty()
    }
}

/// Human review listing: every deletion, a preview of insertions and
/// updates, then the counts.
impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Rule-set {}", self.rule_set)?;

        if !self.to_delete.is_empty() {
            writeln!(f, "\nSections to delete ({}):", self.to_delete.len())?;
            for id in &self.to_delete {
                writeln!(f, "  - {id}")?;
            }
        }

        if !self.to_insert.is_empty() {
            writeln!(f, "\nSections to insert ({}):", self.to_insert.len())?;
            for insertion in self.to_insert.iter().take(INSERT_PREVIEWS) {
                writeln!(
                    f,
                    "  + {}: {}",
                    insertion.section,
                    preview(&insertion.text, INSERT_PREVIEW_CHARS)
                )?;
            }
            write_remaining(f, self.to_insert.len(), INSERT_PREVIEWS)?;
        }

        if !self.to_update.is_empty() {
            writeln!(f, "\nSections to update ({}):", self.to_update.len())?;
            for update in self.to_update.iter().take(UPDATE_PREVIEWS) {
                writeln!(f, "  ~ {}", update.section)?;
                writeln!(f, "    OLD: {}", preview(&update.old_text, UPDATE_PREVIEW_CHARS))?;
                writeln!(f, "    NEW: {}", preview(&update.new_text, UPDATE_PREVIEW_CHARS))?;
            }
            write_remaining(f, self.to_update.len(), UPDATE_PREVIEWS)?;
        }

        writeln!(
            f,
            "\nSummary: {} to insert, {} to update, {} to delete, {} unchanged",
            self.to_insert.len(),
            self.to_update.len(),
            self.to_delete.len(),
            self.unchanged.len()
        )
    }
}

fn write_remaining(f: &mut fmt::Formatter<'_>, total: usize, shown: usize) -> fmt::Result {
    if total > shown {
        writeln!(f, "  ... and {} more", total - shown)?;
    }
    Ok(())
}

/// First `max` characters of `text`, with `...` when cut.
fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}
