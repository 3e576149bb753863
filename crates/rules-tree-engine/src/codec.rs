//! Conversion between in-memory forests, interchange records and persisted
//! rows.
//!
//! `decode(encode(node))` reproduces ids, texts, annotations and child order
//! at every depth.

use std::collections::HashMap;

use crate::models::{
    NodeId, PersistedSection, RuleSetId, SectionForest, SectionNumber, SectionRecord,
};

/// How far below the requested node to descend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Depth {
    #[default]
    Full,
    /// `Levels(0)` is the node alone, `Levels(1)` adds its children, ...
    Levels(usize),
}

impl Depth {
    /// Depth left for the children, or `None` if they are cut off.
    fn below(self) -> Option<Depth> {
        match self {
            Depth::Full => Some(Depth::Full),
            Depth::Levels(0) => None,
            Depth::Levels(n) => Some(Depth::Levels(n - 1)),
        }
    }
}

/// Encode the subtree rooted at `node_id`.
pub fn encode(forest: &SectionForest, node_id: NodeId, depth: Depth) -> SectionRecord {
    let node = forest.node(node_id);
    let children = match depth.below() {
        Some(next) => node
            .children
            .iter()
            .map(|&child| encode(forest, child, next))
            .collect(),
        None => Vec::new(),
    };
    SectionRecord {
        section: node.id.clone(),
        text: node.text.clone(),
        annotations: node.annotation.clone(),
        children,
    }
}

/// Encode every root of the forest in full.
pub fn encode_forest(forest: &SectionForest) -> Vec<SectionRecord> {
    forest
        .root_ids()
        .iter()
        .map(|&root| encode(forest, root, Depth::Full))
        .collect()
}

/// Decode one record (and its subtree) into a fresh forest.
pub fn decode(record: &SectionRecord) -> SectionForest {
    decode_all(std::slice::from_ref(record))
}

/// Decode several root records into one forest.
///
/// A record whose section already appeared earlier is skipped together with
/// its subtree and logged.
pub fn decode_all(records: &[SectionRecord]) -> SectionForest {
    let mut forest = SectionForest::new();
    for record in records {
        decode_into(&mut forest, record, None);
    }
    forest
}

fn decode_into(forest: &mut SectionForest, record: &SectionRecord, parent: Option<NodeId>) {
    let Some(node_id) = forest.push(
        record.section.clone(),
        record.text.clone(),
        record.annotations.clone(),
        parent,
    ) else {
        log::warn!(
            "Section {} appears more than once, skipping its second subtree",
            record.section
        );
        return;
    };
    for child in &record.children {
        decode_into(forest, child, Some(node_id));
    }
}

/// Persisted rows of one rule-set, indexed for tree lookups.
pub struct PersistedTree<'a> {
    by_id: HashMap<&'a SectionNumber, &'a PersistedSection>,
    children: HashMap<&'a SectionNumber, Vec<&'a PersistedSection>>,
    roots: Vec<&'a PersistedSection>,
}

impl<'a> PersistedTree<'a> {
    pub fn new(rows: &'a [PersistedSection]) -> Self {
        let mut by_id = HashMap::with_capacity(rows.len());
        let mut children: HashMap<&SectionNumber, Vec<&PersistedSection>> = HashMap::new();
        let mut roots = Vec::new();
        for row in rows {
            by_id.insert(&row.section, row);
            match &row.parent {
                Some(parent) => children.entry(parent).or_default().push(row),
                None => roots.push(row),
            }
        }
        for siblings in children.values_mut().chain(std::iter::once(&mut roots)) {
            siblings.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.section.cmp(&b.section)));
        }
        Self {
            by_id,
            children,
            roots,
        }
    }

    pub fn get(&self, id: &SectionNumber) -> Option<&'a PersistedSection> {
        self.by_id.get(id).copied()
    }

    /// Rows with the given parent (`None` for roots), ordered by `order`
    /// then section number.
    pub fn children_of(&self, parent: Option<&SectionNumber>) -> &[&'a PersistedSection] {
        match parent {
            None => &self.roots,
            Some(id) => self.children.get(id).map(Vec::as_slice).unwrap_or(&[]),
        }
    }

    /// Encode the subtree under `id` to the interchange shape.
    pub fn encode(&self, id: &SectionNumber, depth: Depth) -> Option<SectionRecord> {
        self.get(id).map(|row| self.encode_row(row, depth))
    }

    /// Encode every root row in full.
    pub fn encode_roots(&self) -> Vec<SectionRecord> {
        self.children_of(None)
            .iter()
            .map(|row| self.encode_row(row, Depth::Full))
            .collect()
    }

    fn encode_row(&self, row: &PersistedSection, depth: Depth) -> SectionRecord {
        let children = match depth.below() {
            Some(next) => self
                .children_of(Some(&row.section))
                .iter()
                .map(|child| self.encode_row(child, next))
                .collect(),
            None => Vec::new(),
        };
        SectionRecord {
            section: row.section.clone(),
            text: row.text.clone(),
            annotations: row.annotation.clone(),
            children,
        }
    }
}

/// Flatten a forest into persisted rows for `rule_set`.
///
/// Each row's `order` is the canonical sibling position derived from its
/// number.
pub fn to_persisted(forest: &SectionForest, rule_set: &RuleSetId) -> Vec<PersistedSection> {
    forest
        .iter()
        .map(|node| PersistedSection {
            rule_set: rule_set.clone(),
            section: node.id.clone(),
            text: node.text.clone(),
            annotation: node.annotation.clone(),
            parent: node.parent.map(|p| forest.node(p).id.clone()),
            order: node.id.order_within_parent(),
        })
        .collect()
}
