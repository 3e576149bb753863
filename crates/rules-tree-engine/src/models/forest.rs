use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::SectionNumber;

/// Index of a node inside a [`SectionForest`].
pub type NodeId = usize;

/// One rule section.
///
/// Children are stored as indices into the owning forest, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionNode {
    pub id: SectionNumber,
    pub text: String,
    /// Free-form notes added after parsing. Always empty for parsed nodes.
    pub annotation: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Arena of section nodes plus an id lookup table.
///
/// Roots are true top-level sections and promoted orphans, in the order they
/// were added.
#[derive(Debug, Clone, Default)]
pub struct SectionForest {
    nodes: Vec<SectionNode>,
    roots: Vec<NodeId>,
    index: HashMap<SectionNumber, NodeId>,
}

impl SectionForest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node under `parent`, or as a root when `parent` is `None`.
    ///
    /// Returns `None` if the id is already present; the forest never holds
    /// two nodes with the same id.
    pub fn push(
        &mut self,
        id: SectionNumber,
        text: String,
        annotation: String,
        parent: Option<NodeId>,
    ) -> Option<NodeId> {
        let node_id = self.insert_detached(id, text)?;
        self.nodes[node_id].annotation = annotation;
        self.attach(node_id, parent);
        Some(node_id)
    }

    /// Add a node without linking it anywhere yet; see [`Self::attach`].
    pub(crate) fn insert_detached(&mut self, id: SectionNumber, text: String) -> Option<NodeId> {
        if self.index.contains_key(&id) {
            return None;
        }
        let node_id = self.nodes.len();
        self.index.insert(id.clone(), node_id);
        self.nodes.push(SectionNode {
            id,
            text,
            annotation: String::new(),
            parent: None,
            children: Vec::new(),
        });
        Some(node_id)
    }

    /// Link a detached node under `parent`, or make it a root.
    pub(crate) fn attach(&mut self, node_id: NodeId, parent: Option<NodeId>) {
        self.nodes[node_id].parent = parent;
        match parent {
            Some(p) => self.nodes[p].children.push(node_id),
            None => self.roots.push(node_id),
        }
    }

    pub fn node(&self, node_id: NodeId) -> &SectionNode {
        &self.nodes[node_id]
    }

    pub fn set_annotation(&mut self, node_id: NodeId, annotation: impl Into<String>) {
        self.nodes[node_id].annotation = annotation.into();
    }

    pub fn get(&self, id: &SectionNumber) -> Option<&SectionNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn lookup(&self, id: &SectionNumber) -> Option<NodeId> {
        self.index.get(id).copied()
    }

    pub fn roots(&self) -> impl Iterator<Item = &SectionNode> {
        self.roots.iter().map(|&i| &self.nodes[i])
    }

    pub fn root_ids(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn children(&self, node_id: NodeId) -> impl Iterator<Item = &SectionNode> {
        self.nodes[node_id].children.iter().map(|&i| &self.nodes[i])
    }

    /// Structural parent id of a node, if it has one in this forest.
    pub fn parent_id(&self, id: &SectionNumber) -> Option<&SectionNumber> {
        let node = self.get(id)?;
        node.parent.map(|p| &self.nodes[p].id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in document (pre-order) sequence.
    pub fn iter(&self) -> impl Iterator<Item = &SectionNode> {
        self.preorder().into_iter().map(|i| &self.nodes[i])
    }

    fn preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(i) = stack.pop() {
            out.push(i);
            stack.extend(self.nodes[i].children.iter().rev().copied());
        }
        out
    }

    /// Flattened `id -> text` view used for diffing.
    pub fn flatten(&self) -> BTreeMap<SectionNumber, String> {
        self.nodes
            .iter()
            .map(|n| (n.id.clone(), n.text.clone()))
            .collect()
    }

    /// Indented outline of the subtree rooted at `node_id`.
    pub fn outline(&self, node_id: NodeId) -> String {
        let mut out = String::new();
        self.write_outline(&mut out, node_id, 0);
        out
    }

    fn write_outline(&self, out: &mut String, node_id: NodeId, depth: usize) {
        let node = &self.nodes[node_id];
        out.push_str(&"  ".repeat(depth));
        out.push_str(&format!("{}. {}\n", node.id, node.text));
        for &child in &node.children {
            self.write_outline(out, child, depth + 1);
        }
    }
}

impl fmt::Display for SectionForest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &root in &self.roots {
            f.write_str(&self.outline(root))?;
        }
        Ok(())
    }
}
