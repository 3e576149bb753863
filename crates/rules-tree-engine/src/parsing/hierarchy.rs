use crate::models::{SectionForest, SectionNumber};

use super::tokenize::SectionToken;

/// Result of building the section hierarchy.
#[derive(Debug, Default)]
pub struct Hierarchy {
    pub forest: SectionForest,
    /// Sections promoted to roots because their structural parent is absent.
    pub orphans: Vec<SectionNumber>,
}

/// Build the section forest from ordered, de-duplicated tokens.
///
/// Each node's parent is a pure function of its number (see
/// [`SectionNumber::parent`]). A parent counts as known if it appears
/// anywhere in the token list; children are appended in token order and
/// never re-sorted. Missing parents never drop a node: it becomes a root.
pub fn build_hierarchy(tokens: Vec<SectionToken>) -> Hierarchy {
    let mut forest = SectionForest::new();

    let mut order = Vec::with_capacity(tokens.len());
    for token in tokens {
        if let Some(node_id) = forest.insert_detached(token.id, token.text) {
            order.push(node_id);
        }
    }

    let mut orphans = Vec::new();
    for node_id in order {
        let id = &forest.node(node_id).id;
        let parent = id.parent().and_then(|p| forest.lookup(&p));
        if parent.is_none() && !id.is_top_level() {
            orphans.push(id.clone());
        }
        forest.attach(node_id, parent);
    }

    Hierarchy { forest, orphans }
}
