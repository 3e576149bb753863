//! # Rules Parsing
//!
//! Turns a flat, numbered rules text into a [`SectionForest`].
//!
//! ## Phases
//!
//! 1. **Normalize** (`normalize`): collapse whitespace, rejoin wrapped lines,
//!    split concatenated headers onto their own lines while leaving
//!    cross-references such as `See 602.3.d.` inline
//! 2. **Tokenize** (`tokenize`): match `<number>. <content>` lines, keep the
//!    first occurrence of each number
//! 3. **Build** (`hierarchy`): derive every parent from the numbering alone
//!    and link nodes in document order
//!
//! `html` is an optional pre-phase for rules published as a web page.
//!
//! ## Key Invariants
//!
//! - Parsing never fails: malformed lines are ignored, missing parents
//!   promote a node to a root
//! - Normalizing twice equals normalizing once

pub mod hierarchy;
pub mod html;
pub mod normalize;
pub mod tokenize;

#[cfg(test)]
mod tests;

use crate::models::{SectionForest, SectionNumber};

pub use hierarchy::{Hierarchy, build_hierarchy};
pub use html::{HtmlError, html_to_text};
pub use normalize::{SourceLayout, UnknownLayout, normalize};
pub use tokenize::{SectionToken, Tokens, tokenize};

/// Anomalies recovered while parsing. None of them is an error.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParseReport {
    pub sections: usize,
    pub duplicates: Vec<SectionNumber>,
    pub orphans: Vec<SectionNumber>,
    pub ignored_lines: usize,
}

#[derive(Debug)]
pub struct ParsedRules {
    pub forest: SectionForest,
    pub report: ParseReport,
}

/// Run the full pipeline: normalize, tokenize, build.
pub fn parse_rules(text: &str, layout: SourceLayout) -> ParsedRules {
    let normalized = normalize(text, layout);
    let tokens = tokenize(&normalized);
    log::debug!(
        "Tokenized {} sections ({} duplicates, {} other lines)",
        tokens.sections.len(),
        tokens.duplicates.len(),
        tokens.ignored_lines
    );

    let Tokens {
        sections,
        duplicates,
        ignored_lines,
    } = tokens;
    let Hierarchy { forest, orphans } = build_hierarchy(sections);

    for id in &duplicates {
        log::warn!("Duplicate section {id} ignored, keeping first occurrence");
    }
    for id in &orphans {
        log::warn!("Section {id} has no parent in this document, promoted to top level");
    }

    let report = ParseReport {
        sections: forest.len(),
        duplicates,
        orphans,
        ignored_lines,
    };
    ParsedRules { forest, report }
}

/// Parse rules published as an HTML page.
pub fn parse_html_rules(html: &str) -> Result<ParsedRules, HtmlError> {
    Ok(parse_rules(&html_to_text(html)?, SourceLayout::Lines))
}
