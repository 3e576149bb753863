use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::SectionNumber;

/// Name of a rule-set (document category), e.g. `TR` or `CR`.
///
/// Stored upper-cased. Used in file names, so it is restricted to ASCII
/// letters, digits, `-` and `_`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RuleSetId(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid rule-set identifier '{0}'")]
pub struct RuleSetIdError(pub String);

impl RuleSetId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RuleSetId {
    type Err = RuleSetIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self(s.to_ascii_uppercase()))
        } else {
            Err(RuleSetIdError(s.to_string()))
        }
    }
}

impl TryFrom<String> for RuleSetId {
    type Error = RuleSetIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RuleSetId> for String {
    fn from(value: RuleSetId) -> Self {
        value.0
    }
}

impl fmt::Display for RuleSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Interchange shape of a section subtree, one file per root:
/// `{"section", "text", "annotations", "children"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionRecord {
    pub section: SectionNumber,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub annotations: String,
    #[serde(default)]
    pub children: Vec<SectionRecord>,
}

impl SectionRecord {
    /// Number of sections in this subtree, including itself.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(SectionRecord::count).sum::<usize>()
    }
}

/// A section as held by the persisted store.
///
/// `(rule_set_id, section_id)` is unique; `parent_id` refers to another
/// record of the same rule-set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSection {
    #[serde(rename = "rule_set_id")]
    pub rule_set: RuleSetId,
    #[serde(rename = "section_id")]
    pub section: SectionNumber,
    pub text: String,
    #[serde(default)]
    pub annotation: String,
    #[serde(rename = "parent_id")]
    pub parent: Option<SectionNumber>,
    pub order: i64,
}

/// Side-record written next to a successful full parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub last_updated: NaiveDate,
    pub source_url: String,
}

impl Metadata {
    pub fn today(source_url: impl Into<String>) -> Self {
        Self {
            last_updated: chrono::Local::now().date_naive(),
            source_url: source_url.into(),
        }
    }
}
