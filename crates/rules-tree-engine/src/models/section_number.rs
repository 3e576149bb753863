use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Minimum digit width of a bare top-level number such as `000` or `100`.
const TOP_LEVEL_WIDTH: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SectionNumberError {
    #[error("Empty section number")]
    Empty,
    #[error("Invalid component '{component}' in section number '{input}'")]
    InvalidComponent { input: String, component: String },
}

/// One dotted component of a section number.
///
/// Variant order matters: numeric components sort before letters at the
/// same depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Component {
    /// Digits as written. `width` keeps leading zeros so `003` stays `003`.
    Number { value: u64, width: usize },
    /// A single lowercase letter.
    Letter(char),
}

impl Component {
    /// Canonical position among siblings: the number itself, or the
    /// 0-based alphabet position of a letter (`a` = 0).
    pub fn order(&self) -> i64 {
        match *self {
            Component::Number { value, .. } => i64::try_from(value).unwrap_or(i64::MAX),
            Component::Letter(c) => i64::from(c as u8 - b'a'),
        }
    }

    fn parse(token: &str) -> Option<Self> {
        if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
            let value = token.parse().ok()?;
            return Some(Component::Number {
                value,
                width: token.len(),
            });
        }
        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_lowercase() => Some(Component::Letter(c)),
            _ => None,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Number { value, width } => write!(f, "{value:0width$}"),
            Component::Letter(c) => write!(f, "{c}"),
        }
    }
}

/// Dotted identifier of a rule section, e.g. `703.4.a.5`.
///
/// Components are fixed when the number is parsed. Ordering is
/// component-wise, so a parent always sorts before its descendants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SectionNumber {
    components: Vec<Component>,
}

impl SectionNumber {
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn depth(&self) -> usize {
        self.components.len()
    }

    pub fn last(&self) -> Component {
        // Parsing rejects empty numbers, so there is always a last component.
        self.components[self.components.len() - 1]
    }

    /// True for forest roots: a bare number that is a multiple of 100.
    pub fn is_top_level(&self) -> bool {
        matches!(
            self.components.as_slice(),
            [Component::Number { value, .. }] if value % 100 == 0
        )
    }

    /// Structural parent derived from the numbering alone.
    ///
    /// Dotted numbers drop their last component. A bare number that is not a
    /// multiple of 100 belongs to the nearest enclosing hundred, padded to
    /// the child's width (at least three digits), so `003` maps to `000`.
    /// Top-level numbers and bare letters have no parent.
    pub fn parent(&self) -> Option<SectionNumber> {
        match self.components.as_slice() {
            [Component::Number { value, width }] => {
                if value % 100 == 0 {
                    None
                } else {
                    Some(SectionNumber {
                        components: vec![Component::Number {
                            value: value / 100 * 100,
                            width: (*width).max(TOP_LEVEL_WIDTH),
                        }],
                    })
                }
            }
            [_] => None,
            components => Some(SectionNumber {
                components: components[..components.len() - 1].to_vec(),
            }),
        }
    }

    /// Top-level section owning this number, e.g. `703.4.a` -> `700`.
    pub fn top_level_section(&self) -> Option<SectionNumber> {
        match self.components.first() {
            Some(Component::Number { value, width }) => Some(SectionNumber {
                components: vec![Component::Number {
                    value: value / 100 * 100,
                    width: (*width).max(TOP_LEVEL_WIDTH),
                }],
            }),
            _ => None,
        }
    }

    pub fn has_letter(&self) -> bool {
        self.components
            .iter()
            .any(|c| matches!(c, Component::Letter(_)))
    }

    /// Value stored as a record's position among its siblings.
    pub fn order_within_parent(&self) -> i64 {
        self.last().order()
    }
}

impl FromStr for SectionNumber {
    type Err = SectionNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(SectionNumberError::Empty);
        }
        let components = s
            .split('.')
            .map(|token| {
                Component::parse(token).ok_or_else(|| SectionNumberError::InvalidComponent {
                    input: s.to_string(),
                    component: token.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { components })
    }
}

impl fmt::Display for SectionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{component}")?;
        }
        Ok(())
    }
}

impl Serialize for SectionNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SectionNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
