//! Text normalization: turns extracted text into one logical section per line.
//!
//! Cross-references such as `See rule 318.` or `CR 127.` are masked before
//! splitting so their numbers are never taken for new headers.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

/// How line breaks in the source relate to the document structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceLayout {
    /// Lines are meaningful (text taken from an HTML page). Lines starting
    /// with a lowercase letter are wrapped continuations.
    #[default]
    Lines,
    /// Every line break is a wrap (text extracted from a PDF). The whole
    /// text is reflowed before headers are split out again.
    Flowed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown source layout '{0}' (expected 'lines' or 'flowed')")]
pub struct UnknownLayout(pub String);

impl FromStr for SourceLayout {
    type Err = UnknownLayout;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lines" | "html" => Ok(Self::Lines),
            "flowed" | "pdf" => Ok(Self::Flowed),
            _ => Err(UnknownLayout(s.to_string())),
        }
    }
}

impl fmt::Display for SourceLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lines => f.write_str("lines"),
            Self::Flowed => f.write_str("flowed"),
        }
    }
}

/// A header candidate: three digits, optional `.digits`/`.letter` groups,
/// then `". "`.
fn header_pattern() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| {
        Regex::new(r"(\d{3}(?:\.(?:\d+|[a-z]))*)\. ").expect("Invalid header regex")
    })
}

/// Cross-reference phrases whose number must stay inline.
fn reference_pattern() -> &'static Regex {
    static REFERENCE: OnceLock<Regex> = OnceLock::new();
    REFERENCE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:see\s+rule|see|cr|section|rule)\s*\d+(?:\.(?:\d+|[a-z]))*\.")
            .expect("Invalid reference regex")
    })
}

/// Normalize raw text so every section header starts its own line.
///
/// Whitespace runs collapse to one space, blank lines are dropped,
/// continuation lines are rejoined and concatenated headers are split onto
/// new lines. Normalizing normalized text returns it unchanged.
pub fn normalize(text: &str, layout: SourceLayout) -> String {
    let lines = clean_lines(text);
    let logical = match layout {
        SourceLayout::Lines => join_continuations(lines),
        SourceLayout::Flowed if lines.is_empty() => lines,
        SourceLayout::Flowed => vec![lines.join(" ")],
    };

    logical
        .iter()
        .flat_map(|line| split_headers(line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn clean_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect()
}

fn join_continuations(lines: Vec<String>) -> Vec<String> {
    let mut joined: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        let continues = line.chars().next().is_some_and(char::is_lowercase);
        match joined.last_mut() {
            Some(previous) if continues => {
                previous.push(' ');
                previous.push_str(&line);
            }
            _ => joined.push(line),
        }
    }
    joined
}

fn protected_spans(line: &str) -> Vec<Range<usize>> {
    reference_pattern()
        .find_iter(line)
        .map(|m| m.range())
        .collect()
}

/// Offset of a three-digit last component that follows a numeric one, as
/// in `602.4.b.5.603`. Sub-sections never have three-digit components, so
/// that tail is a new top-level header glued to the end of a reference.
fn glued_top_level(number: &str) -> Option<usize> {
    let (head, last) = number.rsplit_once('.')?;
    let previous = head.rsplit('.').next()?;
    let is_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    (last.len() == 3 && is_digits(last) && is_digits(previous)).then_some(head.len() + 1)
}

/// Split one logical line before every header that is not at its start.
///
/// A header glued to a preceding digit is only split off when it is dotted
/// (`2v2603.1.`), otherwise `1100.` would become `1` and `100.`.
fn split_headers(line: &str) -> Vec<String> {
    let protected = protected_spans(line);
    let mut cuts = Vec::new();

    for caps in header_pattern().captures_iter(line) {
        let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if let Some(offset) = glued_top_level(number.as_str()) {
            cuts.push(number.start() + offset);
            continue;
        }
        let start = whole.start();
        if start == 0 || protected.iter().any(|span| span.contains(&start)) {
            continue;
        }
        let glued_to_digit = line[..start]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_digit());
        if glued_to_digit && !number.as_str().contains('.') {
            continue;
        }
        cuts.push(start);
    }

    let mut segments = Vec::with_capacity(cuts.len() + 1);
    let mut from = 0;
    for cut in cuts.into_iter().chain(std::iter::once(line.len())) {
        let segment = line[from..cut].trim();
        if !segment.is_empty() {
            segments.push(segment.to_string());
        }
        from = cut;
    }
    segments
}
