use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::models::SectionNumber;

/// A recognized `<number>. <content>` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionToken {
    pub id: SectionNumber,
    pub text: String,
}

/// Tokenizer output: unique sections in first-occurrence order.
#[derive(Debug, Default)]
pub struct Tokens {
    pub sections: Vec<SectionToken>,
    /// Later repeats of an already-seen number, in the order they were met.
    pub duplicates: Vec<SectionNumber>,
    /// Non-empty lines that did not match the header grammar.
    pub ignored_lines: usize,
}

fn section_line_pattern() -> &'static Regex {
    static SECTION_LINE: OnceLock<Regex> = OnceLock::new();
    SECTION_LINE.get_or_init(|| {
        Regex::new(r"^((?:\d+|[a-z])(?:\.(?:\d+|[a-z]))*)\.\s+(.*)$")
            .expect("Invalid section line regex")
    })
}

/// Scan normalized text line by line for section headers.
///
/// The first occurrence of a number wins; repeats (page headers, footers)
/// are recorded and dropped.
pub fn tokenize(text: &str) -> Tokens {
    let mut tokens = Tokens::default();
    let mut seen = HashSet::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((id, content)) = parse_section_line(line) else {
            tokens.ignored_lines += 1;
            continue;
        };
        if seen.insert(id.clone()) {
            tokens.sections.push(SectionToken {
                id,
                text: content.trim_end().to_string(),
            });
        } else {
            tokens.duplicates.push(id);
        }
    }

    tokens
}

fn parse_section_line(line: &str) -> Option<(SectionNumber, &str)> {
    let caps = section_line_pattern().captures(line)?;
    let id = caps.get(1)?.as_str().parse().ok()?;
    Some((id, caps.get(2)?.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn ids(tokens: &Tokens) -> Vec<String> {
        tokens.sections.iter().map(|t| t.id.to_string()).collect()
    }

    #[test]
    fn test_first_occurrence_wins() {
        let tokens = tokenize("100. First\n101. Purpose\n100. Repeated Header");
        assert_eq!(ids(&tokens), vec!["100", "101"]);
        assert_eq!(tokens.sections[0].text, "First");
        assert_eq!(tokens.duplicates, vec!["100".parse::<SectionNumber>().unwrap()]);
    }

    #[test]
    fn test_ignores_non_header_lines() {
        let tokens = tokenize("Riftbound Rules\n100. Intro\nPage 3 of 20\n\n204.1.a. Deep");
        assert_eq!(ids(&tokens), vec!["100", "204.1.a"]);
        assert_eq!(tokens.ignored_lines, 2);
    }

    #[rstest]
    #[case("100. Introduction", Some(("100", "Introduction")))]
    #[case("204.1.a.1. Nested item", Some(("204.1.a.1", "Nested item")))]
    #[case("a. Lettered item", Some(("a", "Lettered item")))]
    #[case("000. Golden rules", Some(("000", "Golden rules")))]
    #[case("100.Introduction", None)]
    #[case("100.", None)]
    #[case("See 204.8 for more", None)]
    #[case("A. Uppercase is not a section", None)]
    fn test_section_line_grammar(#[case] line: &str, #[case] expected: Option<(&str, &str)>) {
        let parsed = parse_section_line(line).map(|(id, text)| (id.to_string(), text.to_string()));
        assert_eq!(
            parsed,
            expected.map(|(id, text)| (id.to_string(), text.to_string()))
        );
    }

    #[test]
    fn test_preserves_source_order() {
        let tokens = tokenize("200. Defs\n100. Intro\n150. Middle");
        assert_eq!(ids(&tokens), vec!["200", "100", "150"]);
    }
}
