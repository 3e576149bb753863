//! Pipeline tests for the parsing module.
//!
//! The fixture mimics text pulled from a published tournament rules page:
//! repeated page headers, wrapped lines, glued headers and cross-references.

use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};

use crate::models::{SectionForest, SectionNumber};
use crate::parsing::{ParsedRules, SourceLayout, parse_html_rules, parse_rules};

const TOURNAMENT_RULES: &str = include_str!("fixtures/tournament_rules.txt");

#[fixture]
fn parsed() -> ParsedRules {
    parse_rules(TOURNAMENT_RULES, SourceLayout::Lines)
}

fn id(s: &str) -> SectionNumber {
    s.parse().unwrap()
}

fn child_ids(forest: &SectionForest, section: &str) -> Vec<String> {
    let node_id = forest.lookup(&id(section)).unwrap();
    forest.children(node_id).map(|n| n.id.to_string()).collect()
}

fn text_of<'a>(forest: &'a SectionForest, section: &str) -> &'a str {
    &forest.get(&id(section)).unwrap().text
}

#[rstest]
fn top_level_sections(parsed: ParsedRules) {
    let roots: Vec<String> = parsed.forest.roots().map(|n| n.id.to_string()).collect();
    assert_eq!(roots, vec!["100", "200", "600"]);
}

#[rstest]
fn report_counts(parsed: ParsedRules) {
    assert_eq!(parsed.report.sections, 26);
    assert_eq!(parsed.report.duplicates, vec![id("100")]);
    assert!(parsed.report.orphans.is_empty());
    assert_eq!(parsed.report.ignored_lines, 3);
}

#[rstest]
#[case("100", &["101", "102", "103", "104", "105"])]
#[case("103", &["103.1", "103.2", "103.3"])]
#[case("104", &["104.1", "104.2", "104.3"])]
#[case("200", &["201", "202"])]
#[case("201", &["201.1", "201.2", "201.3"])]
#[case("601.1", &["601.1.a", "601.1.b"])]
fn section_children(parsed: ParsedRules, #[case] section: &str, #[case] expected: &[&str]) {
    assert_eq!(child_ids(&parsed.forest, section), expected);
}

#[rstest]
fn first_occurrence_text_survives(parsed: ParsedRules) {
    assert_eq!(text_of(&parsed.forest, "100"), "Introduction");
    assert_eq!(text_of(&parsed.forest, "103"), "Responsibility:");
}

#[rstest]
fn wrapped_lines_are_rejoined(parsed: ParsedRules) {
    assert_eq!(
        text_of(&parsed.forest, "104.2"),
        "vs. Official Local Language Translations: The English language version of this document will supersede any translation."
    );
}

#[rstest]
fn references_stay_in_text(parsed: ParsedRules) {
    assert_eq!(
        text_of(&parsed.forest, "202"),
        "Privacy: Personal data is handled as described in CR 127. Organizers must comply."
    );
    assert!(parsed.forest.get(&id("127")).is_none());
    assert!(parsed.forest.get(&id("602.3.d")).is_none());
}

#[rstest]
fn glued_headers_become_sections(parsed: ParsedRules) {
    let outline = parsed.forest.outline(parsed.forest.lookup(&id("600")).unwrap());
    insta::assert_snapshot!(outline, @r"
    600. Formats
      601. Constructed: Players bring their own decks.
        601.1. Deck Size: A main deck contains at least 40 cards.
          601.1.a. Legends: Each deck has exactly one legend.
          601.1.b. Runes: Each deck has exactly 12 runes. See 602.3.d. Rune decks are separate.
      602. Team Play: Played as 2v2
        602.1. Seating: Teammates sit together.
          602.1.a. Communication: Teammates may talk freely at any time.
    ");
}

#[test]
fn flowed_layout_finds_the_same_sections() {
    let lines = parse_rules(TOURNAMENT_RULES, SourceLayout::Lines);
    let flowed = parse_rules(TOURNAMENT_RULES, SourceLayout::Flowed);

    let line_ids: Vec<_> = lines.forest.iter().map(|n| n.id.clone()).collect();
    let flowed_ids: Vec<_> = flowed.forest.iter().map(|n| n.id.clone()).collect();
    assert_eq!(line_ids, flowed_ids);
}

#[test]
fn responsibility_nests_under_introduction() {
    let parsed = parse_rules(
        "100. Intro\n103. Resp:\n103.1. Attendees: ...\n103.2. Spectators: ...\n200. Defs",
        SourceLayout::Lines,
    );
    let roots: Vec<String> = parsed.forest.roots().map(|n| n.id.to_string()).collect();
    assert_eq!(roots, vec!["100", "200"]);
    assert_eq!(child_ids(&parsed.forest, "100"), vec!["103"]);
    assert_eq!(child_ids(&parsed.forest, "103"), vec!["103.1", "103.2"]);
}

#[test]
fn orphan_line_is_kept() {
    let parsed = parse_rules("999.9.9. orphaned", SourceLayout::Lines);
    let roots: Vec<String> = parsed.forest.roots().map(|n| n.id.to_string()).collect();
    assert_eq!(roots, vec!["999.9.9"]);
    assert_eq!(parsed.report.orphans, vec![id("999.9.9")]);
}

#[test]
fn html_page_pipeline() {
    let html = r#"<main>
<h1>Tournament Rules</h1>
<h2>100. Introduction</h2>
<p>101. <b>Purpose:</b> Frameworks &amp; structures.</p>
<p>103. Responsibility:</p>
<ul><li>103.1. Attendees: All competitors are expected to
follow the rules.</li><li>103.2. Spectators: See 204.8. for details.</li></ul>
</main>"#;
    let parsed = parse_html_rules(html).unwrap();

    assert_eq!(child_ids(&parsed.forest, "100"), vec!["101", "103"]);
    assert_eq!(text_of(&parsed.forest, "101"), "Purpose: Frameworks & structures.");
    assert_eq!(
        text_of(&parsed.forest, "103.1"),
        "Attendees: All competitors are expected to follow the rules."
    );
    assert_eq!(
        text_of(&parsed.forest, "103.2"),
        "Spectators: See 204.8. for details."
    );
}
