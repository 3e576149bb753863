//! Plain-text extraction for rules published as an HTML page.

use lol_html::html_content::ContentType;
use lol_html::{RewriteStrSettings, doc_comments, element, rewrite_str};

/// Elements whose content is never visible text.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "template", "noscript"];

/// Elements that start and end a line.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "td", "th",
    "table", "section", "article", "header", "footer", "main", "blockquote",
];

#[derive(Debug, thiserror::Error)]
pub enum HtmlError {
    #[error("HTML rewrite failed: {0}")]
    Rewrite(String),
}

/// Reduce an HTML page to its visible text, one phrase per line.
///
/// Scripts, styles and comments are dropped, block elements become line
/// breaks, inline markup disappears and entities are decoded. Runs separated
/// by two or more spaces (several headlines on one source line) are split
/// onto their own lines.
pub fn html_to_text(html: &str) -> Result<String, HtmlError> {
    let text = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("*", |el| {
                let tag = el.tag_name().to_ascii_lowercase();
                if HIDDEN_ELEMENTS.contains(&tag.as_str()) {
                    el.remove();
                    return Ok(());
                }
                if BLOCK_ELEMENTS.contains(&tag.as_str()) {
                    el.before("\n", ContentType::Text);
                    el.after("\n", ContentType::Text);
                }
                el.remove_and_keep_content();
                Ok(())
            })],
            document_content_handlers: vec![doc_comments!(|comment| {
                comment.remove();
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| HtmlError::Rewrite(e.to_string()))?;

    let text = html_escape::decode_html_entities(&text);
    Ok(text
        .lines()
        .flat_map(|line| line.trim().split("  "))
        .map(str::trim)
        .filter(|phrase| !phrase.is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}
