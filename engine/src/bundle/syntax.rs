//! Checked markdown and HTML parsing
//!
//! Neither format can fail on bytes alone, so "parseable" is defined by
//! what the parse produced. Markdown must yield at least one event. HTML
//! is scanned tag by tag and fails only on structural breakage: a comment
//! or tag that is never closed. Text without markup is a valid document.

use pulldown_cmark::{Options, Parser};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("markdown produced no content")]
    EmptyMarkdown,

    #[error("comment opened at byte {0} is never closed")]
    UnterminatedComment(usize),

    #[error("tag opened at byte {0} is never closed")]
    UnterminatedTag(usize),

    #[error("<{name}> opened at byte {at} is never closed")]
    UnterminatedRawText { name: &'static str, at: usize },
}

/// Summary of a successful markdown parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkdownSummary {
    pub events: usize,
}

/// Summary of a successful HTML parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HtmlSummary {
    /// Start tags seen, scaffolding included
    pub elements: usize,
}

/// Elements whose content is not markup
const RAW_TEXT: [&str; 2] = ["script", "style"];

pub fn parse_markdown(source: &str) -> Result<MarkdownSummary, SyntaxError> {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES;

    let events = Parser::new_ext(source, options).count();
    if events == 0 {
        return Err(SyntaxError::EmptyMarkdown);
    }
    Ok(MarkdownSummary { events })
}

pub fn parse_html(source: &str) -> Result<HtmlSummary, SyntaxError> {
    let lowered = source.to_ascii_lowercase();
    let mut elements = 0;
    let mut pos = 0;

    while let Some(offset) = source[pos..].find('<') {
        let open = pos + offset;
        let after = &source[open + 1..];

        if after.starts_with("!--") {
            let body = open + 4;
            let close = source[body..]
                .find("-->")
                .ok_or(SyntaxError::UnterminatedComment(open))?;
            pos = body + close + 3;
            continue;
        }

        let starts_tag = after
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?'));
        if !starts_tag {
            // a bare '<' is text
            pos = open + 1;
            continue;
        }

        let close = tag_end(after).ok_or(SyntaxError::UnterminatedTag(open))?;
        pos = open + 1 + close + 1;

        let name = tag_name(after);
        if name.is_empty() {
            continue;
        }
        elements += 1;

        if let Some(raw) = RAW_TEXT.iter().find(|raw| name.eq_ignore_ascii_case(raw)) {
            let end_tag = format!("</{}", raw);
            let close = lowered[pos..]
                .find(&end_tag)
                .ok_or(SyntaxError::UnterminatedRawText { name: *raw, at: open })?;
            pos += close;
        }
    }

    Ok(HtmlSummary { elements })
}

/// Offset of the `>` closing a tag, skipping quoted attribute values
fn tag_end(tag: &str) -> Option<usize> {
    let mut quote = None;
    for (i, c) in tag.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Some(i),
            (None, _) => {}
        }
    }
    None
}

/// Name of a start tag; empty for end tags, doctypes and processing instructions
fn tag_name(tag: &str) -> &str {
    let end = tag
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .unwrap_or(tag.len());
    &tag[..end]
}
