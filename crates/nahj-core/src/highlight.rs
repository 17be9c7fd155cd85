use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::matcher::highlight_variants;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub text: String,
    #[serde(rename = "isMatch")]
    pub is_match: bool,
}

impl Segment {
    fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            is_match: false,
        }
    }
}

/// Case-insensitive alternation over every highlightable form of `term`.
///
/// Longer forms come first so "adornments" wins over its "adornment" prefix.
pub fn highlight_pattern(term: &str) -> Option<Regex> {
    let mut variants = highlight_variants(term);
    if variants.is_empty() {
        return None;
    }
    variants.sort_by(|a, b| b.len().cmp(&a.len()));
    let alternation = variants
        .iter()
        .map(|variant| regex::escape(variant))
        .collect::<Vec<_>>()
        .join("|");
    RegexBuilder::new(&format!("({alternation})"))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Splits `text` into alternating plain and highlighted segments.
///
/// Concatenating the segment texts always reproduces `text`.
pub fn render(text: &str, term: &str) -> Vec<Segment> {
    if text.is_empty() {
        return Vec::new();
    }
    let Some(pattern) = highlight_pattern(term) else {
        return vec![Segment::plain(text)];
    };

    let mut segments = Vec::new();
    let mut cursor = 0;
    for found in pattern.find_iter(text) {
        if found.start() > cursor {
            segments.push(Segment::plain(&text[cursor..found.start()]));
        }
        segments.push(Segment {
            text: found.as_str().to_string(),
            is_match: true,
        });
        cursor = found.end();
    }
    if cursor < text.len() {
        segments.push(Segment::plain(&text[cursor..]));
    }
    segments
}
