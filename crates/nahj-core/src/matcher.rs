//! Case-insensitive term matching with a small English plural heuristic.
//!
//! Snippet extraction and highlighting both go through [`find_match`] and
//! [`term_variants`], so "this text matched" and "this span is highlighted"
//! cannot disagree.

use regex::{Regex, RegexBuilder};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Script {
    Arabic,
    Latin,
}

/// Arabic, Arabic Supplement and the presentation-form blocks.
pub fn is_arabic(c: char) -> bool {
    matches!(
        u32::from(c),
        0x0600..=0x06FF | 0x0750..=0x077F | 0x08A0..=0x08FF | 0xFB50..=0xFDFF | 0xFE70..=0xFEFF
    )
}

pub fn detect_script(text: &str) -> Script {
    if text.chars().any(is_arabic) {
        Script::Arabic
    } else {
        Script::Latin
    }
}

/// Byte range of a match inside the searched text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
}

impl MatchSpan {
    pub fn as_str<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

/// Search forms of `term`, in the order they are tried.
///
/// The term itself comes first, then: trailing `s` stripped, trailing `ies`
/// replaced by `y`, trailing `es` stripped. Arabic terms only match directly.
pub fn term_variants(term: &str) -> Vec<String> {
    let term = term.trim();
    if term.is_empty() {
        return Vec::new();
    }

    let mut variants = vec![term.to_string()];
    if detect_script(term) == Script::Arabic {
        return variants;
    }

    let lower = term.to_lowercase();
    if lower.ends_with('s') {
        push_unique(&mut variants, &term[..term.len() - 1]);
    }
    if lower.ends_with("ies") {
        push_unique(&mut variants, &format!("{}y", &term[..term.len() - 3]));
    }
    if lower.ends_with("es") {
        push_unique(&mut variants, &term[..term.len() - 2]);
    }
    variants
}

/// Forms that get visually emphasised: every search form plus the regular
/// plurals of the term, so "adornment" also lights up "adornments".
pub fn highlight_variants(term: &str) -> Vec<String> {
    let mut variants = term_variants(term);
    let Some(base) = variants.first().cloned() else {
        return variants;
    };
    if detect_script(&base) == Script::Latin {
        push_unique(&mut variants, &format!("{base}s"));
        push_unique(&mut variants, &format!("{base}es"));
    }
    variants
}

fn push_unique(variants: &mut Vec<String>, candidate: &str) {
    if candidate.is_empty() {
        return;
    }
    if !variants
        .iter()
        .any(|existing| existing.eq_ignore_ascii_case(candidate))
    {
        variants.push(candidate.to_string());
    }
}

pub(crate) fn literal_regex(literal: &str) -> Option<Regex> {
    RegexBuilder::new(&regex::escape(literal))
        .case_insensitive(true)
        .build()
        .ok()
}

/// First hit of the first variant that occurs in `haystack`.
pub fn find_match(haystack: &str, term: &str) -> Option<MatchSpan> {
    term_variants(term).iter().find_map(|variant| {
        literal_regex(variant)?
            .find(haystack)
            .map(|found| MatchSpan {
                start: found.start(),
                end: found.end(),
            })
    })
}

pub fn matches(haystack: &str, term: &str) -> bool {
    find_match(haystack, term).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plural_tolerance_both_directions() {
        assert!(matches("The adornments are old", "adornment"));
        assert!(matches("The adornment is old", "adornments"));
        assert!(!matches("unrelated text", "adornment"));
    }

    #[test]
    fn ies_becomes_y() {
        assert!(matches("Each city keeps its gate", "cities"));
        assert!(matches("The boxes were sealed; one box remained", "boxes"));
        assert!(matches("A single box", "boxes"));
    }

    #[test]
    fn matching_ignores_case() {
        let text = "Justice is the path";
        let span = find_match(text, "JUSTICE").expect("match");
        assert_eq!(span.as_str(text), "Justice");
    }

    #[test]
    fn direct_hit_wins_over_stripped_forms() {
        let text = "truth, then truths";
        let span = find_match(text, "truths").expect("match");
        assert_eq!(span.as_str(text), "truths");
    }

    #[test]
    fn variants_are_ordered() {
        assert_eq!(term_variants("cities"), vec!["cities", "citie", "city", "citi"]);
        assert_eq!(term_variants("word"), vec!["word"]);
        assert!(term_variants("   ").is_empty());
    }

    #[test]
    fn arabic_terms_match_directly_only() {
        assert_eq!(term_variants("العدلس"), vec!["العدلس"]);
        assert!(matches("إن العدل ميزان", "العدل"));
        assert!(!matches("إن العدل ميزان", "العدلس"));
        assert_eq!(detect_script("العدل"), Script::Arabic);
        assert_eq!(detect_script("justice"), Script::Latin);
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        assert!(matches("see (note) here", "(note)"));
        assert!(!matches("see note here", "n.te"));
    }

    #[test]
    fn highlight_variants_cover_plural_forms() {
        let variants = highlight_variants("adornment");
        assert!(variants.contains(&"adornments".to_string()));
        for variant in term_variants("adornment") {
            assert!(variants.contains(&variant));
        }
    }

    #[test]
    fn empty_term_never_matches() {
        assert!(!matches("anything", ""));
        assert!(highlight_variants("").is_empty());
    }
}
