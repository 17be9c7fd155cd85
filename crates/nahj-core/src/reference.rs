//! Reference tokens such as `"1.94.2"` or `"0.5"`.
//!
//! The first dot-separated segment picks the collection, the rest addresses a
//! document (and optionally a paragraph) inside it.

use std::cmp::Ordering;

use nahj_client::types::DocumentKind;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Introduction,
    Sermons,
    Letters,
    Sayings,
}

/// First-segment code to collection.
const COLLECTIONS: [(&str, Collection); 4] = [
    ("0", Collection::Introduction),
    ("1", Collection::Sermons),
    ("2", Collection::Letters),
    ("3", Collection::Sayings),
];

impl Collection {
    pub fn from_code(code: &str) -> Option<Self> {
        COLLECTIONS
            .iter()
            .find(|(candidate, _)| *candidate == code)
            .map(|(_, collection)| *collection)
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Introduction => "0",
            Self::Sermons => "1",
            Self::Letters => "2",
            Self::Sayings => "3",
        }
    }

    /// Declared CMS type for document families; introductions have none.
    pub fn document_kind(self) -> Option<DocumentKind> {
        match self {
            Self::Introduction => None,
            Self::Sermons => Some(DocumentKind::Sermon),
            Self::Letters => Some(DocumentKind::Letter),
            Self::Sayings => Some(DocumentKind::Saying),
        }
    }

    /// Numbering prefix every document of the family starts with.
    pub fn number_prefix(self) -> &'static str {
        match self {
            Self::Introduction => "0.",
            Self::Sermons => "1.",
            Self::Letters => "2.",
            Self::Sayings => "3.",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Introduction => "Introduction",
            Self::Sermons => "Sermon",
            Self::Letters => "Letter",
            Self::Sayings => "Saying",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("reference `{0}` needs at least two dot-separated segments")]
    TooFewSegments(String),
    #[error("reference `{token}` has unknown collection code `{code}`")]
    UnknownCollection { token: String, code: String },
    #[error("reference `{0}` has an empty segment")]
    EmptySegment(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedReference {
    pub collection: Collection,
    /// Everything after the collection code, e.g. `"94.2"` for `"1.94.2"`.
    pub section_id: String,
}

impl ParsedReference {
    /// Splits `section_id` into the document id and an optional paragraph id.
    pub fn split_section(&self) -> (&str, Option<&str>) {
        match self.section_id.split_once('.') {
            Some((main, sub)) if !sub.is_empty() => (main, Some(sub)),
            Some((main, _)) => (main, None),
            None => (self.section_id.as_str(), None),
        }
    }
}

pub fn try_parse(token: &str) -> Result<ParsedReference, ReferenceError> {
    let token = token.trim();
    let Some((code, rest)) = token.split_once('.') else {
        return Err(ReferenceError::TooFewSegments(token.to_string()));
    };
    if code.is_empty() || rest.is_empty() {
        return Err(ReferenceError::TooFewSegments(token.to_string()));
    }
    // `1..5` or `1.26.` would widen the store query to a bare family prefix.
    if rest.split('.').any(str::is_empty) {
        return Err(ReferenceError::EmptySegment(token.to_string()));
    }
    let collection =
        Collection::from_code(code).ok_or_else(|| ReferenceError::UnknownCollection {
            token: token.to_string(),
            code: code.to_string(),
        })?;

    Ok(ParsedReference {
        collection,
        section_id: rest.to_string(),
    })
}

/// Lenient form of [`try_parse`]: a malformed token is simply `None`.
pub fn parse(token: &str) -> Option<ParsedReference> {
    try_parse(token).ok()
}

/// Orders reference tokens by their numeric runs, so `1.9` sorts before `1.10`.
pub fn compare_references(left: &str, right: &str) -> Ordering {
    let mut a = left.chars().peekable();
    let mut b = right.chars().peekable();

    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return left.cmp(right),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let run_a = take_digits(&mut a);
                let run_b = take_digits(&mut b);
                let ordering = compare_digit_runs(&run_a, &run_b);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(x), Some(y)) => {
                let ordering = x.to_lowercase().cmp(y.to_lowercase());
                if ordering != Ordering::Equal {
                    return ordering;
                }
                a.next();
                b.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        run.push(c);
    }
    run
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_collection_code() {
        for (token, expected) in [
            ("0.5", Collection::Introduction),
            ("1.94.2", Collection::Sermons),
            ("2.31", Collection::Letters),
            ("3.12", Collection::Sayings),
        ] {
            let parsed = parse(token).expect("valid token");
            assert_eq!(parsed.collection, expected, "token {token}");
        }
    }

    #[test]
    fn keeps_further_subdivision_in_section_id() {
        let parsed = parse("1.94.2").expect("valid token");
        assert_eq!(parsed.section_id, "94.2");
        assert_eq!(parsed.split_section(), ("94", Some("2")));

        let whole = parse("3.12").expect("valid token");
        assert_eq!(whole.split_section(), ("12", None));
    }

    #[test]
    fn deeper_paragraph_ids_stay_joined() {
        let parsed = parse("1.94.2.1").expect("valid token");
        assert_eq!(parsed.split_section(), ("94", Some("2.1")));
    }

    #[test]
    fn rejects_malformed_tokens_without_panicking() {
        for token in ["", "1", "1.", ".5", "4.1", "x.2", "12"] {
            assert!(parse(token).is_none(), "token {token:?} should fail");
        }
        assert_eq!(
            try_parse("7.1"),
            Err(ReferenceError::UnknownCollection {
                token: "7.1".to_string(),
                code: "7".to_string()
            })
        );
        assert!(matches!(
            try_parse("3"),
            Err(ReferenceError::TooFewSegments(_))
        ));
    }

    #[test]
    fn empty_inner_segments_are_rejected() {
        for token in ["1..5", "1.26.", "2.31..4"] {
            assert_eq!(
                try_parse(token),
                Err(ReferenceError::EmptySegment(token.to_string())),
                "token {token:?}"
            );
        }
    }

    #[test]
    fn numeric_aware_ordering() {
        assert_eq!(compare_references("1.9.1", "1.10.1"), Ordering::Less);
        assert_eq!(compare_references("1.10", "1.9"), Ordering::Greater);
        assert_eq!(compare_references("0.5", "1.1"), Ordering::Less);
        assert_eq!(compare_references("2.3", "2.3.1"), Ordering::Less);
        assert_eq!(compare_references("1.26.1", "1.26.1"), Ordering::Equal);
    }

    #[test]
    fn sorting_uses_numeric_runs() {
        let mut tokens = vec!["1.10.1", "1.9.1", "1.100", "0.5", "1.9"];
        tokens.sort_by(|a, b| compare_references(a, b));
        assert_eq!(tokens, vec!["0.5", "1.9", "1.9.1", "1.10.1", "1.100"]);
    }
}
