//! Which text field of a document gets searched and excerpted.

use nahj_client::types::{Document, Introduction, SubUnit, Translation};
use serde::Serialize;

use crate::matcher::Script;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSource {
    /// Source-language (Arabic) text.
    Original,
    Translation,
}

const ARABIC_FIRST: [TextSource; 2] = [TextSource::Original, TextSource::Translation];
const TRANSLATION_FIRST: [TextSource; 2] = [TextSource::Translation, TextSource::Original];

/// Sources to try, in order, for a term written in `script`.
pub fn preference(script: Script) -> &'static [TextSource] {
    match script {
        Script::Arabic => &ARABIC_FIRST,
        Script::Latin => &TRANSLATION_FIRST,
    }
}

pub trait TextFields {
    fn original_text(&self) -> Option<String>;
    fn translated_text(&self, language: &str) -> Option<String>;

    fn text(&self, source: TextSource, language: &str) -> Option<String> {
        let text = match source {
            TextSource::Original => self.original_text(),
            TextSource::Translation => self.translated_text(language),
        };
        text.filter(|text| !text.trim().is_empty())
    }
}

/// First non-empty text along the preference list for `script`.
pub fn select_text<T: TextFields + ?Sized>(
    item: &T,
    script: Script,
    language: &str,
) -> Option<(TextSource, String)> {
    preference(script)
        .iter()
        .find_map(|source| item.text(*source, language).map(|text| (*source, text)))
}

/// Preferred-language translation, else the first non-empty one.
pub fn pick_translation<'a>(translations: &'a [Translation], language: &str) -> Option<&'a str> {
    let non_empty = || translations.iter().filter(|t| !t.text.trim().is_empty());
    non_empty()
        .find(|t| t.language.eq_ignore_ascii_case(language))
        .or_else(|| non_empty().next())
        .map(|t| t.text.as_str())
}

fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl TextFields for SubUnit {
    fn original_text(&self) -> Option<String> {
        non_blank(&self.text)
    }

    fn translated_text(&self, language: &str) -> Option<String> {
        pick_translation(&self.translations, language).and_then(non_blank)
    }
}

impl TextFields for Introduction {
    fn original_text(&self) -> Option<String> {
        non_blank(&self.content)
    }

    fn translated_text(&self, language: &str) -> Option<String> {
        pick_translation(&self.translations, language).and_then(non_blank)
    }
}

/// A whole document reads as its paragraphs joined by spaces, or its title
/// when it has no paragraph text in that source.
impl TextFields for Document {
    fn original_text(&self) -> Option<String> {
        join(self.paragraphs.iter().filter_map(SubUnit::original_text))
            .or_else(|| self.title.as_deref().and_then(non_blank))
    }

    fn translated_text(&self, language: &str) -> Option<String> {
        join(
            self.paragraphs
                .iter()
                .filter_map(|paragraph| paragraph.translated_text(language)),
        )
        .or_else(|| self.title_translation.as_deref().and_then(non_blank))
    }
}

fn join(parts: impl Iterator<Item = String>) -> Option<String> {
    let joined = parts.collect::<Vec<_>>().join(" ");
    (!joined.is_empty()).then_some(joined)
}
