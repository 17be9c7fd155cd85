//! Sentence-bounded excerpts around a term match.

use crate::matcher::find_match;

/// Sentence terminators, including the Arabic question mark.
const SENTENCE_END: [char; 4] = ['.', '!', '?', '؟'];
/// Sentences shorter than this are widened to a fixed window.
pub const MIN_SENTENCE_CHARS: usize = 50;
/// Characters kept on each side of the match start when widening.
pub const HALF_WINDOW_CHARS: usize = 50;
pub const DEFAULT_EXCERPT_CHARS: usize = 300;
const ELLIPSIS: &str = "...";

/// Excerpt around the first match of `term` in `text`, or `None` when the
/// term (and its plural forms) does not occur.
pub fn extract(text: &str, term: &str) -> Option<String> {
    let span = find_match(text, term)?;

    // Byte offset of every char, plus one past the end.
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = offsets.len() - 1;
    let match_start = char_position(&offsets, span.start);
    let match_end = char_position(&offsets, span.end);
    let chars: Vec<char> = text.chars().collect();

    let sentence_start = chars[..match_start]
        .iter()
        .rposition(|c| SENTENCE_END.contains(c))
        .map_or(0, |index| index + 1);
    let sentence_end = chars[match_end..]
        .iter()
        .position(|c| SENTENCE_END.contains(c))
        .map_or(char_count, |index| match_end + index + 1);

    let sentence = text[offsets[sentence_start]..offsets[sentence_end]].trim();
    let sentence_chars = sentence.chars().count();
    if sentence_chars >= MIN_SENTENCE_CHARS || text.trim().chars().count() <= sentence_chars {
        return Some(sentence.to_string());
    }

    let mut start = match_start.saturating_sub(HALF_WINDOW_CHARS);
    let mut end = (match_start + HALF_WINDOW_CHARS).min(char_count);
    // Never trade a few characters for a longer ellipsis.
    if start <= ELLIPSIS.len() {
        start = 0;
    }
    if char_count - end <= ELLIPSIS.len() {
        end = char_count;
    }

    let mut window = String::new();
    if start > 0 {
        window.push_str(ELLIPSIS);
    }
    window.push_str(&text[offsets[start]..offsets[end]]);
    if end < char_count {
        window.push_str(ELLIPSIS);
    }
    Some(window)
}

/// First `max_chars` characters of `text`, with a trailing ellipsis when cut.
pub fn leading_excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

fn char_position(offsets: &[usize], byte: usize) -> usize {
    offsets.partition_point(|offset| *offset < byte)
}
