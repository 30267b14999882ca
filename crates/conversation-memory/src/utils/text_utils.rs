//! Char-boundary-safe text utilities shared by the summarizer and extractor.
//!
//! Every length here is counted in `char`s, never bytes, so Japanese and other
//! multi-byte content is measured the way a reader would count it.

use std::borrow::Cow;
use regex::Regex;
use lazy_static::lazy_static;

lazy_static! {
    static ref WHITESPACE_REGEX: Regex = Regex::new(r"\s+").unwrap();
}

/// Marker appended after a truncated summary or preview.
pub const ELLIPSIS: &str = "...";

/// One sentence-like piece of a text, as produced by [`TextUtils::split_fragments`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment<'a> {
    /// The fragment with surrounding whitespace trimmed, terminator excluded.
    pub text: &'a str,
    /// The punctuation that closed the fragment; `None` for a trailing remainder.
    pub terminator: Option<char>,
    /// Byte offset just past the terminator in the source text.
    pub end: usize,
}

pub struct TextUtils;

impl TextUtils {
    /// Number of chars in `text`.
    pub fn char_len(text: &str) -> usize {
        text.chars().count()
    }

    /// The first `n` chars of `text`, borrowed.
    pub fn take_chars(text: &str, n: usize) -> &str {
        match text.char_indices().nth(n) {
            Some((idx, _)) => &text[..idx],
            None => text,
        }
    }

    /// Collapse whitespace runs to single spaces and trim.
    pub fn normalize_whitespace(text: &str) -> Cow<'_, str> {
        if WHITESPACE_REGEX.is_match(text) {
            Cow::Owned(WHITESPACE_REGEX.replace_all(text, " ").trim().to_string())
        } else {
            Cow::Borrowed(text)
        }
    }

    /// Split `text` after every char in `terminators`.
    ///
    /// Empty fragments are kept so callers can apply their own length filter.
    pub fn split_fragments<'a>(text: &'a str, terminators: &[char]) -> Vec<Fragment<'a>> {
        let mut fragments = Vec::new();
        let mut start = 0;

        for (idx, ch) in text.char_indices() {
            if terminators.contains(&ch) {
                let end = idx + ch.len_utf8();
                fragments.push(Fragment {
                    text: text[start..idx].trim(),
                    terminator: Some(ch),
                    end,
                });
                start = end;
            }
        }

        if start < text.len() {
            fragments.push(Fragment {
                text: text[start..].trim(),
                terminator: None,
                end: text.len(),
            });
        }

        fragments
    }

    /// Cut `text` to at most `max_chars` without splitting a word.
    ///
    /// Text with no whitespace inside the window (CJK prose, long URLs) is cut
    /// at exactly `max_chars`.
    pub fn truncate_at_word_boundary(text: &str, max_chars: usize) -> &str {
        let prefix = Self::take_chars(text, max_chars);
        if prefix.len() == text.len() {
            return text;
        }

        let cut_on_boundary = text[prefix.len()..]
            .chars()
            .next()
            .map_or(true, char::is_whitespace);
        if cut_on_boundary {
            return prefix.trim_end();
        }

        match prefix.rfind(char::is_whitespace) {
            Some(pos) if !prefix[..pos].trim().is_empty() => prefix[..pos].trim_end(),
            _ => prefix,
        }
    }

    /// The first `max_chars` chars followed by an ellipsis, or the whole text
    /// when it already fits.
    pub fn preview(text: &str, max_chars: usize) -> Cow<'_, str> {
        if Self::char_len(text) <= max_chars {
            Cow::Borrowed(text)
        } else {
            Cow::Owned(format!("{}{}", Self::take_chars(text, max_chars), ELLIPSIS))
        }
    }
}
