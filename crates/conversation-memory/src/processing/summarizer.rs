//! Fixed-budget short and medium summaries.
//!
//! Both summaries are extractive: they keep whole leading sentences and only
//! cut inside a sentence at a word boundary. Every limit counts chars.

use lazy_static::lazy_static;
use regex::Regex;

use super::extractor::{TermCollector, Vocabulary, ACRONYM, CAMEL_CASE};
use crate::utils::{Fragment, TextUtils, ELLIPSIS};

/// Nominal ceiling of [`summary_short`].
pub const SHORT_SUMMARY_MAX_CHARS: usize = 150;
/// Nominal ceiling of [`summary_medium`].
pub const MEDIUM_SUMMARY_MAX_CHARS: usize = 400;

const SHORT_CUT_CHARS: usize = SHORT_SUMMARY_MAX_CHARS - 3;
const SHORT_MIN_SENTENCE_CHARS: usize = 20;
const SHORT_EXTEND_BELOW_CHARS: usize = 80;
const SHORT_MIN_CONTINUATION_CHARS: usize = 10;

const MEDIUM_SENTENCE_BUDGET: usize = 300;
const MEDIUM_ADDENDUM_BELOW_CHARS: usize = 350;
const MEDIUM_MIN_SENTENCE_CHARS: usize = 10;
const MEDIUM_CUT_CHARS: usize = MEDIUM_SUMMARY_MAX_CHARS - 3;
const MEDIUM_MATCHES_PER_PATTERN: usize = 5;
const MEDIUM_ADDENDUM_TERMS: usize = 3;

const SHORT_TERMINATORS: &[char] = &['.', '。', '!', '！', '?', '？', '\n'];
const MEDIUM_TERMINATORS: &[char] = &['.', '。', '!', '！', '?', '？'];

const HIGHLIGHT_TECH_NAMES: &[&str] = &[
    "Docker", "Kubernetes", "Redis", "PostgreSQL", "MySQL", "MongoDB", "AWS", "Azure", "GCP",
    "GoogleCloud", "Terraform", "FastAPI", "React", "Vue", "Angular",
];

lazy_static! {
    static ref DOTTED_TOKEN: Regex = Regex::new(r"(?-u:\b)[A-Za-z0-9_]+\.[a-z]+(?-u:\b)").unwrap();
    static ref HIGHLIGHT_VOCABULARY: Vocabulary = Vocabulary::new(HIGHLIGHT_TECH_NAMES);
    static ref HIGHLIGHT_JA_TERMS: Regex =
        Regex::new("システム|データベース|サーバー|API|エラー|実装|設定|最適化|解決").unwrap();
}

/// A summary of at most [`SHORT_SUMMARY_MAX_CHARS`] chars built from the first
/// meaningful sentence (and part of the second when the first is brief).
pub fn summary_short(text: &str) -> String {
    if TextUtils::char_len(text) <= SHORT_SUMMARY_MAX_CHARS {
        return text.to_string();
    }

    let sentences: Vec<&str> = TextUtils::split_fragments(text, SHORT_TERMINATORS)
        .into_iter()
        .map(|f| f.text)
        .filter(|s| TextUtils::char_len(s) > SHORT_MIN_SENTENCE_CHARS)
        .collect();

    let Some(first) = sentences.first() else {
        return with_ellipsis(TextUtils::truncate_at_word_boundary(text, SHORT_CUT_CHARS));
    };

    let first_len = TextUtils::char_len(first);
    if first_len > SHORT_SUMMARY_MAX_CHARS {
        return with_ellipsis(TextUtils::truncate_at_word_boundary(first, SHORT_CUT_CHARS));
    }

    let mut summary = first.to_string();
    if first_len < SHORT_EXTEND_BELOW_CHARS {
        if let Some(second) = sentences.get(1) {
            let combined_len = first_len + 1 + TextUtils::char_len(second);
            if combined_len <= SHORT_SUMMARY_MAX_CHARS {
                summary.push(' ');
                summary.push_str(second);
            } else {
                let room = SHORT_CUT_CHARS.saturating_sub(first_len + 1);
                if room > SHORT_MIN_CONTINUATION_CHARS {
                    let continuation = TextUtils::truncate_at_word_boundary(second, room);
                    summary.push(' ');
                    summary.push_str(continuation);
                    summary.push_str(ELLIPSIS);
                }
            }
        }
    }

    summary
}

/// A summary of at most [`MEDIUM_SUMMARY_MAX_CHARS`] chars: whole leading
/// sentences up to a 300-char budget, then a bracketed list of technical
/// elements found in the part that did not fit.
pub fn summary_medium(text: &str) -> String {
    if TextUtils::char_len(text) <= MEDIUM_SUMMARY_MAX_CHARS {
        return text.to_string();
    }

    let fragments = TextUtils::split_fragments(text, MEDIUM_TERMINATORS);
    let mut summary = String::new();
    let mut summary_len = 0;
    let mut consumed = 0;

    for fragment in fragments
        .iter()
        .filter(|f| TextUtils::char_len(f.text) > MEDIUM_MIN_SENTENCE_CHARS)
    {
        let piece = sentence_with_terminator(fragment, summary.is_empty());
        let piece_len = TextUtils::char_len(&piece);
        if summary_len + piece_len > MEDIUM_SENTENCE_BUDGET {
            break;
        }
        summary.push_str(&piece);
        summary_len += piece_len;
        consumed = fragment.end;
    }

    if summary.is_empty() {
        return with_ellipsis(TextUtils::take_chars(text, MEDIUM_CUT_CHARS));
    }

    let highlights = highlight_terms(&text[consumed..]);
    if !highlights.is_empty() && summary_len < MEDIUM_ADDENDUM_BELOW_CHARS {
        let addendum = format!(
            " [Technical elements: {}]",
            highlights
                .iter()
                .take(MEDIUM_ADDENDUM_TERMS)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        );
        if summary_len + TextUtils::char_len(&addendum) <= MEDIUM_SUMMARY_MAX_CHARS {
            summary.push_str(&addendum);
        }
    }

    summary
}

/// Re-attach the sentence's own terminator; ASCII punctuation gets a leading
/// space between sentences, full-width punctuation does not.
fn sentence_with_terminator(fragment: &Fragment<'_>, first: bool) -> String {
    let terminator = fragment.terminator.unwrap_or('.');
    let separator = if first || !terminator.is_ascii() { "" } else { " " };
    format!("{}{}{}", separator, fragment.text, terminator)
}

fn highlight_terms(remaining: &str) -> Vec<String> {
    let mut terms = TermCollector::new(usize::MAX);

    for pattern in [&*CAMEL_CASE, &*ACRONYM, &*DOTTED_TOKEN] {
        for m in pattern.find_iter(remaining).take(MEDIUM_MATCHES_PER_PATTERN) {
            terms.push(m.as_str());
        }
    }
    for term in HIGHLIGHT_VOCABULARY.find_iter(remaining).take(MEDIUM_MATCHES_PER_PATTERN) {
        terms.push(term);
    }
    for m in HIGHLIGHT_JA_TERMS.find_iter(remaining).take(MEDIUM_MATCHES_PER_PATTERN) {
        terms.push(m.as_str());
    }

    terms.into_vec()
}

fn with_ellipsis(text: &str) -> String {
    format!("{}{}", text, ELLIPSIS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn len(s: &str) -> usize {
        TextUtils::char_len(s)
    }

    #[test]
    fn test_short_text_is_returned_unchanged() {
        let text = "A compact message that already fits.";
        assert_eq!(summary_short(text), text);
        assert_eq!(summary_medium(text), text);

        let exact = "x".repeat(SHORT_SUMMARY_MAX_CHARS);
        assert_eq!(summary_short(&exact), exact);
    }

    #[test]
    fn test_short_summary_takes_first_meaningful_sentence() {
        let first = "The connection pool needs to be resized for the new traffic pattern we measured last week";
        let text = format!("Hi. {}. {}", first, "Filler sentence that keeps going. ".repeat(10));
        assert_eq!(summary_short(&text), first);
    }

    #[test]
    fn test_short_summary_appends_second_sentence_when_first_is_brief() {
        let text = format!(
            "Deploy the service on Friday. Then monitor the error budget closely. {}",
            "More detail follows here. ".repeat(10)
        );
        assert_eq!(
            summary_short(&text),
            "Deploy the service on Friday Then monitor the error budget closely"
        );
    }

    #[test]
    fn test_short_summary_partial_continuation_is_word_bounded() {
        let second = "word ".repeat(40);
        let text = format!("Deploy the service on Friday night. {}. {}", second.trim(), "tail ".repeat(20));
        let summary = summary_short(&text);

        assert!(summary.starts_with("Deploy the service on Friday night word"));
        assert!(summary.ends_with("word..."));
        assert!(len(&summary) <= SHORT_SUMMARY_MAX_CHARS);
    }

    #[test]
    fn test_short_summary_long_first_sentence_is_cut_at_word() {
        let sentence = "alpha ".repeat(40);
        let text = format!("{}.", sentence.trim());
        let summary = summary_short(&text);

        assert!(summary.ends_with("alpha..."));
        assert!(len(&summary) <= SHORT_SUMMARY_MAX_CHARS);
    }

    #[test]
    fn test_short_summary_without_sentences_falls_back_to_word_cut() {
        // every fragment is too short to count as a sentence
        let text = "ok. ".repeat(60);
        let summary = summary_short(&text);
        assert!(summary.starts_with("ok. ok."));
        assert!(summary.ends_with("ok...."));
        assert!(len(&summary) <= SHORT_SUMMARY_MAX_CHARS);
    }

    #[test]
    fn test_short_summary_japanese() {
        let text = "Azure/Terraformインフラ実装について、大塚商会様向けのPostgreSQL Flexible Serverの設定でパフォーマンス最適化を行いたいです。\
            具体的には、以下の点について検討したいです：1. 接続プール設定の最適化、2. インデックス戦略の見直し、3. Docker統合時のメモリ管理、4. コスト最適化のためのリソース配分調整。\
            これらの技術課題を体系的に解決していくための実装ロードマップを教えてください。";
        let summary = summary_short(text);
        assert!(summary.starts_with("Azure/Terraformインフラ実装について"));
        assert!(len(&summary) <= SHORT_SUMMARY_MAX_CHARS);
    }

    #[test]
    fn test_medium_summary_keeps_whole_sentences_and_terminators() {
        let sentences: Vec<String> = (0..20)
            .map(|i| format!("Sentence number {} explains one more detail", i))
            .collect();
        let text = sentences.join(". ") + ".";
        let summary = summary_medium(&text);

        assert!(summary.starts_with("Sentence number 0 explains one more detail. Sentence number 1"));
        assert!(len(&summary) <= MEDIUM_SUMMARY_MAX_CHARS);
        assert!(!summary.contains("[Technical elements"));
    }

    #[test]
    fn test_medium_summary_adds_technical_addendum_from_tail() {
        let lead: String = (0..8)
            .map(|i| format!("Lead sentence {} describes the plan. ", i))
            .collect();
        let text = format!("{}Later we migrate Redis to PostgreSQL with Terraform and Docker.", lead.repeat(2));
        let summary = summary_medium(&text);

        assert!(summary.contains(" [Technical elements: "), "{}", summary);
        assert!(summary.contains("PostgreSQL"));
        assert!(len(&summary) <= MEDIUM_SUMMARY_MAX_CHARS);
    }

    #[test]
    fn test_medium_summary_falls_back_to_hard_cut() {
        let text = "x".repeat(1000);
        let summary = summary_medium(&text);
        assert_eq!(len(&summary), MEDIUM_SUMMARY_MAX_CHARS);
        assert!(summary.ends_with(ELLIPSIS));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn short_summary_is_bounded(text in "[a-zA-Z .。!?\\n日本語]{0,600}") {
                let summary = summary_short(&text);
                prop_assert!(len(&summary) <= SHORT_SUMMARY_MAX_CHARS + ELLIPSIS.len());
                if len(&text) <= SHORT_SUMMARY_MAX_CHARS {
                    prop_assert_eq!(summary, text);
                }
            }

            #[test]
            fn medium_summary_is_bounded(text in "[a-zA-Z .。!?\\n日本語]{0,1200}") {
                let summary = summary_medium(&text);
                prop_assert!(len(&summary) <= MEDIUM_SUMMARY_MAX_CHARS + ELLIPSIS.len());
                if len(&text) <= MEDIUM_SUMMARY_MAX_CHARS {
                    prop_assert_eq!(summary, text);
                }
            }
        }
    }
}
