//! Lexical extraction of key points and technical vocabulary.
//!
//! Pure pattern matching: no state, no models. Output order follows pattern
//! order then text order, so the same input always yields the same lists.

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;
use regex::Regex;

use crate::utils::TextUtils;

/// Upper bound on [`key_points`] output.
pub const MAX_KEY_POINTS: usize = 8;
/// Upper bound on [`technical_terms`] output.
pub const MAX_TECHNICAL_TERMS: usize = 12;

const MAX_NUMBERED_ITEMS: usize = 5;
const MAX_ITEMS_PER_BULLET: usize = 3;
const KEY_SENTENCE_MIN_CHARS: usize = 10;
const KEY_SENTENCE_MAX_CHARS: usize = 120;

// Latin terms sit directly against kana/kanji ("Docker統合"), which a Unicode
// `\b` treats as one word.
const ASCII_BOUNDARY: &str = r"(?-u:\b)";

const KEY_SENTENCE_TERMINATORS: &[char] = &['.', '。', '!', '！'];

const JA_KEY_SENTENCE_WORDS: &[&str] = &[
    "実装", "解決", "課題", "改善", "最適化", "設計", "エラー", "修正",
    "構築", "開発", "導入", "設定", "統合", "デプロイ", "システム",
    "データベース", "API", "フレームワーク", "インフラ", "セキュリティ",
];

const PROTOCOL_TERMS: &[&str] = &[
    "API", "SDK", "CLI", "GPU", "CPU", "RAM", "SSD", "HDD", "HTTP", "HTTPS",
    "TCP", "UDP", "SSL", "TLS", "JWT",
];
const DATASTORE_TERMS: &[&str] = &[
    "Docker", "Kubernetes", "Redis", "PostgreSQL", "MySQL", "MongoDB", "SQLite", "MariaDB",
];
const CLOUD_TERMS: &[&str] = &[
    "AWS", "Azure", "GCP", "GoogleCloud", "Terraform", "Ansible", "Jenkins", "GitHub", "GitLab",
];
const FRAMEWORK_TERMS: &[&str] = &[
    "React", "Vue", "Angular", "FastAPI", "Django", "Flask", "Spring", "Express", "Laravel",
];
const LANGUAGE_TERMS: &[&str] = &[
    "Node.js", "Python", "JavaScript", "TypeScript", "Java", "C++", "Rust",
];
const PLATFORM_TERMS: &[&str] = &["Linux", "Ubuntu", "CentOS", "Container", "Microservice"];

lazy_static! {
    static ref NUMBERED_ITEM: Regex =
        Regex::new(r"(?m)^[ \t]*[0-9]+\.[ \t]*([^.。\n]+[.。]?)").unwrap();
    static ref BULLET_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?m)^[ \t]*•[ \t]*([^.。\n]+)").unwrap(),
        Regex::new(r"(?m)^[ \t]*-[ \t]+([^.。\n]+)").unwrap(),
        Regex::new(r"(?m)^[ \t]*\*[ \t]+([^.。\n]+)").unwrap(),
    ];
    static ref EN_KEY_SENTENCE: Regex = Regex::new(
        r"(?i)(?-u:\b)(?:implement|resolv|improv|optimi[sz]|design|error|bug|fix|deploy|configur|integrat|refactor|migrat|secur|database|framework|infrastructure)\w*"
    ).unwrap();

    pub(crate) static ref CAMEL_CASE: Regex =
        Regex::new(r"(?-u:\b)[A-Z][a-z]*[A-Z][a-zA-Z]*(?-u:\b)").unwrap();
    pub(crate) static ref ACRONYM: Regex = Regex::new(r"(?-u:\b)[A-Z]{2,}(?-u:\b)").unwrap();
    static ref SOURCE_FILE: Regex = Regex::new(
        r"(?-u:\b)[A-Za-z0-9_]+\.(?:js|py|java|go|rs|cpp|hpp|ts|jsx|tsx)(?-u:\b)"
    ).unwrap();
    // "Go" only as a capitalised word; lower-case "go" is ordinary English.
    static ref GO_LANGUAGE: Regex = Regex::new(r"(?-u:\b)Go(?-u:\b)").unwrap();
    static ref TECH_VOCABULARY: Vec<Vocabulary> = vec![
        Vocabulary::new(PROTOCOL_TERMS),
        Vocabulary::new(DATASTORE_TERMS),
        Vocabulary::new(CLOUD_TERMS),
        Vocabulary::new(FRAMEWORK_TERMS),
        Vocabulary::new(LANGUAGE_TERMS),
        Vocabulary::new(PLATFORM_TERMS),
    ];
    static ref JA_TECH_TERMS: Regex = Regex::new(
        "システム|データベース|サーバー|クライアント|フレームワーク|ライブラリ|アルゴリズム|アーキテクチャ|インフラ|セキュリティ|最適化"
    ).unwrap();
}

/// A closed, case-insensitive word list that reports matches in canonical spelling.
pub(crate) struct Vocabulary {
    regex: Regex,
    canonical: HashMap<String, &'static str>,
}

impl Vocabulary {
    pub(crate) fn new(terms: &[&'static str]) -> Self {
        let mut sorted: Vec<&'static str> = terms.to_vec();
        sorted.sort_by_key(|t| std::cmp::Reverse(t.len()));

        let alternation = sorted
            .iter()
            .map(|term| {
                let starts_word = term.chars().next().is_some_and(char::is_alphanumeric);
                let ends_word = term.chars().last().is_some_and(char::is_alphanumeric);
                format!(
                    "{}{}{}",
                    if starts_word { ASCII_BOUNDARY } else { "" },
                    regex::escape(term),
                    if ends_word { ASCII_BOUNDARY } else { "" },
                )
            })
            .collect::<Vec<_>>()
            .join("|");

        Self {
            regex: Regex::new(&format!("(?i)(?:{})", alternation)).unwrap(),
            canonical: terms.iter().map(|t| (t.to_lowercase(), *t)).collect(),
        }
    }

    pub(crate) fn find_iter<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'static str> + 'a {
        self.regex
            .find_iter(text)
            .filter_map(move |m| self.canonical.get(&m.as_str().to_lowercase()).copied())
    }
}

/// Ordered, capped, case-insensitively deduplicated term list.
pub(crate) struct TermCollector {
    terms: Vec<String>,
    seen: HashSet<String>,
    cap: usize,
}

impl TermCollector {
    pub(crate) fn new(cap: usize) -> Self {
        Self {
            terms: Vec::new(),
            seen: HashSet::new(),
            cap,
        }
    }

    /// Returns `false` once the collector is full.
    pub(crate) fn push(&mut self, term: &str) -> bool {
        if self.is_full() {
            return false;
        }
        let term = term.trim();
        if !term.is_empty() && self.seen.insert(term.to_lowercase()) {
            self.terms.push(term.to_string());
        }
        !self.is_full()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.terms.len() >= self.cap
    }

    pub(crate) fn into_vec(self) -> Vec<String> {
        self.terms
    }
}

/// Salient statements: numbered items, bullets, and sentences that mention
/// engineering vocabulary. At most [`MAX_KEY_POINTS`], deduplicated.
pub fn key_points(text: &str) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();

    candidates.extend(
        NUMBERED_ITEM
            .captures_iter(text)
            .take(MAX_NUMBERED_ITEMS)
            .map(|c| TextUtils::normalize_whitespace(&c[1]).into_owned()),
    );

    for pattern in BULLET_PATTERNS.iter() {
        candidates.extend(
            pattern
                .captures_iter(text)
                .take(MAX_ITEMS_PER_BULLET)
                .map(|c| TextUtils::normalize_whitespace(&c[1]).into_owned()),
        );
    }

    for fragment in TextUtils::split_fragments(text, KEY_SENTENCE_TERMINATORS) {
        let sentence = fragment.text;
        let len = TextUtils::char_len(sentence);
        if len <= KEY_SENTENCE_MIN_CHARS || len >= KEY_SENTENCE_MAX_CHARS {
            continue;
        }
        if mentions_key_vocabulary(sentence) {
            candidates.push(sentence.to_string());
        }
    }

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|point| !point.is_empty() && seen.insert(point.clone()))
        .take(MAX_KEY_POINTS)
        .collect()
}

fn mentions_key_vocabulary(sentence: &str) -> bool {
    JA_KEY_SENTENCE_WORDS.iter().any(|word| sentence.contains(word))
        || EN_KEY_SENTENCE.is_match(sentence)
}

/// Domain vocabulary found in `text`: known platforms/tools/languages,
/// CamelCase identifiers, acronyms, source file names and Japanese domain nouns.
/// At most [`MAX_TECHNICAL_TERMS`], deduplicated ignoring case.
/// Vocabulary matches are collected first and keep their canonical spelling.
pub fn technical_terms(text: &str) -> Vec<String> {
    let mut terms = TermCollector::new(MAX_TECHNICAL_TERMS);

    for vocabulary in TECH_VOCABULARY.iter() {
        for term in vocabulary.find_iter(text) {
            if !terms.push(term) {
                return terms.into_vec();
            }
        }
    }

    let structural = CAMEL_CASE
        .find_iter(text)
        .chain(ACRONYM.find_iter(text))
        .chain(SOURCE_FILE.find_iter(text))
        .chain(GO_LANGUAGE.find_iter(text))
        .map(|m| m.as_str());

    for term in structural {
        if !terms.push(term) {
            return terms.into_vec();
        }
    }

    for m in JA_TECH_TERMS.find_iter(text) {
        if !terms.push(m.as_str()) {
            break;
        }
    }

    terms.into_vec()
}
