//! Deterministic content pipeline: compression, layered summaries and
//! lexical extraction, run once per stored item.

pub mod compressor;
pub mod extractor;
pub mod summarizer;

pub use compressor::{compress, decompress, try_decompress};
pub use extractor::{key_points, technical_terms, MAX_KEY_POINTS, MAX_TECHNICAL_TERMS};
pub use summarizer::{
    summary_medium, summary_short, MEDIUM_SUMMARY_MAX_CHARS, SHORT_SUMMARY_MAX_CHARS,
};

use serde::{Deserialize, Serialize};

use crate::utils::TextUtils;

/// Everything derived from one piece of raw text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedContent {
    pub compressed_content: String,
    pub compression_ratio: f64,
    pub summary_short: String,
    pub summary_medium: String,
    pub key_points: Vec<String>,
    pub technical_terms: Vec<String>,
    /// Hex BLAKE3 of the raw text.
    pub context_hash: String,
    /// Length of the raw text in chars.
    pub content_length: usize,
}

/// Stateless entry point for the pipeline.
pub struct ContentProcessor;

impl ContentProcessor {
    pub fn process(text: &str) -> ProcessedContent {
        let (compressed_content, compression_ratio) = compress(text);

        ProcessedContent {
            compressed_content,
            compression_ratio,
            summary_short: summary_short(text),
            summary_medium: summary_medium(text),
            key_points: key_points(text),
            technical_terms: technical_terms(text),
            context_hash: Self::fingerprint(text),
            content_length: TextUtils::char_len(text),
        }
    }

    pub fn fingerprint(text: &str) -> String {
        blake3::hash(text.as_bytes()).to_hex().to_string()
    }
}
