//! Reversible zlib compression with a printable (base64) encoding

use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use tracing::warn;

use crate::error::{MemoryError, MemoryResult};

/// Compress `text` and report `compressed bytes / original bytes`.
///
/// The ratio is clamped to 1.0: tiny inputs whose zlib framing outweighs the
/// payload are reported as "no saving", never as growth. Empty input yields an
/// empty blob and a ratio of 1.0.
pub fn compress(text: &str) -> (String, f64) {
    if text.is_empty() {
        return (String::new(), 1.0);
    }

    let original = text.as_bytes();
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(original.len() / 2), Compression::default());
    let compressed = match encoder.write_all(original).and_then(|_| encoder.finish()) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("zlib compression failed: {}", e);
            return (String::new(), 1.0);
        }
    };

    let ratio = (compressed.len() as f64 / original.len() as f64).min(1.0);
    (STANDARD.encode(compressed), ratio)
}

/// Decode a blob produced by [`compress`], surfacing the reason on failure.
pub fn try_decompress(encoded: &str) -> MemoryResult<String> {
    if encoded.is_empty() {
        return Ok(String::new());
    }

    let compressed = STANDARD
        .decode(encoded.trim())
        .map_err(|e| MemoryError::Decode(format!("invalid base64: {}", e)))?;

    let mut decoder = ZlibDecoder::new(compressed.as_slice());
    let mut bytes = Vec::new();
    decoder
        .read_to_end(&mut bytes)
        .map_err(|e| MemoryError::Decode(format!("invalid zlib stream: {}", e)))?;

    String::from_utf8(bytes).map_err(|e| MemoryError::Decode(format!("invalid UTF-8: {}", e)))
}

/// Decode a blob produced by [`compress`]; corrupt or foreign input yields an
/// empty string so callers can fall back to the stored plaintext.
pub fn decompress(encoded: &str) -> String {
    try_decompress(encoded).unwrap_or_else(|e| {
        warn!("Decompression failed: {}", e);
        String::new()
    })
}
