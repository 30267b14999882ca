//! Utilities module - Common text primitives used by the processing pipeline

pub mod text_utils;

// Re-export commonly used utilities
pub use text_utils::{Fragment, TextUtils, ELLIPSIS};
