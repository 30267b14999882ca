//! Context engine - assembles detail-graded conversation context for a downstream reasoning client
pub mod assembler;
pub mod render;

pub use assembler::{
    CompressionStats, ContextAssembler, ContextMessage, ContextView, DetailLevel, Rendition,
    TermCount,
};
pub use render::{render_narrative, render_structured, ContextFormat};
