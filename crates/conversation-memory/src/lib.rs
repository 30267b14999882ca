// conversation-memory/src/lib.rs

pub mod config;
pub mod context_engine;
pub mod error;
pub mod memory_db;
pub mod processing;
pub mod telemetry;
pub mod utils;

// Public API exports
pub use config::Config;
pub use error::{MemoryError, MemoryResult};
pub use processing::{ContentProcessor, ProcessedContent};

pub use memory_db::{
    Analytics, ConversationMessage, ConversationStore, ImpactLevel, Insight, InsightParams,
    MemoryDatabase, MessageParams, MessageSummary, MessageView, MigrationReport, Role, SearchScope,
};

pub use context_engine::{
    ContextAssembler, ContextFormat, ContextMessage, ContextView, DetailLevel, Rendition,
};
