//! Builds a detail-graded view of recent conversation for a downstream client

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::render::{render_narrative, render_structured, ContextFormat};
use crate::error::MemoryResult;
use crate::memory_db::{ConversationMessage, Insight, MemoryDatabase, MessageSummary, Role};

const ADAPTIVE_FULL_BELOW: usize = 5;
const ADAPTIVE_MEDIUM_BELOW: usize = 20;
const EXTRACTS_BELOW: usize = 15;

const TOP_TOPICS: usize = 10;
const TOP_KEYWORDS: usize = 15;
const TOP_TECHNICAL_TERMS: usize = 10;
const KEY_INSIGHTS: usize = 5;

/// How much of each message a context surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Short,
    Medium,
    Full,
    /// Full text for the newest messages, summaries further back.
    #[default]
    Adaptive,
}

impl DetailLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetailLevel::Short => "short",
            DetailLevel::Medium => "medium",
            DetailLevel::Full => "full",
            DetailLevel::Adaptive => "adaptive",
        }
    }

    /// Rendition of the message at `position` (0 = most recent).
    pub fn rendition_for(self, position: usize) -> Rendition {
        match self {
            DetailLevel::Short => Rendition::Short,
            DetailLevel::Medium => Rendition::Medium,
            DetailLevel::Full => Rendition::Full,
            DetailLevel::Adaptive if position < ADAPTIVE_FULL_BELOW => Rendition::Full,
            DetailLevel::Adaptive if position < ADAPTIVE_MEDIUM_BELOW => Rendition::Medium,
            DetailLevel::Adaptive => Rendition::Short,
        }
    }

    /// Whether key points and technical terms accompany the message at `position`.
    pub fn attaches_extracts(self, position: usize) -> bool {
        matches!(self, DetailLevel::Full | DetailLevel::Adaptive) && position < EXTRACTS_BELOW
    }
}

impl From<&str> for DetailLevel {
    /// Unknown levels fall back to `Medium`.
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "short" => DetailLevel::Short,
            "full" => DetailLevel::Full,
            "adaptive" => DetailLevel::Adaptive,
            _ => DetailLevel::Medium,
        }
    }
}

impl fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which stored text stands in for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rendition {
    Full,
    Medium,
    Short,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub rendition: Rendition,
    pub timestamp: DateTime<Utc>,
    pub topics: Vec<String>,
    pub keywords: Vec<String>,
    pub content_length: usize,
    pub compression_ratio: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_points: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technical_terms: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermCount {
    pub term: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompressionStats {
    pub total_bytes_saved: i64,
    pub detail_level_used: DetailLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextView {
    pub recent_messages: Vec<ContextMessage>,
    pub frequent_topics: Vec<TermCount>,
    pub frequent_keywords: Vec<TermCount>,
    pub technical_terms: Vec<TermCount>,
    pub key_insights: Vec<Insight>,
    pub total_messages: usize,
    pub compression_stats: CompressionStats,
    pub context_generated_at: DateTime<Utc>,
}

/// Reads recent messages through the store and grades their detail.
pub struct ContextAssembler {
    database: Arc<MemoryDatabase>,
}

impl ContextAssembler {
    pub fn new(database: Arc<MemoryDatabase>) -> Self {
        Self { database }
    }

    /// Context over the `limit` most recent messages.
    ///
    /// Never fails: backend errors are logged and leave the affected part of
    /// the view empty. The chosen text is never cut beyond what the stored
    /// summaries already are.
    pub fn get_context(&self, limit: usize, detail: DetailLevel) -> ContextView {
        let store = &self.database.conversations;

        let ids = store.recent_message_ids(limit).unwrap_or_else(|e| {
            warn!("Failed to read the timeline: {}", e);
            Vec::new()
        });

        let mut recent_messages = Vec::with_capacity(ids.len());
        let mut topics = FrequencyTable::default();
        let mut keywords = FrequencyTable::default();
        let mut technical_terms = FrequencyTable::default();

        for (position, id) in ids.iter().enumerate() {
            let message = match store.get_message(id) {
                Ok(Some(message)) => message,
                Ok(None) => {
                    debug!("Timeline entry {} has no record", id);
                    continue;
                }
                Err(e) => {
                    warn!("Skipping unreadable message {}: {}", id, e);
                    continue;
                }
            };
            let summary = store.get_message_summary(id).unwrap_or_else(|e| {
                warn!("Unreadable summary for {}: {}", id, e);
                None
            });

            topics.add_all(&message.topics);
            keywords.add_all(&message.keywords);
            technical_terms.add_all(&message.technical_terms);

            recent_messages.push(context_message(message, summary, detail, position));
        }

        let key_insights = store.get_top_insights(KEY_INSIGHTS).unwrap_or_else(|e| {
            warn!("Failed to read top insights: {}", e);
            Vec::new()
        });
        let total_messages = store.message_count().unwrap_or_else(|e| {
            warn!("Failed to count messages: {}", e);
            0
        });
        let total_bytes_saved = store.compression_bytes_saved().unwrap_or_else(|e| {
            warn!("Failed to read compression counter: {}", e);
            0
        });

        debug!(
            "Assembled context with {} messages at {} detail",
            recent_messages.len(),
            detail
        );

        ContextView {
            recent_messages,
            frequent_topics: topics.top(TOP_TOPICS),
            frequent_keywords: keywords.top(TOP_KEYWORDS),
            technical_terms: technical_terms.top(TOP_TECHNICAL_TERMS),
            key_insights,
            total_messages,
            compression_stats: CompressionStats {
                total_bytes_saved,
                detail_level_used: detail,
            },
            context_generated_at: Utc::now(),
        }
    }

    /// [`get_context`](Self::get_context) rendered for a reasoning client.
    pub fn export(&self, format: ContextFormat, limit: usize, detail: DetailLevel) -> MemoryResult<String> {
        let view = self.get_context(limit, detail);
        match format {
            ContextFormat::Narrative => Ok(render_narrative(&view)),
            ContextFormat::Structured => render_structured(&view),
        }
    }
}

fn context_message(
    message: ConversationMessage,
    summary: Option<MessageSummary>,
    detail: DetailLevel,
    position: usize,
) -> ContextMessage {
    let rendition = detail.rendition_for(position);
    let content = select_content(&message, summary.as_ref(), rendition).to_string();

    let (key_points, technical_terms) = if detail.attaches_extracts(position) {
        match &summary {
            Some(s) => (Some(s.key_points.clone()), Some(s.technical_terms.clone())),
            None => (Some(message.key_points.clone()), Some(message.technical_terms.clone())),
        }
    } else {
        (None, None)
    };

    ContextMessage {
        id: message.id,
        role: message.role,
        content,
        rendition,
        timestamp: message.timestamp,
        topics: message.topics,
        keywords: message.keywords,
        content_length: message.content_length,
        compression_ratio: message.compression_ratio,
        key_points,
        technical_terms,
    }
}

/// Summary hash first, then the message's own summary field, then the full text.
fn select_content<'a>(
    message: &'a ConversationMessage,
    summary: Option<&'a MessageSummary>,
    rendition: Rendition,
) -> &'a str {
    let (from_hash, from_message) = match rendition {
        Rendition::Full => return &message.content,
        Rendition::Medium => (summary.map(|s| s.medium.as_str()), message.summary_medium.as_str()),
        Rendition::Short => (summary.map(|s| s.short.as_str()), message.summary_short.as_str()),
    };

    [from_hash, Some(from_message)]
        .into_iter()
        .flatten()
        .find(|text| !text.is_empty())
        .unwrap_or(&message.content)
}

#[derive(Default)]
struct FrequencyTable(HashMap<String, usize>);

impl FrequencyTable {
    fn add_all(&mut self, terms: &[String]) {
        for term in terms {
            *self.0.entry(term.clone()).or_insert(0) += 1;
        }
    }

    /// Most frequent first; ties in alphabetical order.
    fn top(self, n: usize) -> Vec<TermCount> {
        let mut counts: Vec<TermCount> = self
            .0
            .into_iter()
            .map(|(term, count)| TermCount { term, count })
            .collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.term.cmp(&b.term)));
        counts.truncate(n);
        counts
    }
}
