// Presentation of a ContextView for a reasoning client

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use super::assembler::ContextView;
use crate::error::MemoryResult;
use crate::utils::TextUtils;

const NARRATIVE_TOPICS: usize = 5;
const NARRATIVE_TECH_TERMS: usize = 5;
const NARRATIVE_INSIGHTS: usize = 3;
const NARRATIVE_ACTIONS: usize = 2;
const NARRATIVE_USER_MESSAGES: usize = 3;
const NARRATIVE_KEY_POINTS: usize = 2;
const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextFormat {
    #[default]
    Narrative,
    Structured,
}

impl From<&str> for ContextFormat {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "structured" | "json" => ContextFormat::Structured,
            _ => ContextFormat::Narrative,
        }
    }
}

/// Markdown-flavoured prose summary of the view.
pub fn render_narrative(view: &ContextView) -> String {
    let mut lines = vec![
        "## Conversation summary".to_string(),
        format!("Total messages: {}", view.total_messages),
    ];
    if view.compression_stats.total_bytes_saved > 0 {
        lines.push(format!(
            "Compression: {} bytes saved",
            view.compression_stats.total_bytes_saved
        ));
    }

    if !view.frequent_topics.is_empty() {
        lines.push("\n### Frequent topics".to_string());
        lines.extend(
            view.frequent_topics
                .iter()
                .take(NARRATIVE_TOPICS)
                .map(|topic| format!("- {} ({}x)", topic.term, topic.count)),
        );
    }

    if !view.technical_terms.is_empty() {
        lines.push("\n### Technical terms".to_string());
        lines.extend(
            view.technical_terms
                .iter()
                .take(NARRATIVE_TECH_TERMS)
                .map(|term| format!("- {} ({}x)", term.term, term.count)),
        );
    }

    if !view.key_insights.is_empty() {
        lines.push("\n### Key insights".to_string());
        for insight in view.key_insights.iter().take(NARRATIVE_INSIGHTS) {
            let text = if insight.summary.is_empty() {
                TextUtils::preview(&insight.content, PREVIEW_CHARS)
            } else {
                Cow::Borrowed(insight.summary.as_str())
            };
            lines.push(format!("- [{}] {}", insight.insight_type, text));
            lines.extend(
                insight
                    .actionable_items
                    .iter()
                    .take(NARRATIVE_ACTIONS)
                    .map(|action| format!("  - Action: {}", action)),
            );
        }
    }

    let mut recent_user = view
        .recent_messages
        .iter()
        .filter(|m| m.role.is_user())
        .take(NARRATIVE_USER_MESSAGES)
        .peekable();
    if recent_user.peek().is_some() {
        lines.push("\n### Recent user interests".to_string());
        for message in recent_user {
            lines.push(format!("- {}", TextUtils::preview(&message.content, PREVIEW_CHARS)));
            lines.extend(
                message
                    .key_points
                    .iter()
                    .flatten()
                    .take(NARRATIVE_KEY_POINTS)
                    .map(|point| format!("  - {}", point)),
            );
        }
    }

    lines.join("\n")
}

/// Pretty-printed JSON of the whole view.
pub fn render_structured(view: &ContextView) -> MemoryResult<String> {
    Ok(serde_json::to_string_pretty(view)?)
}
