use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::MemoryResult;
use crate::memory_db::kv::{KvBatch, KvStore};
use crate::memory_db::schema::*;
use crate::processing::{summary_short, ContentProcessor};

/// Input of [`ConversationStore::save_message`].
#[derive(Debug, Clone, Copy)]
pub struct MessageParams<'a> {
    pub role: &'a str,
    pub content: &'a str,
    pub topics: &'a [String],
    pub keywords: &'a [String],
    /// `None` files the message under today's session.
    pub session_id: Option<&'a str>,
}

/// Input of [`ConversationStore::save_insight`].
#[derive(Debug, Clone, Copy)]
pub struct InsightParams<'a> {
    pub insight_type: &'a str,
    pub content: &'a str,
    pub source_messages: &'a [String],
    pub relevance_score: f64,
    pub business_area: &'a str,
    /// Generated from `content` when absent or blank.
    pub summary: Option<&'a str>,
    pub impact_level: ImpactLevel,
    pub actionable_items: &'a [String],
}

/// Which index families a search consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchScope {
    #[default]
    All,
    Topics,
    Technical,
}

impl SearchScope {
    fn includes_topics(self) -> bool {
        matches!(self, SearchScope::All | SearchScope::Topics)
    }

    fn includes_technical(self) -> bool {
        matches!(self, SearchScope::All | SearchScope::Technical)
    }
}

impl From<&str> for SearchScope {
    /// Unknown scopes search everything.
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "topics" => SearchScope::Topics,
            "technical" => SearchScope::Technical,
            _ => SearchScope::All,
        }
    }
}

/// Writes messages and insights under their primary keys and every secondary
/// index in one batch, and serves the read paths over those indexes.
#[derive(Clone)]
pub struct ConversationStore {
    kv: KvStore,
    session_ttl: Duration,
}

impl ConversationStore {
    pub fn new(kv: KvStore, session_ttl: Duration) -> Self {
        Self { kv, session_ttl }
    }

    pub fn save_message(&self, params: MessageParams<'_>) -> MemoryResult<String> {
        let session_id = match params.session_id {
            Some(session_id) => session_id.to_string(),
            None => self.get_or_create_session()?,
        };

        let processed = ContentProcessor::process(params.content);
        let message = ConversationMessage {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            role: Role::from(params.role),
            content: params.content.to_string(),
            compressed_content: processed.compressed_content,
            summary_short: processed.summary_short,
            summary_medium: processed.summary_medium,
            key_points: processed.key_points,
            technical_terms: processed.technical_terms,
            topics: params.topics.to_vec(),
            keywords: params.keywords.to_vec(),
            context_hash: processed.context_hash,
            session_id,
            content_length: processed.content_length,
            compression_ratio: processed.compression_ratio,
        };
        let summary = MessageSummary {
            short: message.summary_short.clone(),
            medium: message.summary_medium.clone(),
            key_points: message.key_points.clone(),
            technical_terms: message.technical_terms.clone(),
        };

        let id = &message.id;
        let mut batch = KvBatch::new();
        batch
            .hset(keys::message(id), message.to_record()?)
            .hset(keys::message_summary(id), summary.to_record()?)
            .zadd(keys::TIMELINE, id, message.timeline_score())
            .sadd(IndexKey::Session(&message.session_id).key(), id);

        let tags = non_blank(&message.topics)
            .map(IndexKey::Topic)
            .chain(non_blank(&message.keywords).map(IndexKey::Keyword))
            .chain(non_blank(&message.technical_terms).map(IndexKey::Tech))
            .chain(std::iter::once(IndexKey::Role(message.role.as_str())));
        for index in tags {
            batch.sadd(index.key(), id);
        }

        batch
            .incr_by(keys::TOTAL_MESSAGES, 1)
            .incr_by(keys::daily_messages(session_day(&message.timestamp)), 1);
        let saved = bytes_saved(message.compression_ratio, message.content_length);
        if saved > 0 {
            batch.incr_by(keys::COMPRESSION_SAVED, saved);
        }

        self.kv.execute(&batch)?;

        info!(
            "Message {} saved with {:.2} compression ratio",
            message.id, message.compression_ratio
        );
        Ok(message.id)
    }

    /// Save a user turn and the assistant's reply under one session.
    pub fn record_exchange(
        &self,
        user_message: &str,
        assistant_response: &str,
        topics: &[String],
        keywords: &[String],
    ) -> MemoryResult<(String, String)> {
        let session_id = self.get_or_create_session()?;
        let user = MessageParams {
            role: "user",
            content: user_message,
            topics,
            keywords,
            session_id: Some(&session_id),
        };
        let assistant = MessageParams {
            role: "assistant",
            content: assistant_response,
            ..user
        };

        let user_id = self.save_message(user)?;
        let assistant_id = self.save_message(assistant)?;
        Ok((user_id, assistant_id))
    }

    pub fn save_insight(&self, params: InsightParams<'_>) -> MemoryResult<String> {
        let summary = match params.summary.filter(|s| !s.trim().is_empty()) {
            Some(summary) => summary.to_string(),
            None => summary_short(params.content),
        };

        let insight = Insight {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            insight_type: params.insight_type.to_string(),
            content: params.content.to_string(),
            summary,
            relevance_score: clamp_relevance(params.relevance_score),
            business_area: params.business_area.to_string(),
            impact_level: params.impact_level,
            source_messages: params.source_messages.to_vec(),
            actionable_items: params.actionable_items.to_vec(),
        };

        let id = &insight.id;
        let mut batch = KvBatch::new();
        batch
            .hset(keys::insight(id), insight.to_record()?)
            .sadd(IndexKey::InsightType(&insight.insight_type).key(), id)
            .sadd(IndexKey::BusinessArea(&insight.business_area).key(), id)
            .sadd(IndexKey::Impact(insight.impact_level).key(), id)
            .zadd(keys::INSIGHTS_BY_RELEVANCE, id, insight.relevance_score);
        self.kv.execute(&batch)?;

        info!(
            "Insight {} saved ({}, relevance {:.2})",
            insight.id, insight.insight_type, insight.relevance_score
        );
        Ok(insight.id)
    }

    /// Messages tagged with any of `terms`, most recent first.
    ///
    /// Matching ids are ranked by timeline score before being cut to `limit`,
    /// so the result is the `limit` most recent matches.
    pub fn search(&self, terms: &[String], limit: usize, scope: SearchScope) -> MemoryResult<Vec<MessageView>> {
        let mut matches = HashSet::new();
        for term in terms.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            if scope.includes_topics() {
                matches.extend(self.kv.smembers(&IndexKey::Topic(term).key())?);
                matches.extend(self.kv.smembers(&IndexKey::Keyword(term).key())?);
            }
            if scope.includes_technical() {
                matches.extend(self.kv.smembers(&IndexKey::Tech(term).key())?);
            }
        }

        let mut ranked = Vec::with_capacity(matches.len());
        for id in matches {
            let score = self.kv.zscore(keys::TIMELINE, &id)?.unwrap_or(f64::NEG_INFINITY);
            ranked.push((score, id));
        }
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        ranked.truncate(limit);

        let mut results = Vec::with_capacity(ranked.len());
        for (_, id) in ranked {
            match self.message_view(&id) {
                Ok(Some(view)) => results.push(view),
                Ok(None) => debug!("Search hit {} has no record", id),
                Err(e) => warn!("Skipping unreadable message {}: {}", id, e),
            }
        }
        results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        debug!("Search over {} terms returned {} messages", terms.len(), results.len());
        Ok(results)
    }

    /// Up to `limit` insights, most relevant first. Unreadable records are skipped.
    pub fn get_top_insights(&self, limit: usize) -> MemoryResult<Vec<Insight>> {
        let ids = self.kv.zrevrange(keys::INSIGHTS_BY_RELEVANCE, limit)?;
        let mut insights = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get_insight(&id) {
                Ok(Some(insight)) => insights.push(insight),
                Ok(None) => debug!("Ranked insight {} has no record", id),
                Err(e) => warn!("Skipping unreadable insight {}: {}", id, e),
            }
        }
        Ok(insights)
    }

    /// Id of today's session, minting one with the configured lifetime when
    /// none is live.
    ///
    /// Check-then-set is not atomic: two first writers of the day may each
    /// mint an id, and the last write wins the day key.
    pub fn get_or_create_session(&self) -> MemoryResult<String> {
        let day_key = keys::session_day(Utc::now().date_naive());
        if let Some(session_id) = self.kv.get(&day_key)? {
            return Ok(session_id);
        }

        let session_id = Uuid::new_v4().to_string();
        self.kv.set_ex(&day_key, &session_id, self.session_ttl)?;
        info!("Started session {} under {}", session_id, day_key);
        Ok(session_id)
    }

    pub fn get_message(&self, id: &str) -> MemoryResult<Option<ConversationMessage>> {
        let key = keys::message(id);
        let record = self.kv.hgetall(&key)?;
        if record.is_empty() {
            return Ok(None);
        }
        ConversationMessage::from_record(&key, &record).map(Some)
    }

    pub fn get_message_summary(&self, id: &str) -> MemoryResult<Option<MessageSummary>> {
        let key = keys::message_summary(id);
        MessageSummary::from_record(&key, &self.kv.hgetall(&key)?)
    }

    pub fn get_insight(&self, id: &str) -> MemoryResult<Option<Insight>> {
        let key = keys::insight(id);
        let record = self.kv.hgetall(&key)?;
        if record.is_empty() {
            return Ok(None);
        }
        Insight::from_record(&key, &record).map(Some)
    }

    pub fn message_view(&self, id: &str) -> MemoryResult<Option<MessageView>> {
        let Some(message) = self.get_message(id)? else {
            return Ok(None);
        };
        let summary = self.get_message_summary(id)?;
        Ok(Some(MessageView::new(message, summary)))
    }

    /// Ids of the `limit` most recent messages, newest first.
    pub fn recent_message_ids(&self, limit: usize) -> MemoryResult<Vec<String>> {
        self.kv.zrevrange(keys::TIMELINE, limit)
    }

    pub fn session_message_ids(&self, session_id: &str) -> MemoryResult<Vec<String>> {
        self.index_members(IndexKey::Session(session_id))
    }

    pub fn index_members(&self, index: IndexKey<'_>) -> MemoryResult<Vec<String>> {
        self.kv.smembers(&index.key())
    }

    pub fn message_count(&self) -> MemoryResult<usize> {
        self.kv.zcard(keys::TIMELINE)
    }

    pub fn insight_count(&self) -> MemoryResult<usize> {
        self.kv.zcard(keys::INSIGHTS_BY_RELEVANCE)
    }

    pub fn compression_bytes_saved(&self) -> MemoryResult<i64> {
        self.kv.counter(keys::COMPRESSION_SAVED)
    }

    pub fn analytics(&self) -> MemoryResult<Analytics> {
        let now = Utc::now();

        let mut top_topics: Vec<TopicCount> = self
            .kv
            .set_cardinalities(keys::TOPIC_PREFIX)?
            .into_iter()
            .map(|(topic, count)| TopicCount { topic, count })
            .collect();
        top_topics.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.topic.cmp(&b.topic)));
        top_topics.truncate(5);

        Ok(Analytics {
            total_messages: self.message_count()?,
            total_insights: self.insight_count()?,
            messages_counter: self.kv.counter(keys::TOTAL_MESSAGES)?,
            compression_bytes_saved: self.compression_bytes_saved()?,
            messages_today: self.kv.counter(&keys::daily_messages(session_day(&now)))?,
            top_topics,
            last_updated: now,
        })
    }
}

/// Bytes saved by storing `content_length` chars at `ratio`, never negative.
pub fn bytes_saved(ratio: f64, content_length: usize) -> i64 {
    ((1.0 - ratio) * content_length as f64).round().max(0.0) as i64
}

/// Clamp to [0, 1]; NaN counts as irrelevant.
pub fn clamp_relevance(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

fn non_blank(tags: &[String]) -> impl Iterator<Item = &str> {
    tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_db::MemoryDatabase;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn save(store: &ConversationStore, role: &str, content: &str, topics: &[&str]) -> String {
        store
            .save_message(MessageParams {
                role,
                content,
                topics: &strings(topics),
                keywords: &[],
                session_id: None,
            })
            .unwrap()
    }

    fn insight_params<'a>(content: &'a str, relevance_score: f64) -> InsightParams<'a> {
        InsightParams {
            insight_type: "decision",
            content,
            source_messages: &[],
            relevance_score,
            business_area: "infrastructure",
            summary: None,
            impact_level: ImpactLevel::High,
            actionable_items: &[],
        }
    }

    // ===== Saving =====

    #[test]
    fn test_saved_message_is_reachable_through_every_index() {
        let db = MemoryDatabase::new_in_memory().unwrap();
        let store = &db.conversations;

        let id = store
            .save_message(MessageParams {
                role: "user",
                content: "We should move the cache to Redis before launch.",
                topics: &strings(&["X"]),
                keywords: &strings(&["Cache"]),
                session_id: None,
            })
            .unwrap();

        assert_eq!(store.recent_message_ids(10).unwrap(), vec![id.clone()]);
        assert_eq!(store.index_members(IndexKey::Topic("x")).unwrap(), vec![id.clone()]);
        assert_eq!(store.index_members(IndexKey::Keyword("cache")).unwrap(), vec![id.clone()]);
        assert_eq!(store.index_members(IndexKey::Tech("redis")).unwrap(), vec![id.clone()]);
        assert_eq!(store.index_members(IndexKey::Role("user")).unwrap(), vec![id.clone()]);

        let message = store.get_message(&id).unwrap().unwrap();
        assert_eq!(store.session_message_ids(&message.session_id).unwrap(), vec![id.clone()]);
        assert_eq!(message.content, "We should move the cache to Redis before launch.");

        let hits = store.search(&strings(&["X"]), 10, SearchScope::All).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);
    }

    #[test]
    fn test_summary_hash_mirrors_message_fields() {
        let db = MemoryDatabase::new_in_memory().unwrap();
        let store = &db.conversations;
        let content = "1. Enable WAL mode\n2. Raise the busy timeout\n".repeat(20);
        let id = save(store, "assistant", &content, &[]);

        let message = store.get_message(&id).unwrap().unwrap();
        let summary = store.get_message_summary(&id).unwrap().unwrap();
        assert_eq!(summary.short, message.summary_short);
        assert_eq!(summary.medium, message.summary_medium);
        assert_eq!(summary.key_points, message.key_points);
        assert!(!summary.key_points.is_empty());
    }

    #[test]
    fn test_compression_accounting() {
        let db = MemoryDatabase::new_in_memory().unwrap();
        let store = &db.conversations;

        let id = save(store, "user", &"A".repeat(600), &[]);
        let message = store.get_message(&id).unwrap().unwrap();
        assert!(message.compression_ratio < 1.0);

        let expected = bytes_saved(message.compression_ratio, 600);
        assert!(expected > 0);
        assert_eq!(store.compression_bytes_saved().unwrap(), expected);

        // a 3-char message cannot shrink: ratio stays at 1.0 and nothing is counted
        let tiny = save(store, "user", "abc", &[]);
        let tiny = store.get_message(&tiny).unwrap().unwrap();
        assert_eq!(tiny.compression_ratio, 1.0);
        assert_eq!(store.compression_bytes_saved().unwrap(), expected);
    }

    #[test]
    fn test_blank_tags_are_not_indexed() {
        let db = MemoryDatabase::new_in_memory().unwrap();
        let store = &db.conversations;
        save(store, "user", "hello", &["", "  ", "real"]);

        let topics = db.kv.set_cardinalities(keys::TOPIC_PREFIX).unwrap();
        assert_eq!(topics, vec![("real".to_string(), 1)]);
    }

    #[test]
    fn test_record_exchange_shares_a_session() {
        let db = MemoryDatabase::new_in_memory().unwrap();
        let store = &db.conversations;
        let (user_id, assistant_id) = store
            .record_exchange("How do I tune SQLite?", "Enable WAL mode.", &strings(&["sqlite"]), &[])
            .unwrap();

        let user = store.get_message(&user_id).unwrap().unwrap();
        let assistant = store.get_message(&assistant_id).unwrap().unwrap();
        assert_eq!(user.role, Role::User);
        assert_eq!(assistant.role, Role::Assistant);
        assert_eq!(user.session_id, assistant.session_id);
        assert_eq!(store.index_members(IndexKey::Topic("sqlite")).unwrap().len(), 2);
    }

    // ===== Sessions =====

    #[test]
    fn test_session_is_reused_within_its_lifetime() {
        let db = MemoryDatabase::new_in_memory().unwrap();
        let store = &db.conversations;
        let first = store.get_or_create_session().unwrap();
        assert_eq!(store.get_or_create_session().unwrap(), first);

        let a = save(store, "user", "one", &[]);
        let b = save(store, "user", "two", &[]);
        let mut members = store.session_message_ids(&first).unwrap();
        members.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(members, expected);
    }

    #[test]
    fn test_expired_session_mints_a_new_id() {
        let db = MemoryDatabase::new_in_memory().unwrap();
        let store = ConversationStore::new(db.kv.clone(), Duration::ZERO);
        let first = store.get_or_create_session().unwrap();
        let second = store.get_or_create_session().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_explicit_session_id_is_used_verbatim() {
        let db = MemoryDatabase::new_in_memory().unwrap();
        let store = &db.conversations;
        let id = store
            .save_message(MessageParams {
                role: "user",
                content: "pinned",
                topics: &[],
                keywords: &[],
                session_id: Some("project-alpha"),
            })
            .unwrap();

        assert_eq!(store.session_message_ids("project-alpha").unwrap(), vec![id]);
        assert_eq!(db.kv.get(&keys::session_day(Utc::now().date_naive())).unwrap(), None);
    }

    // ===== Search =====

    #[test]
    fn test_search_scope_and_union() {
        let db = MemoryDatabase::new_in_memory().unwrap();
        let store = &db.conversations;
        let tagged = save(store, "user", "plain words only", &["docker"]);
        let detected = save(store, "user", "Deploy it with Docker please", &[]);
        let both = save(store, "user", "Docker again", &["Docker"]);

        let all = store.search(&strings(&["Docker", "docker"]), 10, SearchScope::All).unwrap();
        let ids: HashSet<_> = all.iter().map(|v| v.id.clone()).collect();
        assert_eq!(all.len(), 3);
        assert!(ids.contains(&tagged) && ids.contains(&detected) && ids.contains(&both));

        let topics = store.search(&strings(&["docker"]), 10, SearchScope::Topics).unwrap();
        assert_eq!(topics.len(), 2);
        assert!(topics.iter().all(|v| v.id != detected));

        let technical = store.search(&strings(&["docker"]), 10, SearchScope::Technical).unwrap();
        assert_eq!(technical.len(), 2);
        assert!(technical.iter().all(|v| v.id != tagged));
    }

    #[test]
    fn test_search_returns_most_recent_matches_newest_first() {
        let db = MemoryDatabase::new_in_memory().unwrap();
        let store = &db.conversations;
        let ids: Vec<String> = (0..6)
            .map(|i| save(store, "user", &format!("message {}", i), &["shared"]))
            .collect();

        let hits = store.search(&strings(&["shared"]), 3, SearchScope::All).unwrap();
        let hit_ids: Vec<&str> = hits.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(hit_ids, vec![ids[5].as_str(), ids[4].as_str(), ids[3].as_str()]);
        assert_eq!(hits[0].content, "message 5");
    }

    #[test]
    fn test_search_skips_dangling_and_unreadable_ids() {
        let db = MemoryDatabase::new_in_memory().unwrap();
        let store = &db.conversations;
        let good = save(store, "user", "fine", &["t"]);

        let mut batch = KvBatch::new();
        batch
            .sadd("topic:t", "dangling")
            .sadd("topic:t", "broken")
            .hset(keys::message("broken"), [("id", "broken")])
            .sadd("topic:t", "garbled")
            .zadd(keys::TIMELINE, "garbled", f64::MAX)
            .hset(
                keys::message("garbled"),
                [("id", "garbled"), ("role", "user"), ("timestamp", "not a date"), ("content", "x")],
            );
        db.kv.execute(&batch).unwrap();

        let hits = store.search(&strings(&["t"]), 10, SearchScope::All).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, good);
        assert!(store.search(&strings(&["  "]), 10, SearchScope::All).unwrap().is_empty());
    }

    #[test]
    fn test_search_scope_parsing() {
        assert_eq!(SearchScope::from("topics"), SearchScope::Topics);
        assert_eq!(SearchScope::from("Technical"), SearchScope::Technical);
        assert_eq!(SearchScope::from("everything"), SearchScope::All);
    }

    // ===== Insights =====

    #[test]
    fn test_insight_is_indexed_and_ranked() {
        let db = MemoryDatabase::new_in_memory().unwrap();
        let store = &db.conversations;
        let low = store.save_insight(insight_params("Minor cleanup", 0.2)).unwrap();
        let high = store.save_insight(insight_params("Adopt WAL everywhere", 0.9)).unwrap();
        let clamped = store.save_insight(insight_params("Overrated", 7.5)).unwrap();

        let top: Vec<String> = store.get_top_insights(5).unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(top, vec![clamped.clone(), high.clone(), low.clone()]);
        assert_eq!(store.get_top_insights(1).unwrap().len(), 1);

        let insight = store.get_insight(&clamped).unwrap().unwrap();
        assert_eq!(insight.relevance_score, 1.0);
        assert_eq!(insight.summary, "Overrated");
        assert_eq!(store.index_members(IndexKey::InsightType("decision")).unwrap().len(), 3);
        assert_eq!(store.index_members(IndexKey::BusinessArea("infrastructure")).unwrap().len(), 3);
        assert_eq!(store.index_members(IndexKey::Impact(ImpactLevel::High)).unwrap().len(), 3);
    }

    #[test]
    fn test_insight_summary_is_kept_when_given() {
        let db = MemoryDatabase::new_in_memory().unwrap();
        let store = &db.conversations;
        let long = "Detailed reasoning about the storage engine. ".repeat(10);
        let mut params = insight_params(&long, 0.5);
        params.summary = Some("Storage engine choice");
        let id = store.save_insight(params).unwrap();
        assert_eq!(store.get_insight(&id).unwrap().unwrap().summary, "Storage engine choice");

        let generated = store.save_insight(insight_params(&long, 0.5)).unwrap();
        let summary = store.get_insight(&generated).unwrap().unwrap().summary;
        assert!(summary.chars().count() <= 150);
        assert!(summary.starts_with("Detailed reasoning"));
    }

    #[test]
    fn test_relevance_clamp() {
        assert_eq!(clamp_relevance(-1.0), 0.0);
        assert_eq!(clamp_relevance(0.4), 0.4);
        assert_eq!(clamp_relevance(2.0), 1.0);
        assert_eq!(clamp_relevance(f64::NAN), 0.0);
    }

    // ===== Analytics =====

    #[test]
    fn test_analytics() {
        let db = MemoryDatabase::new_in_memory().unwrap();
        let store = &db.conversations;
        save(store, "user", "a", &["rust", "sqlite"]);
        save(store, "user", "b", &["rust"]);
        save(store, "assistant", &"z".repeat(500), &[]);
        store.save_insight(insight_params("noted", 0.5)).unwrap();

        let analytics = store.analytics().unwrap();
        assert_eq!(analytics.total_messages, 3);
        assert_eq!(analytics.messages_counter, 3);
        assert_eq!(analytics.messages_today, 3);
        assert_eq!(analytics.total_insights, 1);
        assert!(analytics.compression_bytes_saved > 0);
        assert_eq!(
            analytics.top_topics,
            vec![
                TopicCount { topic: "rust".into(), count: 2 },
                TopicCount { topic: "sqlite".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_bytes_saved_is_never_negative() {
        assert_eq!(bytes_saved(1.0, 100), 0);
        assert_eq!(bytes_saved(0.25, 100), 75);
        assert_eq!(bytes_saved(1.5, 100), 0);
    }
}
