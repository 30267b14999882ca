//! Stored entities, their flat-record encoding and the key layout.
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{MemoryError, MemoryResult};
use crate::processing::decompress;
use crate::utils::TextUtils;

/// Version of the flat-record encoding (lists as JSON arrays), stored in the
/// `encoding_version` field of every record. Records without it predate the
/// field and decode as version 1.
pub const LIST_ENCODING_VERSION: u32 = 1;

pub(crate) const ENCODING_VERSION_FIELD: &str = "encoding_version";

/// Key layout shared with every other reader of the store.
pub mod keys {
    use chrono::NaiveDate;

    pub const TIMELINE: &str = "messages:timeline";
    pub const INSIGHTS_BY_RELEVANCE: &str = "insights:by_relevance";
    pub const TOTAL_MESSAGES: &str = "analytics:total_messages";
    pub const COMPRESSION_SAVED: &str = "analytics:compression_total_saved";
    pub const TOPIC_PREFIX: &str = "topic:";

    pub fn message(id: &str) -> String {
        format!("message:{}", id)
    }

    pub fn message_summary(id: &str) -> String {
        format!("message:{}:summary", id)
    }

    pub fn insight(id: &str) -> String {
        format!("insight:{}", id)
    }

    /// `session:<YYYY-MM-DD>`, holding the id of that day's session.
    pub fn session_day(day: NaiveDate) -> String {
        format!("session:{}", day.format("%Y-%m-%d"))
    }

    pub fn daily_messages(day: NaiveDate) -> String {
        format!("analytics:daily:{}", day.format("%Y-%m-%d"))
    }
}

/// A secondary index set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKey<'a> {
    Topic(&'a str),
    Keyword(&'a str),
    Tech(&'a str),
    Role(&'a str),
    Session(&'a str),
    InsightType(&'a str),
    BusinessArea(&'a str),
    Impact(ImpactLevel),
}

impl IndexKey<'_> {
    pub fn key(&self) -> String {
        match self {
            IndexKey::Topic(t) => format!("topic:{}", t.to_lowercase()),
            IndexKey::Keyword(k) => format!("keyword:{}", k.to_lowercase()),
            IndexKey::Tech(t) => format!("tech:{}", t.to_lowercase()),
            IndexKey::Role(r) => format!("role:{}", r),
            IndexKey::Session(s) => format!("session:{}:messages", s),
            IndexKey::InsightType(t) => format!("insights:{}", t),
            IndexKey::BusinessArea(a) => format!("business_area:{}", a),
            IndexKey::Impact(level) => format!("impact:{}", level),
        }
    }
}

/// Author of a message. Unrecognised roles are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    User,
    Assistant,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Other(other) => other,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Role::User)
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        match s {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            other => Role::Other(other.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        Role::from(s.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl ImpactLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactLevel::Low => "low",
            ImpactLevel::Medium => "medium",
            ImpactLevel::High => "high",
        }
    }
}

impl From<&str> for ImpactLevel {
    /// Unknown levels fall back to `Medium`.
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "low" => ImpactLevel::Low,
            "high" => ImpactLevel::High,
            _ => ImpactLevel::Medium,
        }
    }
}

impl fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The primary record of one conversational turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    pub content: String,
    pub compressed_content: String,
    pub summary_short: String,
    pub summary_medium: String,
    pub key_points: Vec<String>,
    pub technical_terms: Vec<String>,
    pub topics: Vec<String>,
    pub keywords: Vec<String>,
    pub context_hash: String,
    pub session_id: String,
    pub content_length: usize,
    pub compression_ratio: f64,
}

impl ConversationMessage {
    /// Timeline score: epoch seconds with microsecond precision.
    pub fn timeline_score(&self) -> f64 {
        timeline_score(&self.timestamp)
    }

    pub fn to_record(&self) -> MemoryResult<Vec<(&'static str, String)>> {
        Ok(vec![
            ("id", self.id.clone()),
            ("timestamp", self.timestamp.to_rfc3339()),
            ("role", self.role.to_string()),
            ("content", self.content.clone()),
            ("compressed_content", self.compressed_content.clone()),
            ("summary_short", self.summary_short.clone()),
            ("summary_medium", self.summary_medium.clone()),
            ("key_points", encode_list(&self.key_points)?),
            ("technical_terms", encode_list(&self.technical_terms)?),
            ("topics", encode_list(&self.topics)?),
            ("keywords", encode_list(&self.keywords)?),
            ("context_hash", self.context_hash.clone()),
            ("session_id", self.session_id.clone()),
            ("content_length", self.content_length.to_string()),
            ("compression_ratio", self.compression_ratio.to_string()),
            (ENCODING_VERSION_FIELD, LIST_ENCODING_VERSION.to_string()),
        ])
    }

    /// Decode a `message:<id>` hash. Records written before the enhanced
    /// layout decode with empty derived fields.
    pub fn from_record(key: &str, record: &HashMap<String, String>) -> MemoryResult<Self> {
        check_encoding_version(key, record)?;
        let id = required(key, record, "id")?.to_string();
        let role = Role::from(required(key, record, "role")?);
        let timestamp = parse_timestamp(key, required(key, record, "timestamp")?)?;
        let compressed_content = field(record, "compressed_content").to_string();

        let content = match record.get("content") {
            Some(content) => content.clone(),
            None if !compressed_content.is_empty() => decompress(&compressed_content),
            None => return Err(MemoryError::corrupt(key, "no content or compressed_content")),
        };

        Ok(Self {
            id,
            timestamp,
            role,
            compressed_content,
            summary_short: field(record, "summary_short").to_string(),
            summary_medium: field(record, "summary_medium").to_string(),
            key_points: decode_list(record, "key_points")?,
            technical_terms: decode_list(record, "technical_terms")?,
            topics: decode_list(record, "topics")?,
            keywords: decode_list(record, "keywords")?,
            context_hash: field(record, "context_hash").to_string(),
            session_id: field(record, "session_id").to_string(),
            content_length: parse_or(key, record, "content_length", TextUtils::char_len(&content)),
            compression_ratio: parse_or(key, record, "compression_ratio", 1.0),
            content,
        })
    }

    /// Whether a raw record already carries the derived fields.
    pub fn is_enhanced(record: &HashMap<String, String>) -> bool {
        record.contains_key("compressed_content")
    }
}

/// Denormalised copy of the derived texts, stored under `message:<id>:summary`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub short: String,
    pub medium: String,
    pub key_points: Vec<String>,
    pub technical_terms: Vec<String>,
}

impl MessageSummary {
    pub fn to_record(&self) -> MemoryResult<Vec<(&'static str, String)>> {
        Ok(vec![
            ("short", self.short.clone()),
            ("medium", self.medium.clone()),
            ("key_points", encode_list(&self.key_points)?),
            ("technical_terms", encode_list(&self.technical_terms)?),
            (ENCODING_VERSION_FIELD, LIST_ENCODING_VERSION.to_string()),
        ])
    }

    /// Missing fields decode as empty; an empty hash yields `None`.
    pub fn from_record(key: &str, record: &HashMap<String, String>) -> MemoryResult<Option<Self>> {
        if record.is_empty() {
            return Ok(None);
        }
        check_encoding_version(key, record)?;
        Ok(Some(Self {
            short: field(record, "short").to_string(),
            medium: field(record, "medium").to_string(),
            key_points: decode_list(record, "key_points")?,
            technical_terms: decode_list(record, "technical_terms")?,
        }))
    }
}

/// A scored observation about one or more messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub insight_type: String,
    pub content: String,
    pub summary: String,
    pub relevance_score: f64,
    pub business_area: String,
    pub impact_level: ImpactLevel,
    pub source_messages: Vec<String>,
    pub actionable_items: Vec<String>,
}

impl Insight {
    pub fn to_record(&self) -> MemoryResult<Vec<(&'static str, String)>> {
        Ok(vec![
            ("id", self.id.clone()),
            ("timestamp", self.timestamp.to_rfc3339()),
            ("insight_type", self.insight_type.clone()),
            ("content", self.content.clone()),
            ("summary", self.summary.clone()),
            ("relevance_score", self.relevance_score.to_string()),
            ("business_area", self.business_area.clone()),
            ("impact_level", self.impact_level.to_string()),
            ("source_messages", encode_list(&self.source_messages)?),
            ("actionable_items", encode_list(&self.actionable_items)?),
            (ENCODING_VERSION_FIELD, LIST_ENCODING_VERSION.to_string()),
        ])
    }

    pub fn from_record(key: &str, record: &HashMap<String, String>) -> MemoryResult<Self> {
        check_encoding_version(key, record)?;
        Ok(Self {
            id: required(key, record, "id")?.to_string(),
            timestamp: parse_timestamp(key, required(key, record, "timestamp")?)?,
            insight_type: required(key, record, "insight_type")?.to_string(),
            content: required(key, record, "content")?.to_string(),
            summary: field(record, "summary").to_string(),
            relevance_score: parse_or(key, record, "relevance_score", 0.0),
            business_area: field(record, "business_area").to_string(),
            impact_level: ImpactLevel::from(field(record, "impact_level")),
            source_messages: decode_list(record, "source_messages")?,
            actionable_items: decode_list(record, "actionable_items")?,
        })
    }
}

/// A search hit: the full message plus its medium summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageView {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub summary_medium: String,
    pub key_points: Vec<String>,
    pub technical_terms: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub compression_ratio: f64,
    pub topics: Vec<String>,
    pub keywords: Vec<String>,
}

impl MessageView {
    pub fn new(message: ConversationMessage, summary: Option<MessageSummary>) -> Self {
        let (summary_medium, key_points, technical_terms) = match summary {
            Some(s) => (s.medium, s.key_points, s.technical_terms),
            None => (
                message.summary_medium,
                message.key_points,
                message.technical_terms,
            ),
        };

        Self {
            id: message.id,
            role: message.role,
            content: message.content,
            summary_medium,
            key_points,
            technical_terms,
            timestamp: message.timestamp,
            compression_ratio: message.compression_ratio,
            topics: message.topics,
            keywords: message.keywords,
        }
    }
}

/// Store-wide counters, as reported by `ConversationStore::analytics`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analytics {
    pub total_messages: usize,
    pub total_insights: usize,
    pub messages_counter: i64,
    pub compression_bytes_saved: i64,
    pub messages_today: i64,
    pub top_topics: Vec<TopicCount>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicCount {
    pub topic: String,
    pub count: usize,
}

pub fn timeline_score(timestamp: &DateTime<Utc>) -> f64 {
    timestamp.timestamp_micros() as f64 / 1_000_000.0
}

pub fn session_day(timestamp: &DateTime<Utc>) -> NaiveDate {
    timestamp.date_naive()
}

pub(crate) fn encode_list(items: &[String]) -> MemoryResult<String> {
    Ok(serde_json::to_string(items)?)
}

fn decode_list(record: &HashMap<String, String>, name: &str) -> MemoryResult<Vec<String>> {
    match record.get(name) {
        Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(raw)?),
        _ => Ok(Vec::new()),
    }
}

fn field<'a>(record: &'a HashMap<String, String>, name: &str) -> &'a str {
    record.get(name).map(String::as_str).unwrap_or("")
}

fn required<'a>(key: &str, record: &'a HashMap<String, String>, name: &str) -> MemoryResult<&'a str> {
    record
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| MemoryError::corrupt(key, format!("missing field `{}`", name)))
}

fn parse_or<T: FromStr>(key: &str, record: &HashMap<String, String>, name: &str, default: T) -> T {
    match record.get(name) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Unparseable {} in {}: {:?}", name, key, raw);
            default
        }),
        None => default,
    }
}

fn parse_timestamp(key: &str, raw: &str) -> MemoryResult<DateTime<Utc>> {
    parse_datetime_safe(raw)
        .ok_or_else(|| MemoryError::corrupt(key, format!("unparseable timestamp {:?}", raw)))
}

/// Records newer than this build understands are refused rather than misread.
fn check_encoding_version(key: &str, record: &HashMap<String, String>) -> MemoryResult<()> {
    let Some(raw) = record.get(ENCODING_VERSION_FIELD) else {
        return Ok(());
    };
    match raw.trim().parse::<u32>() {
        Ok(version) if version <= LIST_ENCODING_VERSION => Ok(()),
        _ => Err(MemoryError::corrupt(
            key,
            format!("unsupported encoding version {:?}", raw),
        )),
    }
}

/// Accepts RFC 3339 and the naive ISO forms older writers produced.
fn parse_datetime_safe(datetime_str: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(datetime_str) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(datetime_str, format) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::compress;

    fn record(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn sample_message() -> ConversationMessage {
        let (compressed_content, compression_ratio) = compress("hello world");
        ConversationMessage {
            id: "m1".into(),
            timestamp: Utc::now(),
            role: Role::User,
            content: "hello world".into(),
            compressed_content,
            summary_short: "hello world".into(),
            summary_medium: "hello world".into(),
            key_points: vec![],
            technical_terms: vec!["API".into()],
            topics: vec!["Greeting".into()],
            keywords: vec!["hello".into(), "world".into()],
            context_hash: "abc".into(),
            session_id: "s1".into(),
            content_length: 11,
            compression_ratio,
        }
    }

    #[test]
    fn test_key_layout() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(keys::message("m1"), "message:m1");
        assert_eq!(keys::message_summary("m1"), "message:m1:summary");
        assert_eq!(keys::session_day(day), "session:2024-03-09");
        assert_eq!(keys::daily_messages(day), "analytics:daily:2024-03-09");
        assert_eq!(IndexKey::Topic("PostgreSQL").key(), "topic:postgresql");
        assert_eq!(IndexKey::Tech("API").key(), "tech:api");
        assert_eq!(IndexKey::Role("Assistant").key(), "role:Assistant");
        assert_eq!(IndexKey::Session("s1").key(), "session:s1:messages");
        assert_eq!(IndexKey::InsightType("decision").key(), "insights:decision");
        assert_eq!(IndexKey::Impact(ImpactLevel::High).key(), "impact:high");
    }

    #[test]
    fn test_role_keeps_unknown_values() {
        assert_eq!(Role::from("user"), Role::User);
        assert_eq!(Role::from("system").as_str(), "system");
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
    }

    #[test]
    fn test_unknown_impact_level_is_medium() {
        assert_eq!(ImpactLevel::from("HIGH"), ImpactLevel::High);
        assert_eq!(ImpactLevel::from("critical"), ImpactLevel::Medium);
        assert_eq!(ImpactLevel::default(), ImpactLevel::Medium);
    }

    #[test]
    fn test_message_record_round_trip() {
        let message = sample_message();
        let encoded: HashMap<String, String> = message
            .to_record()
            .unwrap()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        assert_eq!(encoded[ENCODING_VERSION_FIELD], "1");

        let decoded = ConversationMessage::from_record("message:m1", &encoded).unwrap();
        // RFC 3339 keeps sub-second precision to the nanosecond
        assert_eq!(decoded, message);
        assert!(ConversationMessage::is_enhanced(&encoded));
    }

    #[test]
    fn test_legacy_record_decodes_with_defaults() {
        let legacy = record(&[
            ("id", "m0"),
            ("role", "user"),
            ("timestamp", "2024-01-02T03:04:05.123456"),
            ("content", "日本語のメッセージ"),
            ("topics", "[\"infra\"]"),
        ]);

        let message = ConversationMessage::from_record("message:m0", &legacy).unwrap();
        assert_eq!(message.content_length, 9);
        assert_eq!(message.compression_ratio, 1.0);
        assert_eq!(message.topics, vec!["infra"]);
        assert!(message.key_points.is_empty());
        assert_eq!(message.timestamp.timestamp(), 1_704_164_645);
        assert!(!ConversationMessage::is_enhanced(&legacy));
    }

    #[test]
    fn test_content_is_recovered_from_compressed_blob() {
        let (blob, _) = compress("only the blob survived");
        let partial = record(&[
            ("id", "m2"),
            ("role", "assistant"),
            ("timestamp", "2024-01-02T03:04:05Z"),
            ("compressed_content", blob.as_str()),
        ]);

        let message = ConversationMessage::from_record("message:m2", &partial).unwrap();
        assert_eq!(message.content, "only the blob survived");
    }

    #[test]
    fn test_missing_mandatory_fields_are_corrupt() {
        let no_role = record(&[("id", "m3"), ("timestamp", "2024-01-02T03:04:05Z"), ("content", "x")]);
        assert!(matches!(
            ConversationMessage::from_record("message:m3", &no_role),
            Err(MemoryError::CorruptRecord { .. })
        ));

        let no_content = record(&[("id", "m4"), ("role", "user"), ("timestamp", "2024-01-02T03:04:05Z")]);
        assert!(ConversationMessage::from_record("message:m4", &no_content).is_err());
    }

    #[test]
    fn test_unparseable_timestamp_is_corrupt() {
        let garbled = record(&[
            ("id", "m5"),
            ("role", "user"),
            ("timestamp", "yesterday-ish"),
            ("content", "x"),
        ]);
        assert!(matches!(
            ConversationMessage::from_record("message:m5", &garbled),
            Err(MemoryError::CorruptRecord { .. })
        ));
    }

    // ===== Encoding version =====

    #[test]
    fn test_every_record_carries_the_encoding_version() {
        let summary = MessageSummary {
            short: "s".into(),
            ..MessageSummary::default()
        };
        let encoded: HashMap<String, String> = summary
            .to_record()
            .unwrap()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert_eq!(encoded[ENCODING_VERSION_FIELD], LIST_ENCODING_VERSION.to_string());
        assert_eq!(
            MessageSummary::from_record("message:m1:summary", &encoded).unwrap(),
            Some(summary)
        );
    }

    #[test]
    fn test_newer_encoding_version_is_refused() {
        let mut future: HashMap<String, String> = sample_message()
            .to_record()
            .unwrap()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        future.insert(ENCODING_VERSION_FIELD.to_string(), "2".to_string());

        assert!(matches!(
            ConversationMessage::from_record("message:m1", &future),
            Err(MemoryError::CorruptRecord { .. })
        ));
    }

    #[test]
    fn test_summary_record() {
        let key = "message:m1:summary";
        assert_eq!(MessageSummary::from_record(key, &HashMap::new()).unwrap(), None);

        let summary = MessageSummary::from_record(key, &record(&[("short", "s"), ("key_points", "[\"a\"]")]))
            .unwrap()
            .unwrap();
        assert_eq!(summary.short, "s");
        assert_eq!(summary.medium, "");
        assert_eq!(summary.key_points, vec!["a"]);
    }

    #[test]
    fn test_insight_serializes_type_field() {
        let insight = Insight {
            id: "i1".into(),
            timestamp: Utc::now(),
            insight_type: "decision".into(),
            content: "Use WAL mode".into(),
            summary: "Use WAL mode".into(),
            relevance_score: 0.9,
            business_area: "infra".into(),
            impact_level: ImpactLevel::High,
            source_messages: vec!["m1".into()],
            actionable_items: vec!["enable WAL".into()],
        };
        let json = serde_json::to_value(&insight).unwrap();
        assert_eq!(json["type"], "decision");
        assert_eq!(json["impact_level"], "high");

        let encoded: HashMap<String, String> = insight
            .to_record()
            .unwrap()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert_eq!(Insight::from_record("insight:i1", &encoded).unwrap(), insight);
    }

    #[test]
    fn test_timeline_score_has_microsecond_precision() {
        let ts = DateTime::parse_from_rfc3339("2024-01-01T00:00:00.000001Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(timeline_score(&ts), 1_704_067_200.000001);
    }
}
