// src/types/chat.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::openai::{ChatMessage, WireRole};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum ChatRole {
    #[serde(rename = "User")]
    User,
    #[serde(rename = "AI", alias = "Assistant")]
    Assistant,
    #[serde(rename = "Function")]
    Function,
    #[serde(rename = "Error")]
    Error,
}

/// One transcript item.
///
/// Entries are never mutated while streaming: each delta produces a new
/// entry with the same `id` that replaces the previous one.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatEntry {
    pub role: ChatRole,
    #[serde(rename = "message")]
    pub content: String,
    pub id: String,
    #[serde(rename = "name", default)]
    pub function_name: Option<String>,
    #[serde(default)]
    pub in_progress: bool,
    #[serde(default = "Utc::now", deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
}

impl ChatEntry {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            id: uuid::Uuid::new_v4().to_string(),
            function_name: None,
            in_progress: false,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    /// An empty assistant entry that deltas will be appended to.
    pub fn pending_assistant() -> Self {
        Self {
            in_progress: true,
            ..Self::new(ChatRole::Assistant, "")
        }
    }

    pub fn function(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            function_name: Some(name.into()),
            ..Self::new(ChatRole::Function, content)
        }
    }

    /// Replacement for this entry with `delta` appended, keeping id and timestamp.
    pub fn appended(&self, delta: &str, role: ChatRole, in_progress: bool) -> Self {
        let mut content = String::with_capacity(self.content.len() + delta.len());
        content.push_str(&self.content);
        content.push_str(delta);
        Self {
            role,
            content,
            id: self.id.clone(),
            function_name: self.function_name.clone(),
            in_progress,
            timestamp: self.timestamp,
        }
    }

    /// Wire form of this entry, or `None` for entries never sent to a model.
    pub fn to_chat_message(&self) -> Option<ChatMessage> {
        let role = match self.role {
            ChatRole::User => WireRole::User,
            ChatRole::Assistant => WireRole::Assistant,
            ChatRole::Function => WireRole::Function,
            ChatRole::Error => return None,
        };
        Some(ChatMessage {
            role,
            content: self.content.clone(),
            name: self.function_name.clone(),
        })
    }
}

/// Reads timestamps written either as RFC 3339 strings or as decimal epoch
/// seconds (`1704153600.123456789`), the form older day files use.
mod timestamp {
    use std::fmt;

    use chrono::{DateTime, TimeZone, Utc};
    use serde::de::{self, Deserializer, Visitor};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(TimestampVisitor)
    }

    struct TimestampVisitor;

    impl<'de> Visitor<'de> for TimestampVisitor {
        type Value = DateTime<Utc>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an RFC 3339 string or epoch seconds")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            DateTime::parse_from_rfc3339(v)
                .map(|t| t.with_timezone(&Utc))
                .map_err(E::custom)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Utc.timestamp_opt(v, 0)
                .single()
                .ok_or_else(|| E::custom(format!("timestamp out of range: {}", v)))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            self.visit_i64(i64::try_from(v).map_err(E::custom)?)
        }

        // f64 only carries about microsecond precision at current epochs.
        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            if !v.is_finite() {
                return Err(E::custom(format!("timestamp out of range: {}", v)));
            }
            let mut secs = v.floor();
            let mut micros = ((v - secs) * 1e6).round() as u32;
            if micros >= 1_000_000 {
                secs += 1.0;
                micros = 0;
            }
            Utc.timestamp_opt(secs as i64, micros * 1_000)
                .single()
                .ok_or_else(|| E::custom(format!("timestamp out of range: {}", v)))
        }
    }
}

/// On-disk shape of one logical day's transcript.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct ChatLog {
    #[serde(default)]
    pub logs: Vec<ChatEntry>,
}
