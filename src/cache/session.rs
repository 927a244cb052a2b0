//! Evaluation session identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// A unique session identifier.
///
/// Format: `sess_{timestamp_ms}_{sequence}`. The sequence is process-wide,
/// so two sessions started in the same millisecond still differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId {
    timestamp: DateTime<Utc>,
    sequence: u64,
}

impl SessionId {
    /// Generate a new session ID.
    pub fn new() -> Self {
        // Truncate to milliseconds for consistent serialization
        let now = Utc::now();
        let timestamp = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);

        Self {
            timestamp,
            sequence: NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// When the session started.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Parse a session ID from a string.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.strip_prefix("sess_")?;
        let (ts, seq) = s.split_once('_')?;
        let timestamp = DateTime::from_timestamp_millis(ts.parse().ok()?)?;
        let sequence = seq.parse().ok()?;
        Some(Self {
            timestamp,
            sequence,
        })
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sess_{}_{}",
            self.timestamp.timestamp_millis(),
            self.sequence
        )
    }
}

// Custom serialization to store as string
impl Serialize for SessionId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SessionId::parse(&s).ok_or_else(|| serde::de::Error::custom("Invalid session ID format"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_unique() {
        let id1 = SessionId::new();
        let id2 = SessionId::new();

        assert_ne!(id1, id2);
        assert!(id1.to_string().starts_with("sess_"));
    }

    #[test]
    fn session_id_parses_its_display() {
        let id = SessionId::new();
        let parsed = SessionId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn session_id_timestamp_is_recent() {
        let id = SessionId::new();
        let now = Utc::now();
        assert!(now.signed_duration_since(id.timestamp()).num_seconds() < 2);
    }

    #[test]
    fn session_id_serialization() {
        let id = SessionId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn session_id_parse_invalid() {
        assert!(SessionId::parse("invalid").is_none());
        assert!(SessionId::parse("sess_").is_none());
        assert!(SessionId::parse("sess_123").is_none());
        assert!(SessionId::parse("sess_abc_1").is_none());
    }
}
