//! The conversation log kept by an assistant session.
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::{NoContext, Timestamp, Uuid};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub content: String,
    pub from_user: bool,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl Message {
    fn new(content: String, from_user: bool, timestamp: i64) -> Self {
        Self {
            id: message_id(timestamp),
            content,
            from_user,
            timestamp,
        }
    }
}

/// UUIDv7 ids carry the millisecond timestamp in their leading bits, so they
/// sort in creation order as long as timestamps are strictly increasing.
fn message_id(timestamp: i64) -> Uuid {
    let millis = u64::try_from(timestamp).unwrap_or_default();
    let ts = Timestamp::from_unix(NoContext, millis / 1000, ((millis % 1000) * 1_000_000) as u32);
    Uuid::new_v7(ts)
}

/// Stored timestamps further than this ahead of the clock are rejected.
const MAX_CLOCK_SKEW_MS: i64 = 24 * 60 * 60 * 1000;

/// Source of wall-clock time for new messages.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default()
    }
}

/// Ordered list of messages with strictly increasing timestamps.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a conversation from stored messages, dropping any that would
    /// break timestamp ordering or that carry an impossible timestamp
    /// (before the epoch, or more than a day past `now`).
    pub fn from_stored(stored: Vec<Message>, now: i64) -> Self {
        let latest = now.saturating_add(MAX_CLOCK_SKEW_MS);
        let mut messages: Vec<Message> = Vec::with_capacity(stored.len());
        for message in stored {
            if message.timestamp < 0 || message.timestamp > latest {
                tracing::warn!(
                    id = %message.id,
                    timestamp = message.timestamp,
                    "Dropping message with invalid timestamp from stored history"
                );
                continue;
            }
            match messages.last() {
                Some(last) if message.timestamp <= last.timestamp => {
                    tracing::warn!(
                        id = %message.id,
                        timestamp = message.timestamp,
                        "Dropping out-of-order message from stored history"
                    );
                }
                _ => messages.push(message),
            }
        }
        Self { messages }
    }

    /// Appends an existing message, restamping it after the last one when
    /// its timestamp would break ordering.
    pub fn append(&mut self, message: Message) {
        match self.messages.last() {
            Some(last) if message.timestamp <= last.timestamp => {
                let timestamp = last.timestamp.saturating_add(1);
                self.messages
                    .push(Message::new(message.content, message.from_user, timestamp));
            }
            _ => self.messages.push(message),
        }
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Appends a message stamped at `now`, or one millisecond after the
    /// previous message when the clock has not moved past it.
    pub fn push(&mut self, content: impl Into<String>, from_user: bool, now: i64) -> &Message {
        let timestamp = match self.messages.last() {
            Some(last) if now <= last.timestamp => last.timestamp.saturating_add(1),
            _ => now,
        };
        self.messages.push(Message::new(content.into(), from_user, timestamp));
        &self.messages[self.messages.len() - 1]
    }

    pub(crate) fn pop(&mut self) -> Option<Message> {
        self.messages.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_keeps_timestamps_strictly_increasing() {
        let mut log = Conversation::new();
        log.push("a", true, 1_000);
        log.push("b", false, 1_000);
        log.push("c", true, 999);
        let stamps: Vec<i64> = log.messages().iter().map(|m| m.timestamp).collect();
        assert_eq!(stamps, vec![1_000, 1_001, 1_002]);
    }

    #[test]
    fn ids_follow_creation_order() {
        let mut log = Conversation::new();
        for i in 0..5 {
            log.push(format!("m{i}"), i % 2 == 0, 1_700_000_000_000);
        }
        let ids: Vec<String> = log.messages().iter().map(|m| m.id.to_string()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        sorted.dedup();
        assert_eq!(sorted.len(), 5);
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let mut log = Conversation::new();
        let message = log.push("hello", true, 42).clone();
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["fromUser"], serde_json::json!(true));
        assert_eq!(value["timestamp"], serde_json::json!(42));
        assert_eq!(value["content"], serde_json::json!("hello"));
        assert!(value["id"].is_string());
    }

    #[test]
    fn from_stored_drops_out_of_order_entries() {
        let mut log = Conversation::new();
        log.push("a", true, 10);
        log.push("b", false, 20);
        let mut stored = log.messages().to_vec();
        stored.push(stored[0].clone());

        let restored = Conversation::from_stored(stored, 30);
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.messages()[1].content, "b");
    }

    #[test]
    fn from_stored_drops_impossible_timestamps() {
        let mut log = Conversation::new();
        log.push("ok", true, 1_000);
        let mut stored = log.messages().to_vec();
        let mut future = stored[0].clone();
        future.timestamp = i64::MAX;
        let mut negative = stored[0].clone();
        negative.timestamp = -5;
        stored.insert(0, negative);
        stored.push(future);

        let mut restored = Conversation::from_stored(stored, 2_000);
        assert_eq!(restored.len(), 1);
        assert_eq!(restored.messages()[0].timestamp, 1_000);

        // Pushing after the restored log must not overflow.
        restored.push("next", false, 2_000);
        assert_eq!(restored.messages()[1].timestamp, 2_000);
    }

    #[test]
    fn push_after_max_timestamp_saturates() {
        let mut log = Conversation::new();
        log.append(Message::new("edge".to_string(), true, i64::MAX));
        log.push("after", false, 0);
        assert_eq!(log.messages()[1].timestamp, i64::MAX);
    }

    #[test]
    fn append_restamps_stale_messages() {
        let mut mine = Conversation::new();
        mine.push("corn", true, 100);
        mine.push("npk", false, 101);

        let mut merged = Conversation::new();
        merged.push("soil", true, 500);
        merged.push("compost", false, 501);
        for message in mine.messages().to_vec() {
            merged.append(message);
        }
        let stamps: Vec<i64> = merged.messages().iter().map(|m| m.timestamp).collect();
        assert_eq!(stamps, vec![500, 501, 502, 503]);
        assert_eq!(merged.messages()[2].content, "corn");
        assert!(merged.messages()[2].from_user);
    }
}
