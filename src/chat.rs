//! Per-room chat history and typing presence

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// One stored chat entry. Immutable once appended.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub sender_id: String,
    pub sender_name: String,
    pub text: String,
    /// Server-assigned at relay time, strictly monotonic within a room.
    pub timestamp: u64,
}

/// Append-only buffer of a room's chat, replayed once to late joiners.
/// Dropped together with the room.
#[derive(Debug, Default)]
pub struct ChatLog {
    entries: Vec<ChatMessage>,
    last_timestamp: u64,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message and assigns its timestamp. Wall-clock millis,
    /// clamped so timestamps never repeat or run backwards within the room.
    pub fn append(&mut self, sender_id: &str, sender_name: &str, text: &str) -> ChatMessage {
        let timestamp = now_millis().max(self.last_timestamp + 1);
        self.last_timestamp = timestamp;

        let message = ChatMessage {
            sender_id: sender_id.to_string(),
            sender_name: sender_name.to_string(),
            text: text.to_string(),
            timestamp,
        };
        self.entries.push(message.clone());
        message
    }

    /// Stored entries in append order.
    pub fn entries(&self) -> &[ChatMessage] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Who is typing in a room right now. No history is kept: consumers only
/// ever see the current aggregate view.
#[derive(Debug, Default)]
pub struct TypingState {
    typers: HashMap<String, String>,
}

impl TypingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records or clears a participant's typing entry. Returns whether the
    /// view actually changed.
    pub fn set(&mut self, participant_id: &str, display_name: &str, is_typing: bool) -> bool {
        if is_typing {
            self.typers
                .insert(participant_id.to_string(), display_name.to_string())
                .as_deref()
                != Some(display_name)
        } else {
            self.typers.remove(participant_id).is_some()
        }
    }

    /// Drops a participant's entry without a broadcastable change, used on
    /// leave/disconnect cleanup.
    pub fn clear_participant(&mut self, participant_id: &str) {
        self.typers.remove(participant_id);
    }

    pub fn is_typing(&self, participant_id: &str) -> bool {
        self.typers.contains_key(participant_id)
    }

    /// Current (id, display name) view.
    pub fn view(&self) -> Vec<(String, String)> {
        self.typers
            .iter()
            .map(|(id, name)| (id.clone(), name.clone()))
            .collect()
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_assigns_strictly_increasing_timestamps() {
        let mut log = ChatLog::new();
        let a = log.append("p1", "Ada", "hi");
        let b = log.append("p2", "Bob", "hello");
        let c = log.append("p1", "Ada", "again");

        assert!(a.timestamp < b.timestamp);
        assert!(b.timestamp < c.timestamp);
    }

    #[test]
    fn entries_keep_append_order() {
        let mut log = ChatLog::new();
        log.append("p1", "Ada", "first");
        log.append("p2", "Bob", "second");

        let texts: Vec<&str> = log.entries().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["first", "second"]);
    }

    #[test]
    fn typing_set_and_clear() {
        let mut typing = TypingState::new();
        assert!(typing.set("p1", "Ada", true));
        assert!(typing.is_typing("p1"));

        // Re-asserting the same state is not a change.
        assert!(!typing.set("p1", "Ada", true));

        assert!(typing.set("p1", "Ada", false));
        assert!(!typing.is_typing("p1"));
        assert!(!typing.set("p1", "Ada", false));
    }

    #[test]
    fn clear_participant_removes_entry() {
        let mut typing = TypingState::new();
        typing.set("p1", "Ada", true);
        typing.clear_participant("p1");
        assert!(typing.view().is_empty());
    }
}
