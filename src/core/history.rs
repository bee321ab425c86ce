//! Per-user conversation history.
//!
//! Each user gets a bounded list of turns, newest last. Turns older than the
//! TTL are pruned whenever the entry is read, and the pruned list is written
//! back. There is no background sweep: an idle user's entry stays in memory
//! until that user is seen again.
//!
//! Every operation locks the map once. A read followed by a later write for
//! the same user (two messages from one user in flight) is last-write-wins.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Keep only this many turns per user.
pub const MAX_HISTORY_LENGTH: usize = 10;

/// Turns older than this are dropped on read.
pub fn history_ttl() -> Duration {
    Duration::hours(24)
}

/// Who produced a turn.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Model => write!(f, "model"),
        }
    }
}

/// One message in a user's conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// In-memory conversation log keyed by gateway contact id.
pub struct HistoryStore {
    entries: Mutex<HashMap<String, Vec<Turn>>>,
    max_len: usize,
    ttl: Duration,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::with_limits(MAX_HISTORY_LENGTH, history_ttl())
    }

    pub fn with_limits(max_len: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_len,
            ttl,
        }
    }

    /// Live turns for `user_id` in chronological order.
    pub fn get_history(&self, user_id: &str) -> Vec<Turn> {
        self.get_history_at(user_id, Utc::now())
    }

    /// Append a turn stamped with the current time.
    pub fn add_turn(&self, user_id: &str, role: Role, text: &str) {
        self.add_turn_at(user_id, role, text, Utc::now());
    }

    /// Forget everything about `user_id`.
    pub fn clear_history(&self, user_id: &str) {
        if self.lock().remove(user_id).is_some() {
            tracing::debug!(user_id, "Cleared conversation history");
        }
    }

    pub(crate) fn get_history_at(&self, user_id: &str, now: DateTime<Utc>) -> Vec<Turn> {
        let mut entries = self.lock();
        self.prune(&mut entries, user_id, now)
    }

    pub(crate) fn add_turn_at(&self, user_id: &str, role: Role, text: &str, now: DateTime<Utc>) {
        let mut entries = self.lock();

        // Prune before capping so expired turns never take up a slot.
        let mut turns = self.prune(&mut entries, user_id, now);
        turns.push(Turn {
            role,
            text: text.to_string(),
            created_at: now,
        });

        if turns.len() > self.max_len {
            let excess = turns.len() - self.max_len;
            turns.drain(..excess);
        }

        entries.insert(user_id.to_string(), turns);
    }

    /// Number of users with an entry, including idle ones not yet pruned.
    pub fn user_count(&self) -> usize {
        self.lock().len()
    }

    fn prune(
        &self,
        entries: &mut HashMap<String, Vec<Turn>>,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Vec<Turn> {
        let Some(turns) = entries.get_mut(user_id) else {
            return Vec::new();
        };

        let before = turns.len();
        turns.retain(|turn| now - turn.created_at < self.ttl);
        if turns.len() != before {
            tracing::debug!(user_id, dropped = before - turns.len(), "Pruned expired turns");
        }

        turns.clone()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Turn>>> {
        // A poisoned map still holds valid turns; keep serving it.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_user_has_empty_history() {
        let store = HistoryStore::new();
        assert!(store.get_history("nobody").is_empty());
    }

    #[test]
    fn keeps_only_most_recent_turns_in_order() {
        let store = HistoryStore::new();
        let start = Utc::now();
        for i in 0..15 {
            store.add_turn_at(
                "u1",
                Role::User,
                &format!("msg {}", i),
                start + Duration::seconds(i),
            );
        }

        let history = store.get_history_at("u1", start + Duration::seconds(20));
        assert_eq!(history.len(), MAX_HISTORY_LENGTH);
        let texts: Vec<&str> = history.iter().map(|t| t.text.as_str()).collect();
        let expected: Vec<String> = (5..15).map(|i| format!("msg {}", i)).collect();
        assert_eq!(texts, expected);
    }

    #[test]
    fn expired_turns_are_pruned_persistently() {
        let store = HistoryStore::new();
        let start = Utc::now();
        store.add_turn_at("u1", Role::User, "old", start);
        store.add_turn_at("u1", Role::Model, "fresh", start + Duration::hours(23));

        let later = start + Duration::hours(25);
        let history = store.get_history_at("u1", later);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, "fresh");

        // Reading at an earlier instant cannot resurrect the dropped turn.
        let again = store.get_history_at("u1", start + Duration::hours(1));
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].text, "fresh");
    }

    #[test]
    fn expired_turns_do_not_consume_capacity() {
        let store = HistoryStore::with_limits(3, Duration::minutes(10));
        let start = Utc::now();
        store.add_turn_at("u1", Role::User, "a", start);
        store.add_turn_at("u1", Role::Model, "b", start);
        store.add_turn_at("u1", Role::User, "c", start);

        let later = start + Duration::minutes(11);
        store.add_turn_at("u1", Role::User, "d", later);
        let history = store.get_history_at("u1", later);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, "d");
    }

    #[test]
    fn clear_then_get_is_empty() {
        let store = HistoryStore::new();
        store.add_turn("u1", Role::User, "hi");
        store.clear_history("u1");
        assert!(store.get_history("u1").is_empty());

        // Idempotent
        store.clear_history("u1");
        store.clear_history("never-seen");
        assert!(store.get_history("u1").is_empty());
    }

    #[test]
    fn users_are_isolated() {
        let store = HistoryStore::new();
        store.add_turn("u1", Role::User, "one");
        store.add_turn("u2", Role::User, "two");
        assert_eq!(store.get_history("u1")[0].text, "one");
        assert_eq!(store.get_history("u2")[0].text, "two");
        assert_eq!(store.user_count(), 2);
    }
}
