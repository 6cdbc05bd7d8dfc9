//! Bounded per-conversation history.
//!
//! The pipeline keeps a rolling window of recent turns per conversation key
//! so the assembler can hand the generation service some short-term context.
//! The store is explicit and keyed: one mutex-guarded list per key, so each
//! read or write is serialized per key and no push is ever lost. A full
//! snapshot-then-push cycle is not atomic; two messages racing on the same
//! key can interleave between the read and the write, which is an accepted
//! limitation. History is in-memory only and never persisted.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::{ChatMessage, Role};

/// Keyed store of bounded conversation histories.
pub struct HistoryStore {
    max_turns: usize,
    inner: Mutex<HashMap<String, Arc<Mutex<Vec<ChatMessage>>>>>,
}

impl HistoryStore {
    /// Create a store with a per-key turn cap. Oldest turns evict first.
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// The per-key entry, created on first use. Each store operation locks
    /// the entry only for its own duration.
    async fn entry(&self, key: &str) -> Arc<Mutex<Vec<ChatMessage>>> {
        let mut map = self.inner.lock().await;
        map.entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
            .clone()
    }

    /// Snapshot the current history for a key, oldest first.
    pub async fn snapshot(&self, key: &str) -> Vec<ChatMessage> {
        let entry = self.entry(key).await;
        let guard = entry.lock().await;
        guard.clone()
    }

    /// Append one exchange (user message, assistant reply) and evict from
    /// the front down to the cap.
    pub async fn push_exchange(&self, key: &str, user_text: &str, assistant_text: &str) {
        let entry = self.entry(key).await;
        let mut guard = entry.lock().await;
        guard.push(ChatMessage::user(user_text));
        guard.push(ChatMessage::assistant(assistant_text));
        let len = guard.len();
        if len > self.max_turns {
            guard.drain(..len - self.max_turns);
        }
    }

    /// Append a single turn (used by tests and non-paired flows).
    pub async fn push(&self, key: &str, role: Role, text: &str) {
        let entry = self.entry(key).await;
        let mut guard = entry.lock().await;
        guard.push(ChatMessage {
            role,
            content: text.to_string(),
        });
        let len = guard.len();
        if len > self.max_turns {
            guard.drain(..len - self.max_turns);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cap_evicts_oldest_first() {
        let store = HistoryStore::new(20);
        for i in 0..25 {
            store.push("chat1", Role::User, &format!("turn {}", i)).await;
        }

        let history = store.snapshot("chat1").await;
        assert_eq!(history.len(), 20);
        // The most recent 20 remain, oldest-first.
        assert_eq!(history.first().unwrap().content, "turn 5");
        assert_eq!(history.last().unwrap().content, "turn 24");
    }

    #[tokio::test]
    async fn test_keys_are_isolated() {
        let store = HistoryStore::new(10);
        store.push_exchange("a", "hi", "hello").await;
        store.push_exchange("b", "yo", "hey").await;

        let a = store.snapshot("a").await;
        let b = store.snapshot("b").await;
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 2);
        assert_eq!(a[0].content, "hi");
        assert_eq!(b[0].content, "yo");
    }

    #[tokio::test]
    async fn test_exchange_roles_alternate() {
        let store = HistoryStore::new(10);
        store.push_exchange("c", "question", "answer").await;

        let history = store.snapshot("c").await;
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_unknown_key_is_empty() {
        let store = HistoryStore::new(10);
        assert!(store.snapshot("never-seen").await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_exchanges_on_one_key_all_recorded() {
        // Individual operations are serialized per key: racing pushes may
        // land in either order but neither is lost.
        let store = std::sync::Arc::new(HistoryStore::new(10));
        let a = {
            let store = store.clone();
            tokio::spawn(async move { store.push_exchange("k", "u1", "a1").await })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move { store.push_exchange("k", "u2", "a2").await })
        };
        a.await.unwrap();
        b.await.unwrap();

        let history = store.snapshot("k").await;
        assert_eq!(history.len(), 4);
        // Each exchange stays contiguous: user then its assistant reply.
        for pair in history.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
            assert_eq!(
                pair[1].content.trim_start_matches('a'),
                pair[0].content.trim_start_matches('u')
            );
        }
    }
}
