//! Interaction token cache
//!
//! Keyed by `"{agent_id}:{target_agent_id}"`. Entries are replaced, never
//! merged; validity is checked by the reader against the entry's expiry.

use crate::models::InteractionToken;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Cache key for an (agent, target agent) pair
pub fn cache_key(agent_id: &str, target_agent_id: &str) -> String {
    format!("{}:{}", agent_id, target_agent_id)
}

/// Key-value store behind the token cache
///
/// `get` and `set` must each be atomic for a single key. Concurrent misses
/// for the same key may both fetch; the last `set` wins.
pub trait TokenStore: Send + Sync {
    /// Current entry for `key`, expired or not
    fn get(&self, key: &str) -> Option<InteractionToken>;

    /// Replace the entry for `key`
    fn set(&self, key: String, token: InteractionToken);
}

/// In-memory token store, lives as long as its owner
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: RwLock<HashMap<String, InteractionToken>>,
}

impl MemoryTokenStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries, including expired ones
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Option<InteractionToken> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: String, token: InteractionToken) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, token);
    }
}
