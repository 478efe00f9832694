//! In-memory session-to-token table.
//!
//! One live token per session: inserting for an existing session overwrites
//! the previous entry. Entries are removed lazily (expiry detected during
//! validation) and periodically (the manager's sweep task). Validation never
//! trusts sweep timing — an entry may transiently outlive `max_age` between
//! sweeps, so age is always re-checked at lookup time.

use parking_lot::RwLock;
use std::collections::HashMap;

/// A stored token and its creation time.
#[derive(Debug, Clone)]
pub struct StoredToken {
    /// Hex-encoded token value
    pub value: String,
    /// Creation time, milliseconds since epoch
    pub issued_at_ms: i64,
}

impl StoredToken {
    /// Age of this entry relative to `now_ms`, saturating at zero.
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        (now_ms - self.issued_at_ms).max(0)
    }
}

/// Thread-safe session-keyed token table.
#[derive(Default)]
pub struct TokenStore {
    entries: RwLock<HashMap<String, StoredToken>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a token for a session, replacing any prior token.
    pub fn insert(&self, session_id: &str, value: String, issued_at_ms: i64) {
        self.entries.write().insert(
            session_id.to_string(),
            StoredToken {
                value,
                issued_at_ms,
            },
        );
    }

    /// Look up the token stored for a session.
    pub fn get(&self, session_id: &str) -> Option<StoredToken> {
        self.entries.read().get(session_id).cloned()
    }

    /// Remove a session's entry.
    pub fn remove(&self, session_id: &str) {
        self.entries.write().remove(session_id);
    }

    /// Remove every entry older than `max_age_ms`. Returns the number removed.
    pub fn sweep_expired(&self, now_ms: i64, max_age_ms: i64) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, token| token.age_ms(now_ms) <= max_age_ms);
        before - entries.len()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
