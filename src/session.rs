//! Per-session query state.
//!
//! The web layer is stateless per request except for this cache: the last
//! query a session ran, its extracted constraints, the sentence-id list a
//! pre-filter pass produced, and the random seed that keeps pagination
//! stable while the user pages through randomly ordered results.

use crate::query::builder::SearchRequest;
use crate::relations::extract::ConstraintMap;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

const CACHE_SIZE: usize = 256;

/// Everything a follow-up request (next page, same query) needs to avoid
/// recomputing or reshuffling.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub last_request: Option<SearchRequest>,
    pub constraints: ConstraintMap,
    /// Sentence ids collected by the adjacency pre-filter, when one ran.
    pub filtered_sent_ids: Option<Vec<String>>,
    pub page: usize,
    pub random_seed: Option<u64>,
}

/// LRU cache of session states, keyed by session id. Interior mutability
/// because the hosting layer shares one cache across request handlers.
pub struct SessionCache {
    states: Mutex<LruCache<String, SessionState>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::with_capacity(CACHE_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            states: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Current state for a session, default-initialized on first sight.
    pub fn get(&self, session_id: &str) -> SessionState {
        let mut states = match self.states.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        states
            .get_or_insert(session_id.to_string(), SessionState::default)
            .clone()
    }

    pub fn put(&self, session_id: &str, state: SessionState) {
        let mut states = match self.states.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        states.put(session_id.to_string(), state);
    }

    /// Update one session's state in place.
    pub fn update(&self, session_id: &str, f: impl FnOnce(&mut SessionState)) {
        let mut states = match self.states.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let state = states.get_or_insert_mut(session_id.to_string(), SessionState::default);
        f(state);
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new()
    }
}
