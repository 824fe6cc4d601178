//! The search engine seam.
//!
//! The engine is an external collaborator: an inverted-index document store
//! that accepts JSON query bodies and returns JSON responses whose exact
//! nesting is version-dependent. This module defines the narrow trait the
//! rest of the crate talks through, plus helpers for picking responses
//! apart without relying on a fixed shape.

pub mod response;

use serde_json::Value;

/// Errors raised by the engine connection. Fatal for the current request;
/// the core never retries (a surrounding layer may).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    #[error("engine timed out after {0}s")]
    Timeout(u64),
}

/// Query-execution primitives the corpus search core needs from the
/// document store. Implementations wrap a concrete engine client; tests
/// use a canned-response mock.
pub trait SearchEngine {
    /// Execute one query against an index and return the raw response.
    fn search(&self, index: &str, body: &Value) -> Result<Value, EngineError>;

    /// Stream all documents matching a query, without a size ceiling.
    /// Used only by the adjacency pre-filter; the body is expected to
    /// carry an engine-native timeout.
    fn scan<'a>(
        &'a self,
        index: &'a str,
        body: &Value,
    ) -> Result<Box<dyn Iterator<Item = Result<Value, EngineError>> + 'a>, EngineError>;
}
