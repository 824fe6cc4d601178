//! Assembly of one word slot's field queries into a structured query.
//!
//! A slot carries up to four kinds of field constraints: the surface form,
//! the lemma, grammar tags and corpus-specific extra annotation fields.
//! Lemma, grammar and extra fields live inside the nested analysis object
//! and are queried through a nested query on the analysis path; the
//! surface form is a flat word-level field. Each partition combines with
//! AND, then the two partitions AND together.

use crate::config::CorpusSettings;
use crate::query::parser::{match_none, CompiledQuery, QueryCompiler};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tracing::debug;

/// Word-level nested path within a sentence document.
pub const WORD_PATH: &str = "words";
/// Analysis-level nested path within a word.
pub const ANA_PATH: &str = "words.ana";

/// Builds per-slot queries from raw interface field values.
pub struct FieldQueryAssembler<'a> {
    compiler: &'a QueryCompiler,
    settings: &'a CorpusSettings,
}

impl<'a> FieldQueryAssembler<'a> {
    pub fn new(compiler: &'a QueryCompiler, settings: &'a CorpusSettings) -> Self {
        Self { compiler, settings }
    }

    /// Interface field key -> indexed field path, or `None` for keys this
    /// corpus does not know.
    fn field_path(&self, key: &str) -> Option<String> {
        match key {
            "wf" => Some(format!("{WORD_PATH}.wf")),
            "lex" => Some(format!("{ANA_PATH}.lex")),
            "gr" => Some(format!("{ANA_PATH}.gr")),
            _ if self.settings.word_fields.iter().any(|f| f == key) => {
                Some(format!("{ANA_PATH}.{key}"))
            }
            _ => None,
        }
    }

    /// Assemble the query for one slot (the body later wrapped in the
    /// word-level nested clause by the sentence query builder).
    ///
    /// Returns `None` for a slot with no field constraints at all. A slot
    /// whose every constraint compiled to a dropped clause becomes
    /// match-nothing: the user did constrain it, and nothing satisfies it.
    pub fn slot_query(&self, fields: &HashMap<String, String>, slot: usize) -> Option<Value> {
        let mut ana_queries = Vec::new();
        let mut word_queries = Vec::new();
        let mut constrained = false;

        // Deterministic clause order regardless of map iteration.
        let mut keys: Vec<&String> = fields.keys().collect();
        keys.sort();

        for key in keys {
            let raw = &fields[key];
            if raw.is_empty() {
                continue;
            }
            let Some(path) = self.field_path(key) else {
                debug!(field = key.as_str(), "unknown interface field, ignoring");
                continue;
            };
            constrained = true;
            match self.compiler.compile(raw, &path) {
                CompiledQuery::Dropped => {}
                CompiledQuery::Body(body) => {
                    if path.starts_with(ANA_PATH) {
                        ana_queries.push(body);
                    } else {
                        word_queries.push(body);
                    }
                }
            }
        }

        if !constrained {
            return None;
        }
        if ana_queries.is_empty() && word_queries.is_empty() {
            // Every constraint was dropped (unknown tags).
            return Some(match_none());
        }

        if !ana_queries.is_empty() {
            let ana = and_together(ana_queries);
            // The analysis nesting gets its own inner hits so the index
            // of the matching analysis can be recovered later. The name
            // deliberately does not look like a slot key.
            word_queries.insert(
                0,
                nested_query(
                    ANA_PATH,
                    ana,
                    Some(&format!("w{slot}_ana")),
                ),
            );
        }
        Some(and_together(word_queries))
    }
}

/// AND a list of query bodies, avoiding a redundant bool wrapper for one.
pub fn and_together(mut queries: Vec<Value>) -> Value {
    if queries.len() == 1 {
        queries.remove(0)
    } else {
        json!({"bool": {"must": queries}})
    }
}

/// Wrap a query in a nested clause on `path`, with named highlighting
/// inner hits so match positions can be recovered from the response.
pub fn nested_query(path: &str, query: Value, inner_hits_name: Option<&str>) -> Value {
    let mut highlight_fields = Map::new();
    highlight_fields.insert(path.to_string(), json!({"number_of_fragments": 100}));

    let mut inner_hits = Map::new();
    if let Some(name) = inner_hits_name {
        inner_hits.insert("name".to_string(), Value::String(name.to_string()));
    }
    inner_hits.insert("size".to_string(), json!(50));
    inner_hits.insert(
        "highlight".to_string(),
        json!({"fields": Value::Object(highlight_fields)}),
    );

    json!({
        "nested": {
            "path": path,
            "query": query,
            "inner_hits": Value::Object(inner_hits)
        }
    })
}
