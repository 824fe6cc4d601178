//! Full sentence-index query construction.
//!
//! Takes N word slots (each possibly empty), optional free-text and id
//! filters, paging and ordering options, and an optional distance
//! constraint map, and produces the complete engine request body. Each
//! non-empty slot becomes a named nested clause (`w1`, `w2`, ...) so its
//! match positions can be recovered from the response independently.
//!
//! When a satisfiable constraint map has a hub slot (one slot present in
//! every constrained pair), the distances are pushed into the engine as a
//! disjunction over hub pivot positions with position-range clauses on the
//! other slots; inner-hit names then carry the pivot suffix (`w2_7`).
//! Constraint graphs without a hub cannot be encoded this way and are left
//! to the post-filter.

use crate::config::CorpusSettings;
use crate::query::assembler::{and_together, nested_query, FieldQueryAssembler, WORD_PATH};
use crate::query::parser::{match_none, QueryCompiler};
use crate::relations::extract::ConstraintMap;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Word position field within the nested word object.
const SENTENCE_INDEX: &str = "words.sentence_index";

/// Result ordering requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Deterministic-seedable random scoring, stable across pages.
    #[default]
    Random,
    /// Engine-native order, no scoring wrapper.
    Plain,
}

/// Paging and ordering options for one search.
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// 1-based page number.
    pub page: usize,
    pub page_size: usize,
    pub sort: SortOrder,
    /// Seed for random ordering; the same seed yields the same order.
    pub random_seed: Option<u64>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
            sort: SortOrder::Random,
            random_seed: None,
        }
    }
}

/// One search form: per-slot interface fields plus sentence-level filters.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    /// Word slots, slot 1 first. Empty maps are allowed and skipped.
    pub slots: Vec<HashMap<String, String>>,
    /// Free-text constraint on the sentence baseline.
    pub free_text: Option<String>,
    /// Treat `free_text` as an exact phrase.
    pub precise_text: bool,
    /// Restrict to a document subset (subcorpus selection).
    pub doc_ids: Option<Vec<u64>>,
    /// Restrict to explicit sentence ids (pre-filter output).
    pub sent_ids: Option<Vec<String>>,
}

/// Builds complete sentence-index query bodies.
pub struct SentenceQueryBuilder<'a> {
    compiler: &'a QueryCompiler,
    settings: &'a CorpusSettings,
}

impl<'a> SentenceQueryBuilder<'a> {
    pub fn new(compiler: &'a QueryCompiler, settings: &'a CorpusSettings) -> Self {
        Self { compiler, settings }
    }

    /// Build the full request body. `distances`, when given, must already
    /// be the merged constraint map; an unsatisfiable map short-circuits
    /// to a match-nothing query without consulting the engine.
    pub fn build(
        &self,
        request: &SearchRequest,
        distances: Option<&ConstraintMap>,
        params: &SearchParams,
    ) -> Value {
        let core = self.core_query(request, distances);
        self.finalize(core, request, params)
    }

    fn core_query(&self, request: &SearchRequest, distances: Option<&ConstraintMap>) -> Value {
        if let Some(constraints) = distances {
            if !constraints.is_satisfiable() {
                warn!("unsatisfiable word distance constraints, matching nothing");
                return match_none();
            }
        }

        let assembler = FieldQueryAssembler::new(self.compiler, self.settings);
        let slot_queries: Vec<(usize, Value)> = request
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, fields)| {
                assembler.slot_query(fields, i + 1).map(|q| (i + 1, q))
            })
            .collect();

        let mut clauses = Vec::new();

        if !slot_queries.is_empty() {
            let word_part = match distances.filter(|c| !c.is_empty()) {
                Some(constraints) => match constraints.hub_slot() {
                    Some(hub) => self.pivot_encoded(&slot_queries, constraints, hub),
                    None => {
                        // No hub slot: the range trick cannot express the
                        // graph, so the engine query stays unconstrained
                        // and the adjacency post-filter decides.
                        debug!("constraint graph has no hub, leaving distances to post-filter");
                        self.plain_slots(&slot_queries)
                    }
                },
                None => self.plain_slots(&slot_queries),
            };
            clauses.push(word_part);
        }

        if let Some(text) = request.free_text.as_deref().filter(|t| !t.is_empty()) {
            let kind = if request.precise_text {
                "match_phrase"
            } else {
                "match"
            };
            clauses.push(json!({kind: {"text": text}}));
        }
        if let Some(doc_ids) = request.doc_ids.as_deref() {
            clauses.push(json!({"terms": {"doc_id": doc_ids}}));
        }
        if let Some(sent_ids) = request.sent_ids.as_deref() {
            clauses.push(json!({"ids": {"values": sent_ids}}));
        }

        if clauses.is_empty() {
            match_none()
        } else {
            and_together(clauses)
        }
    }

    /// All slot clauses AND together, each a named nested query.
    fn plain_slots(&self, slot_queries: &[(usize, Value)]) -> Value {
        let clauses = slot_queries
            .iter()
            .map(|(slot, q)| nested_query(WORD_PATH, q.clone(), Some(&format!("w{slot}"))))
            .collect();
        and_together(clauses)
    }

    /// Engine-side distance encoding: one disjunct per hub pivot position
    /// `p`, pinning the hub at `sentence_index == p` and every slot paired
    /// with the hub inside the pair's position range relative to `p`.
    fn pivot_encoded(
        &self,
        slot_queries: &[(usize, Value)],
        constraints: &ConstraintMap,
        hub: usize,
    ) -> Value {
        let mut branches = Vec::new();
        'pivots: for p in 0..self.settings.max_words_in_sentence {
            let p = p as i64;
            let mut clauses = Vec::with_capacity(slot_queries.len());
            for (slot, q) in slot_queries {
                let clause = if *slot == hub {
                    and_together(vec![
                        q.clone(),
                        json!({"term": {SENTENCE_INDEX: p}}),
                    ])
                } else if let Some(range) = constraints.range_between(hub, *slot) {
                    let lo = p + range.from;
                    let hi = p + range.to;
                    if hi < 0 {
                        // This pivot position leaves no room for the
                        // constrained slot.
                        continue 'pivots;
                    }
                    and_together(vec![
                        q.clone(),
                        json!({"range": {SENTENCE_INDEX: {"gte": lo.max(0), "lte": hi}}}),
                    ])
                } else {
                    q.clone()
                };
                clauses.push(nested_query(
                    WORD_PATH,
                    clause,
                    Some(&format!("w{slot}_{p}")),
                ));
            }
            branches.push(and_together(clauses));
        }
        json!({"bool": {"should": branches, "minimum_should_match": 1}})
    }

    /// Wrap the core query with ordering, paging, timeout and the
    /// distinct-document aggregation.
    fn finalize(&self, core: Value, request: &SearchRequest, params: &SearchParams) -> Value {
        let query = match params.sort {
            SortOrder::Random => {
                let random_score = match params.random_seed {
                    Some(seed) => json!({"seed": seed, "field": "_seq_no"}),
                    None => json!({}),
                };
                json!({
                    "function_score": {
                        "query": core,
                        "boost_mode": "replace",
                        "random_score": random_score
                    }
                })
            }
            SortOrder::Plain => core,
        };

        let page = params.page.max(1);
        let mut body = json!({
            "query": query,
            "from": (page - 1) * params.page_size,
            "size": params.page_size,
            "timeout": format!("{}s", self.settings.query_timeout),
            "aggs": {
                "agg_ndocs": {"cardinality": {"field": "doc_id"}}
            }
        });
        if request.free_text.as_deref().is_some_and(|t| !t.is_empty()) {
            body["highlight"] = json!({
                "fields": {
                    "text": {"number_of_fragments": 100, "fragment_size": 2048}
                }
            });
        }
        body
    }
}

/// Rewrite a built body into a hit-count probe: no hits, no ordering
/// noise, aggregation kept.
pub fn for_counting(mut body: Value) -> Value {
    body["from"] = json!(0);
    body["size"] = json!(0);
    body
}

/// Restrict a built body to the adjacency data needed by the pre-filter,
/// bounding response size: token types and forward adjacency only.
pub fn adjacency_only(mut body: Value) -> Value {
    body["_source"] = json!(["words.next_word", "words.wtype"]);
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GrammarDict;
    use crate::relations::extract::tests::constraint_map;

    fn fixtures() -> (QueryCompiler, CorpusSettings) {
        let compiler = QueryCompiler::new(GrammarDict::default());
        let settings = CorpusSettings {
            max_words_in_sentence: 3,
            ..CorpusSettings::default()
        };
        (compiler, settings)
    }

    fn slot(field: &str, value: &str) -> HashMap<String, String> {
        HashMap::from([(field.to_string(), value.to_string())])
    }

    #[test]
    fn test_single_slot_named_inner_hits() {
        let (compiler, settings) = fixtures();
        let builder = SentenceQueryBuilder::new(&compiler, &settings);
        let request = SearchRequest {
            slots: vec![slot("wf", "cat")],
            ..SearchRequest::default()
        };
        let body = builder.build(&request, None, &SearchParams::default());
        let nested = &body["query"]["function_score"]["query"]["nested"];
        assert_eq!(nested["path"], "words");
        assert_eq!(nested["inner_hits"]["name"], "w1");
        assert_eq!(nested["query"], json!({"match": {"words.wf": "cat"}}));
    }

    #[test]
    fn test_two_slots_and_together() {
        let (compiler, settings) = fixtures();
        let builder = SentenceQueryBuilder::new(&compiler, &settings);
        let request = SearchRequest {
            slots: vec![slot("wf", "cat"), slot("wf", "sat")],
            ..SearchRequest::default()
        };
        let params = SearchParams {
            sort: SortOrder::Plain,
            ..SearchParams::default()
        };
        let body = builder.build(&request, None, &params);
        let must = body["query"]["bool"]["must"].as_array().unwrap();
        assert_eq!(must.len(), 2);
        assert_eq!(must[0]["nested"]["inner_hits"]["name"], "w1");
        assert_eq!(must[1]["nested"]["inner_hits"]["name"], "w2");
    }

    #[test]
    fn test_empty_middle_slot_is_skipped() {
        let (compiler, settings) = fixtures();
        let builder = SentenceQueryBuilder::new(&compiler, &settings);
        let request = SearchRequest {
            slots: vec![slot("wf", "cat"), HashMap::new(), slot("wf", "sat")],
            ..SearchRequest::default()
        };
        let params = SearchParams {
            sort: SortOrder::Plain,
            ..SearchParams::default()
        };
        let body = builder.build(&request, None, &params);
        let must = body["query"]["bool"]["must"].as_array().unwrap();
        assert_eq!(must.len(), 2);
        // Slot numbering is preserved, not compacted.
        assert_eq!(must[1]["nested"]["inner_hits"]["name"], "w3");
    }

    #[test]
    fn test_pagination_and_timeout() {
        let (compiler, settings) = fixtures();
        let builder = SentenceQueryBuilder::new(&compiler, &settings);
        let request = SearchRequest {
            slots: vec![slot("wf", "cat")],
            ..SearchRequest::default()
        };
        let params = SearchParams {
            page: 3,
            page_size: 25,
            ..SearchParams::default()
        };
        let body = builder.build(&request, None, &params);
        assert_eq!(body["from"], 50);
        assert_eq!(body["size"], 25);
        assert_eq!(body["timeout"], "60s");
        assert_eq!(body["aggs"]["agg_ndocs"], json!({"cardinality": {"field": "doc_id"}}));
    }

    #[test]
    fn test_random_sort_is_seedable() {
        let (compiler, settings) = fixtures();
        let builder = SentenceQueryBuilder::new(&compiler, &settings);
        let request = SearchRequest {
            slots: vec![slot("wf", "cat")],
            ..SearchRequest::default()
        };
        let params = SearchParams {
            random_seed: Some(42),
            ..SearchParams::default()
        };
        let body = builder.build(&request, None, &params);
        assert_eq!(
            body["query"]["function_score"]["random_score"]["seed"],
            42
        );
        // Same seed, same body: stable pagination.
        assert_eq!(body, builder.build(&request, None, &params));
    }

    #[test]
    fn test_unsatisfiable_constraints_match_nothing() {
        let (compiler, settings) = fixtures();
        let builder = SentenceQueryBuilder::new(&compiler, &settings);
        let request = SearchRequest {
            slots: vec![slot("wf", "cat"), slot("wf", "sat")],
            ..SearchRequest::default()
        };
        let constraints = constraint_map(&[((1, 2), (3, 2))]);
        let params = SearchParams {
            sort: SortOrder::Plain,
            ..SearchParams::default()
        };
        let body = builder.build(&request, Some(&constraints), &params);
        assert_eq!(body["query"], match_none());
    }

    #[test]
    fn test_pivot_encoding_with_hub() {
        let (compiler, settings) = fixtures();
        let builder = SentenceQueryBuilder::new(&compiler, &settings);
        let request = SearchRequest {
            slots: vec![slot("wf", "cat"), slot("wf", "sat")],
            ..SearchRequest::default()
        };
        let constraints = constraint_map(&[((1, 2), (1, 2))]);
        let params = SearchParams {
            sort: SortOrder::Plain,
            ..SearchParams::default()
        };
        let body = builder.build(&request, Some(&constraints), &params);
        let branches = body["query"]["bool"]["should"].as_array().unwrap();
        // One disjunct per pivot position (max_words_in_sentence = 3).
        assert_eq!(branches.len(), 3);

        let first = branches[0]["bool"]["must"].as_array().unwrap();
        assert_eq!(first[0]["nested"]["inner_hits"]["name"], "w1_0");
        assert_eq!(first[1]["nested"]["inner_hits"]["name"], "w2_0");
        // Hub pinned at position 0; the other slot 1..2 words to the right.
        let hub_must = first[0]["nested"]["query"]["bool"]["must"]
            .as_array()
            .unwrap();
        assert_eq!(hub_must[1], json!({"term": {"words.sentence_index": 0}}));
        let other_must = first[1]["nested"]["query"]["bool"]["must"]
            .as_array()
            .unwrap();
        assert_eq!(
            other_must[1],
            json!({"range": {"words.sentence_index": {"gte": 1, "lte": 2}}})
        );
    }

    #[test]
    fn test_pivot_encoding_skips_impossible_positions() {
        let (compiler, settings) = fixtures();
        let builder = SentenceQueryBuilder::new(&compiler, &settings);
        let request = SearchRequest {
            slots: vec![slot("wf", "cat"), slot("wf", "sat")],
            ..SearchRequest::default()
        };
        // Slot 2 strictly to the left of slot 1: pivot 0 and 1 leave no
        // room for it.
        let constraints = constraint_map(&[((1, 2), (-3, -2))]);
        let params = SearchParams {
            sort: SortOrder::Plain,
            ..SearchParams::default()
        };
        let body = builder.build(&request, Some(&constraints), &params);
        let branches = body["query"]["bool"]["should"].as_array().unwrap();
        assert_eq!(branches.len(), 1); // only pivot position 2 survives
    }

    #[test]
    fn test_hubless_constraints_leave_query_plain() {
        let (compiler, settings) = fixtures();
        let builder = SentenceQueryBuilder::new(&compiler, &settings);
        let request = SearchRequest {
            slots: vec![
                slot("wf", "a"),
                slot("wf", "b"),
                slot("wf", "c"),
                slot("wf", "d"),
            ],
            ..SearchRequest::default()
        };
        let constraints = constraint_map(&[((1, 2), (0, 1)), ((3, 4), (0, 1))]);
        let params = SearchParams {
            sort: SortOrder::Plain,
            ..SearchParams::default()
        };
        let body = builder.build(&request, Some(&constraints), &params);
        let must = body["query"]["bool"]["must"].as_array().unwrap();
        assert_eq!(must.len(), 4);
        assert_eq!(must[0]["nested"]["inner_hits"]["name"], "w1");
    }

    #[test]
    fn test_free_text_and_filters() {
        let (compiler, settings) = fixtures();
        let builder = SentenceQueryBuilder::new(&compiler, &settings);
        let request = SearchRequest {
            slots: vec![slot("wf", "cat")],
            free_text: Some("the cat".to_string()),
            precise_text: true,
            doc_ids: Some(vec![3, 7]),
            sent_ids: Some(vec!["s1".to_string()]),
            ..SearchRequest::default()
        };
        let params = SearchParams {
            sort: SortOrder::Plain,
            ..SearchParams::default()
        };
        let body = builder.build(&request, None, &params);
        let must = body["query"]["bool"]["must"].as_array().unwrap();
        assert_eq!(must.len(), 4);
        assert_eq!(must[1], json!({"match_phrase": {"text": "the cat"}}));
        assert_eq!(must[2], json!({"terms": {"doc_id": [3, 7]}}));
        assert_eq!(must[3], json!({"ids": {"values": ["s1"]}}));
        assert_eq!(body["highlight"]["fields"]["text"]["fragment_size"], 2048);
    }

    #[test]
    fn test_no_constraints_at_all_matches_nothing() {
        let (compiler, settings) = fixtures();
        let builder = SentenceQueryBuilder::new(&compiler, &settings);
        let body = builder.build(
            &SearchRequest::default(),
            None,
            &SearchParams {
                sort: SortOrder::Plain,
                ..SearchParams::default()
            },
        );
        assert_eq!(body["query"], match_none());
    }

    #[test]
    fn test_counting_and_adjacency_rewrites() {
        let (compiler, settings) = fixtures();
        let builder = SentenceQueryBuilder::new(&compiler, &settings);
        let request = SearchRequest {
            slots: vec![slot("wf", "cat")],
            ..SearchRequest::default()
        };
        let body = builder.build(&request, None, &SearchParams::default());

        let count = for_counting(body.clone());
        assert_eq!(count["size"], 0);
        assert_eq!(count["from"], 0);

        let scan = adjacency_only(body);
        assert_eq!(
            scan["_source"],
            json!(["words.next_word", "words.wtype"])
        );
    }
}
