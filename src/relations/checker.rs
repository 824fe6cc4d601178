//! Post-hoc verification of distance constraints against search hits.
//!
//! The engine-side range encoding over-approximates: it constrains linear
//! sentence positions, while the constraints are about path lengths along
//! the token adjacency. Every constrained hit therefore gets re-checked
//! here against the actual `next_word` links. When the constraint graph
//! has no hub slot the engine cannot narrow at all, and a full adjacency
//! pre-filter pass collects the passing sentence ids up front.

use crate::config::CorpusSettings;
use crate::engine::response::{highlight_offsets, hit_id, hits, total_hits, TokenMatch};
use crate::engine::SearchEngine;
use crate::error::{Error, Result};
use crate::query::builder::{adjacency_only, for_counting};
use crate::relations::extract::ConstraintMap;
use crate::relations::reachability::{path_exists_with, Token};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, info};

pub struct ConstraintChecker<'a> {
    settings: &'a CorpusSettings,
}

impl<'a> ConstraintChecker<'a> {
    pub fn new(settings: &'a CorpusSettings) -> Self {
        Self { settings }
    }

    /// Decide whether one sentence hit satisfies every pairwise
    /// constraint. Each pair needs at least one combination of highlighted
    /// positions on its two slots with a conforming path between them; a
    /// pair whose slot has no highlights at all fails the sentence.
    pub fn check_hit(&self, hit: &Value, constraints: &ConstraintMap) -> bool {
        if constraints.is_empty() {
            return true;
        }
        let Some(words) = source_words(hit) else {
            debug!("hit without word source, rejecting");
            return false;
        };
        let offsets = highlight_offsets(hit);
        for (&(a, b), range) in constraints.iter() {
            let (Some(left), Some(right)) = (offsets.get(&a), offsets.get(&b)) else {
                return false;
            };
            if !self.pair_satisfied(&words, left, right, range.from, range.to) {
                return false;
            }
        }
        true
    }

    fn pair_satisfied(
        &self,
        words: &[Token],
        left: &BTreeSet<TokenMatch>,
        right: &BTreeSet<TokenMatch>,
        min: i64,
        max: i64,
    ) -> bool {
        left.iter().any(|l| {
            right.iter().any(|r| {
                path_exists_with(
                    words,
                    l.pos,
                    r.pos,
                    min,
                    max,
                    self.settings.count_punctuation,
                )
            })
        })
    }

    /// Adjacency pre-filter for hubless constraint graphs. Probes the
    /// candidate count first and refuses oversized sets; otherwise scans
    /// every candidate with a source restricted to adjacency data and
    /// returns the ids of the sentences that pass [`Self::check_hit`].
    pub fn filter_sentences(
        &self,
        engine: &dyn SearchEngine,
        index: &str,
        body: &Value,
        constraints: &ConstraintMap,
    ) -> Result<Vec<String>> {
        let count_response = engine.search(index, &for_counting(body.clone()))?;
        let found = total_hits(&count_response);
        let limit = self.settings.max_distance_filter;
        if found > limit {
            return Err(Error::CandidateSetTooLarge { found, limit });
        }
        info!(candidates = found, "adjacency pre-filter pass");

        let scan_body = adjacency_only(body.clone());
        let mut passing = Vec::new();
        for hit in engine.scan(index, &scan_body)? {
            let hit = hit?;
            if self.check_hit(&hit, constraints) {
                if let Some(id) = hit_id(&hit) {
                    passing.push(id.to_string());
                }
            }
        }
        debug!(passing = passing.len(), "pre-filter complete");
        Ok(passing)
    }
}

/// Deserialize the word array of a hit's source, tolerating fields the
/// checker does not need.
fn source_words(hit: &Value) -> Option<Vec<Token>> {
    let words = hit.pointer("/_source/words")?;
    serde_json::from_value(words.clone()).ok()
}

/// Convenience over a plain (non-scanning) response: ids of the hits that
/// satisfy the constraints.
pub fn passing_ids(
    checker: &ConstraintChecker<'_>,
    response: &Value,
    constraints: &ConstraintMap,
) -> Vec<String> {
    hits(response)
        .iter()
        .filter(|hit| checker.check_hit(hit, constraints))
        .filter_map(|hit| hit_id(hit).map(str::to_string))
        .collect()
}
