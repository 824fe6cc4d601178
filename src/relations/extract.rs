//! Extraction of word distance constraints from the flat search form.
//!
//! The form encodes pairwise relations as `word_rel_<source>_<relid>`
//! (target slot), `word_from_<source>_<relid>` and `word_to_<source>_<relid>`
//! (signed distance bounds). This module turns that naming convention into
//! a typed constraint map up front, so no other code has to pattern-match
//! field names.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;
use tracing::debug;

/// Sentinel bounds for a relation missing one side: effectively
/// unconstrained in that direction.
pub const UNBOUNDED_FROM: i64 = -1000;
pub const UNBOUNDED_TO: i64 = 1000;

static RX_REL_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^word_(?:dist_)?(rel|from|to)_([0-9]+)_([0-9]+)$").unwrap());

/// Signed distance bounds for one slot pair, inclusive on both ends.
/// For a canonical pair `(a, b)` with `a < b`, the constrained quantity is
/// the position of `b` minus the position of `a`, in countable tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintRange {
    pub from: i64,
    pub to: i64,
}

impl ConstraintRange {
    /// Tightest range satisfying both constraints. May come out with
    /// `from > to`, which is the explicit unsatisfiable state.
    pub fn intersect(self, other: Self) -> Self {
        Self {
            from: self.from.max(other.from),
            to: self.to.min(other.to),
        }
    }

    /// The same constraint seen from the other slot of the pair.
    pub fn flipped(self) -> Self {
        Self {
            from: -self.to,
            to: -self.from,
        }
    }

    pub fn is_satisfiable(&self) -> bool {
        self.from <= self.to
    }

    pub fn contains(&self, length: i64) -> bool {
        self.from <= length && length <= self.to
    }
}

/// Merged pairwise distance constraints, keyed by canonical slot pairs
/// (smaller slot index first).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintMap {
    pairs: BTreeMap<(usize, usize), ConstraintRange>,
}

impl ConstraintMap {
    /// Parse constraints out of a flat request map. Malformed entries
    /// (non-integer values, non-positive slots, self-relations, relations
    /// with no bound at all) are discarded, never errors: the form sends
    /// plenty of unrelated fields through the same dictionary.
    pub fn from_request(query: &HashMap<String, String>) -> Self {
        #[derive(Default)]
        struct Pending {
            target: Option<usize>,
            from: Option<i64>,
            to: Option<i64>,
        }

        let mut groups: BTreeMap<(usize, usize), Pending> = BTreeMap::new();
        for (field, raw) in query {
            let Some(caps) = RX_REL_FIELD.captures(field) else {
                continue;
            };
            let Ok(value) = raw.trim().parse::<i64>() else {
                debug!(field = field.as_str(), value = raw.as_str(), "non-integer relation value");
                continue;
            };
            let (Ok(source), Ok(rel_id)) = (caps[2].parse::<usize>(), caps[3].parse::<usize>())
            else {
                continue;
            };
            if source == 0 {
                continue;
            }
            let entry = groups.entry((source, rel_id)).or_default();
            match &caps[1] {
                "rel" => {
                    // A target must be a different, existing slot.
                    if value <= 0 || value as usize == source {
                        continue;
                    }
                    entry.target = Some(value as usize);
                }
                "from" => entry.from = Some(value),
                "to" => entry.to = Some(value),
                _ => unreachable!("anchored pattern"),
            }
        }

        let mut pairs: BTreeMap<(usize, usize), ConstraintRange> = BTreeMap::new();
        for ((source, _), pending) in groups {
            let Some(target) = pending.target else {
                continue;
            };
            if pending.from.is_none() && pending.to.is_none() {
                continue;
            }
            let range = ConstraintRange {
                from: pending.from.unwrap_or(UNBOUNDED_FROM),
                to: pending.to.unwrap_or(UNBOUNDED_TO),
            };
            // Canonical order: smaller slot first, range reoriented.
            let (pair, range) = if target < source {
                ((target, source), range.flipped())
            } else {
                ((source, target), range)
            };
            pairs
                .entry(pair)
                .and_modify(|existing| *existing = existing.intersect(range))
                .or_insert(range);
        }
        Self { pairs }
    }

    /// Re-encode into the flat field format `from_request` accepts.
    /// Extraction is idempotent over this encoding.
    pub fn to_request(&self) -> HashMap<String, String> {
        let mut out = HashMap::new();
        for (rel_id, ((a, b), range)) in self.pairs.iter().enumerate() {
            let rel_id = rel_id + 1;
            out.insert(format!("word_rel_{a}_{rel_id}"), b.to_string());
            out.insert(format!("word_from_{a}_{rel_id}"), range.from.to_string());
            out.insert(format!("word_to_{a}_{rel_id}"), range.to.to_string());
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(usize, usize), &ConstraintRange)> {
        self.pairs.iter()
    }

    pub fn get(&self, pair: (usize, usize)) -> Option<ConstraintRange> {
        self.pairs.get(&pair).copied()
    }

    /// False iff some merged pair ended up with an empty range; such a
    /// pair can never match and the whole search short-circuits.
    pub fn is_satisfiable(&self) -> bool {
        self.pairs.values().all(ConstraintRange::is_satisfiable)
    }

    /// A slot present in every constrained pair, if one exists (the
    /// smallest such slot, for determinism).
    pub fn hub_slot(&self) -> Option<usize> {
        let mut common: Option<BTreeSet<usize>> = None;
        for &(a, b) in self.pairs.keys() {
            let pair_slots = BTreeSet::from([a, b]);
            let merged = match common {
                None => pair_slots,
                Some(c) => c.intersection(&pair_slots).copied().collect(),
            };
            if merged.is_empty() {
                return None;
            }
            common = Some(merged);
        }
        common.and_then(|c| c.into_iter().next())
    }

    /// The constraint graph is too complex for the engine-side range
    /// encoding when no single slot takes part in every pair.
    pub fn too_complex(&self) -> bool {
        !self.pairs.is_empty() && self.hub_slot().is_none()
    }

    /// Bounds on `pos(to_slot) - pos(from_slot)`, whichever way the pair
    /// is stored.
    pub fn range_between(&self, from_slot: usize, to_slot: usize) -> Option<ConstraintRange> {
        if from_slot < to_slot {
            self.get((from_slot, to_slot))
        } else {
            self.get((to_slot, from_slot)).map(ConstraintRange::flipped)
        }
    }

    /// Largest slot index mentioned by any pair.
    pub fn max_slot(&self) -> usize {
        self.pairs.keys().map(|&(_, b)| b).max().unwrap_or(0)
    }
}
