//! Structural helpers for engine responses.
//!
//! Responses are nested, engine-defined JSON whose exact shape changes
//! between engine versions, so everything here works by structural
//! recursion rather than fixed paths. The one generic traversal
//! ([`find_objects`]) is shared by highlight-offset extraction and any
//! future leaf-hunting need.

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

/// Inner-hit keys that identify a query word slot: `w3` or, when the
/// builder enumerated pivot positions, `w3_17`.
static RX_SLOT_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^w([0-9]+)(_[0-9]+)?$").unwrap());

/// One highlighted token occurrence: the token position within the
/// sentence and, when the match happened inside a nested analysis, the
/// index of that analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TokenMatch {
    pub pos: usize,
    pub ana: Option<usize>,
}

/// Find every JSON object below `root` satisfying `pred`, together with
/// the object-key path leading to it (array indices contribute no path
/// segment). Depth-first, document order.
pub fn find_objects<'a>(
    root: &'a Value,
    pred: &dyn Fn(&Map<String, Value>) -> bool,
) -> Vec<(Vec<&'a str>, &'a Map<String, Value>)> {
    let mut found = Vec::new();
    let mut path = Vec::new();
    walk(root, pred, &mut path, &mut found);
    found
}

fn walk<'a>(
    value: &'a Value,
    pred: &dyn Fn(&Map<String, Value>) -> bool,
    path: &mut Vec<&'a str>,
    found: &mut Vec<(Vec<&'a str>, &'a Map<String, Value>)>,
) {
    match value {
        Value::Object(obj) => {
            if pred(obj) {
                found.push((path.clone(), obj));
            }
            for (key, child) in obj {
                path.push(key.as_str());
                walk(child, pred, path, found);
                path.pop();
            }
        }
        Value::Array(items) => {
            for child in items {
                walk(child, pred, path, found);
            }
        }
        _ => {}
    }
}

/// Recover per-slot highlight offsets from one sentence hit.
///
/// Matched words surface as leaf objects carrying `"field": "words"` and a
/// numeric `"offset"`, nested arbitrarily deep inside `inner_hits`. The
/// slot a leaf belongs to is the first ancestor key of the form
/// `w<slot>[_<pos>]`; leaves below a second, conflicting slot key are
/// skipped (they belong to highlights of a different query word echoed
/// inside this one's subtree). Leaves with no slot ancestor map to slot 0.
pub fn highlight_offsets(hit: &Value) -> HashMap<usize, BTreeSet<TokenMatch>> {
    let root = hit.get("inner_hits").unwrap_or(hit);
    let mut offsets: HashMap<usize, BTreeSet<TokenMatch>> = HashMap::new();

    let is_word_leaf = |obj: &Map<String, Value>| {
        obj.get("field").and_then(Value::as_str) == Some("words")
            && obj.get("offset").and_then(Value::as_u64).is_some()
    };

    for (path, leaf) in find_objects(root, &is_word_leaf) {
        let Some(slot) = slot_from_path(&path) else {
            continue;
        };
        let Some(pos) = leaf.get("offset").and_then(Value::as_u64) else {
            continue;
        };
        let pos = pos as usize;
        let ana = leaf
            .get("_nested")
            .and_then(|n| {
                (n.get("field").and_then(Value::as_str) == Some("ana"))
                    .then(|| n.get("offset"))
                    .flatten()
            })
            .and_then(Value::as_u64)
            .map(|o| o as usize);
        offsets
            .entry(slot)
            .or_default()
            .insert(TokenMatch { pos, ana });
    }
    offsets
}

/// Slot number from an ancestor key path: the first `w<n>[_<pos>]` key
/// wins; a later key naming a different slot disqualifies the leaf.
fn slot_from_path(path: &[&str]) -> Option<usize> {
    let mut slot: Option<usize> = None;
    for key in path {
        if let Some(caps) = RX_SLOT_KEY.captures(key) {
            let n: usize = caps[1].parse().ok()?;
            match slot {
                None => slot = Some(n),
                Some(first) if first != n => return None,
                Some(_) => {}
            }
        }
    }
    Some(slot.unwrap_or(0))
}

/// Total hit count of a search response, zero when absent.
pub fn total_hits(response: &Value) -> u64 {
    response
        .pointer("/hits/total/value")
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// The hit objects of a search response, empty when absent.
pub fn hits(response: &Value) -> &[Value] {
    response
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Document id of one hit.
pub fn hit_id(hit: &Value) -> Option<&str> {
    hit.get("_id").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_find_objects_tracks_key_path() {
        let doc = json!({"a": {"b": [{"leaf": 1}]}});
        let found = find_objects(&doc, &|o| o.contains_key("leaf"));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, vec!["a", "b"]);
    }

    #[test]
    fn test_highlight_offsets_simple() {
        let hit = json!({
            "inner_hits": {
                "w1": {
                    "hits": {
                        "hits": [
                            {"_nested": {"field": "words", "offset": 2},
                             "field": "words", "offset": 2}
                        ]
                    }
                }
            }
        });
        let offsets = highlight_offsets(&hit);
        assert_eq!(
            offsets[&1],
            BTreeSet::from([TokenMatch { pos: 2, ana: None }])
        );
    }

    #[test]
    fn test_highlight_offsets_positional_suffix_and_ana() {
        // Pivot-enumerated inner-hit keys carry a position suffix; the
        // slot number is still the leading part.
        let hit = json!({
            "inner_hits": {
                "w2_7": {
                    "hits": {"hits": [
                        {"field": "words", "offset": 5,
                         "_nested": {"field": "ana", "offset": 1}}
                    ]}
                }
            }
        });
        let offsets = highlight_offsets(&hit);
        assert_eq!(
            offsets[&2],
            BTreeSet::from([TokenMatch { pos: 5, ana: Some(1) }])
        );
    }

    #[test]
    fn test_highlight_offsets_conflicting_slot_keys_skipped() {
        // A w2 subtree echoed under w1 must not contribute w1 offsets.
        let hit = json!({
            "inner_hits": {
                "w1": {
                    "w2": {"field": "words", "offset": 9},
                    "hits": {"hits": [{"field": "words", "offset": 3}]}
                }
            }
        });
        let offsets = highlight_offsets(&hit);
        assert_eq!(
            offsets[&1],
            BTreeSet::from([TokenMatch { pos: 3, ana: None }])
        );
        assert!(!offsets.contains_key(&2));
    }

    #[test]
    fn test_highlight_offsets_merges_same_slot() {
        let hit = json!({
            "inner_hits": {
                "w1_0": {"hits": {"hits": [{"field": "words", "offset": 1}]}},
                "w1_4": {"hits": {"hits": [{"field": "words", "offset": 4}]}}
            }
        });
        let offsets = highlight_offsets(&hit);
        assert_eq!(offsets[&1].len(), 2);
    }

    #[test]
    fn test_total_hits_and_ids() {
        let resp = json!({
            "hits": {
                "total": {"value": 3, "relation": "eq"},
                "hits": [{"_id": "s1"}, {"_id": "s2"}]
            }
        });
        assert_eq!(total_hits(&resp), 3);
        let ids: Vec<_> = hits(&resp).iter().filter_map(hit_id).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
    }

    #[test]
    fn test_total_hits_missing_is_zero() {
        assert_eq!(total_hits(&json!({})), 0);
        assert!(hits(&json!({"hits": {}})).is_empty());
    }
}
