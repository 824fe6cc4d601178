//! Syntactic-distance computation over the token adjacency of a sentence.
//!
//! Tokens carry a `next_word` link: either a single following position or,
//! where the annotation branches, an array of them. Distances between two
//! positions are the step counts of every forward path between them, where
//! a step counts only if it lands on a countable token. Traversal is always
//! forward along the links; asking for the distance against the links
//! yields the negated forward lengths.

use serde::Deserialize;
use std::collections::BTreeSet;

/// Forward adjacency of one token. Annotation tools emit a bare integer
/// for linear text and an array where the token order branches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum NextWord {
    One(usize),
    Many(Vec<usize>),
}

impl NextWord {
    fn successors(&self) -> &[usize] {
        match self {
            NextWord::One(n) => std::slice::from_ref(n),
            NextWord::Many(v) => v,
        }
    }
}

/// The slice of a token a distance check needs: its type and its links.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Token {
    #[serde(default)]
    pub wtype: String,
    #[serde(default)]
    pub next_word: Option<NextWord>,
}

impl Token {
    /// Whether stepping onto this token advances the distance counter.
    fn countable(&self, count_punctuation: bool) -> bool {
        count_punctuation || self.wtype == "word"
    }
}

/// All path lengths from `pos_from` to `pos_to` along forward links,
/// as signed counts: positive when the target lies down the links from
/// the source, negated when the query asked for the opposite direction.
///
/// Out-of-range positions yield the empty set; identical positions yield
/// `{0}`.
pub fn reachable_lengths(
    words: &[Token],
    pos_from: usize,
    pos_to: usize,
    count_punctuation: bool,
) -> BTreeSet<i64> {
    if pos_from >= words.len() || pos_to >= words.len() {
        return BTreeSet::new();
    }
    if pos_from == pos_to {
        return BTreeSet::from([0]);
    }
    let mut lengths = BTreeSet::new();
    let mut visited = vec![false; words.len()];
    forward_walk(
        words,
        pos_from,
        pos_to,
        count_punctuation,
        0,
        &mut visited,
        &mut lengths,
    );
    if !lengths.is_empty() {
        return lengths;
    }
    // Not ahead of the source, so try from the target instead and flip
    // the sign of whatever comes back.
    forward_walk(
        words,
        pos_to,
        pos_from,
        count_punctuation,
        0,
        &mut visited,
        &mut lengths,
    );
    lengths.into_iter().map(|l| -l).collect()
}

fn forward_walk(
    words: &[Token],
    current: usize,
    target: usize,
    count_punctuation: bool,
    length: i64,
    visited: &mut [bool],
    lengths: &mut BTreeSet<i64>,
) {
    if visited[current] {
        return;
    }
    visited[current] = true;
    let successors = words[current]
        .next_word
        .as_ref()
        .map(NextWord::successors)
        .unwrap_or(&[]);
    for &next in successors {
        if next >= words.len() {
            continue;
        }
        let step = i64::from(words[next].countable(count_punctuation));
        if next == target {
            lengths.insert(length + step);
        } else {
            forward_walk(
                words,
                next,
                target,
                count_punctuation,
                length + step,
                visited,
                lengths,
            );
        }
    }
    visited[current] = false;
}

/// Whether some path between the two positions has a length inside
/// `[min, max]` inclusive.
pub fn path_exists(
    words: &[Token],
    pos_from: usize,
    pos_to: usize,
    min: i64,
    max: i64,
) -> bool {
    reachable_lengths(words, pos_from, pos_to, false)
        .into_iter()
        .any(|l| min <= l && l <= max)
}

/// `path_exists` with the punctuation-counting policy made explicit.
pub fn path_exists_with(
    words: &[Token],
    pos_from: usize,
    pos_to: usize,
    min: i64,
    max: i64,
    count_punctuation: bool,
) -> bool {
    reachable_lengths(words, pos_from, pos_to, count_punctuation)
        .into_iter()
        .any(|l| min <= l && l <= max)
}
