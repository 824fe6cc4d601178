//! Word relation constraints: extraction from the flat request format,
//! distance evaluation over token adjacency, and per-sentence checking.

pub mod checker;
pub mod extract;
pub mod reachability;

pub use checker::ConstraintChecker;
pub use extract::{ConstraintMap, ConstraintRange};
pub use reachability::{path_exists, reachable_lengths, NextWord, Token};
