//! # korq - Corpus Search Query Core
//!
//! korq builds search-engine query bodies for a morphologically annotated
//! linguistic corpus and enforces word-relation distance constraints that
//! the engine cannot express on its own.
//!
//! ## Architecture
//!
//! The crate is organized into these main modules:
//!
//! - [`query`] - Boolean mini-language compiler, per-slot field assembly,
//!   multi-word sentence query building
//! - [`relations`] - Distance constraint extraction, adjacency
//!   reachability, per-sentence constraint checking
//! - [`engine`] - The search engine seam and response dissection helpers
//! - [`config`] - Corpus settings and the grammar tag dictionary
//! - [`session`] - Per-session query state (paging, seeds, pre-filter ids)
//!
//! ## Quick Start
//!
//! ```ignore
//! use korq::config::{CorpusSettings, GrammarDict};
//! use korq::query::{QueryCompiler, SearchParams, SearchRequest, SentenceQueryBuilder};
//! use std::collections::HashMap;
//!
//! let settings = CorpusSettings::from_file("conf/corpus.json").unwrap();
//! let compiler = QueryCompiler::new(GrammarDict::from_file("conf/categories.json").unwrap());
//!
//! let mut request = SearchRequest::default();
//! request.slots.push(HashMap::from([("wf".to_string(), "cat|dog".to_string())]));
//!
//! let builder = SentenceQueryBuilder::new(&compiler, &settings);
//! let body = builder.build(&request, None, &SearchParams::default());
//! println!("{}", serde_json::to_string_pretty(&body).unwrap());
//! ```
//!
//! ## Query Language
//!
//! Field values use a compact boolean syntax: `,` and `&` mean AND, `|`
//! means OR, a leading `~` negates the rest of its group, and parentheses
//! group. Terms containing regex metacharacters become regexp queries,
//! plain terms with `*`/`?` become wildcard queries, and everything else
//! becomes a match query. Grammar tags are additionally routed through a
//! per-corpus category dictionary.

pub mod config;
pub mod engine;
pub mod error;
pub mod query;
pub mod relations;
pub mod session;

pub use error::{Error, Result};
