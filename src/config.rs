//! Corpus configuration and the grammar category dictionary.
//!
//! Both files are loaded once at startup and passed around as read-only
//! references; nothing in the query core touches the filesystem after that.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Corpus-wide settings relevant to query construction and filtering
/// (a subset of the corpus configuration file).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorpusSettings {
    pub corpus_name: String,
    /// Extra word-level annotation fields queried inside the analysis object.
    pub word_fields: Vec<String>,
    /// Ceiling on the candidate count for the adjacency pre-filter.
    pub max_distance_filter: u64,
    /// Highest pivot position enumerated in engine-side distance queries.
    pub max_words_in_sentence: usize,
    /// Engine-native timeout attached to search and scan bodies, in seconds.
    pub query_timeout: u64,
    /// Whether punctuation tokens count towards word distances.
    pub count_punctuation: bool,
}

impl Default for CorpusSettings {
    fn default() -> Self {
        Self {
            corpus_name: String::new(),
            word_fields: Vec::new(),
            max_distance_filter: 100_000,
            max_words_in_sentence: 40,
            query_timeout: 60,
            count_punctuation: false,
        }
    }
}

impl CorpusSettings {
    /// Load settings from a JSON file (`corpus.json` in the settings
    /// directory). Missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Grammar tag -> category name lookup, e.g. `"nom" -> "case"`.
///
/// Used by the query compiler to route a tag to the per-category keyword
/// subfield it is indexed under. Injected into the compiler rather than
/// read from a global so the compiler is testable without the filesystem.
#[derive(Debug, Clone, Default)]
pub struct GrammarDict {
    categories: HashMap<String, String>,
}

impl GrammarDict {
    pub fn new(categories: HashMap<String, String>) -> Self {
        Self { categories }
    }

    /// Load the dictionary from a JSON file (`categories.json`).
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let categories =
            serde_json::from_str(&data).map_err(|source| Error::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self { categories })
    }

    /// Category name for a grammar tag, if the tag is known.
    pub fn category(&self, tag: &str) -> Option<&str> {
        self.categories.get(tag).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let s: CorpusSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(s.max_distance_filter, 100_000);
        assert_eq!(s.max_words_in_sentence, 40);
        assert!(!s.count_punctuation);
    }

    #[test]
    fn test_settings_partial_override() {
        let s: CorpusSettings =
            serde_json::from_str(r#"{"corpus_name": "udmurt", "max_distance_filter": 500}"#)
                .unwrap();
        assert_eq!(s.corpus_name, "udmurt");
        assert_eq!(s.max_distance_filter, 500);
        assert_eq!(s.query_timeout, 60);
    }

    #[test]
    fn test_grammar_dict_lookup() {
        let dict = GrammarDict::new(HashMap::from([
            ("nom".to_string(), "case".to_string()),
            ("sg".to_string(), "number".to_string()),
        ]));
        assert_eq!(dict.category("nom"), Some("case"));
        assert_eq!(dict.category("acc"), None);
    }
}
