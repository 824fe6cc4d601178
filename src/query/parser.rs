//! Compiler for the per-field boolean mini-language.
//!
//! Search forms accept small infix expressions over one field, e.g.
//! `(dog|cat*),~mouse`: `,` and `&` are conjunction, `|` is disjunction,
//! a prefix `~` negates everything to its right up to the enclosing group
//! boundary, and parentheses group. Operator choice is purely positional:
//! the first top-level operator found scanning left to right wins, so
//! mixed operators without parentheses associate strictly left to right.
//!
//! Bad user input never raises: unbalanced parentheses compile to a
//! match-nothing body, and an unknown grammar tag drops its clause.

use crate::config::GrammarDict;
use serde_json::{Map, Value};
use tracing::debug;

/// Characters that disqualify a term from an exact match query.
const SPECIAL_CHARS: &[char] = &[
    '[', ']', '(', ')', '*', '\\', '{', '}', '^', '$', '.', '?', '+', '~', '|',
];

/// Characters the engine's wildcard operator cannot digest; a term
/// containing any of them goes to the regexp operator instead.
const UNSAFE_CHARS: &[char] = &['[', ']', '\\', '{', '}', '^', '$', '.', '+'];

/// Result of compiling one clause.
///
/// `Dropped` and a match-nothing body are different things: dropping
/// removes the clause from its enclosing conjunction, while match-nothing
/// poisons the conjunction. Callers must not conflate them.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledQuery {
    /// The clause referenced an unknown grammar tag; drop it.
    Dropped,
    /// A concrete engine query body.
    Body(Value),
}

impl CompiledQuery {
    pub fn is_dropped(&self) -> bool {
        matches!(self, CompiledQuery::Dropped)
    }

    pub fn into_body(self) -> Option<Value> {
        match self {
            CompiledQuery::Dropped => None,
            CompiledQuery::Body(body) => Some(body),
        }
    }
}

/// A query body matching no documents.
pub fn match_none() -> Value {
    single_key("match_none", Value::Object(Map::new()))
}

/// Compiles mini-language expressions against an injected grammar
/// category dictionary.
#[derive(Debug, Clone, Default)]
pub struct QueryCompiler {
    gram_dict: GrammarDict,
}

impl QueryCompiler {
    pub fn new(gram_dict: GrammarDict) -> Self {
        Self { gram_dict }
    }

    /// Compile a whole expression for `field`. Spaces are layout-only and
    /// stripped before parsing; parenthesis balance is checked once, here.
    pub fn compile(&self, text: &str, field: &str) -> CompiledQuery {
        let chars: Vec<char> = text.chars().filter(|&c| c != ' ').collect();
        let opened = chars.iter().filter(|&&c| c == '(').count();
        let closed = chars.iter().filter(|&&c| c == ')').count();
        if opened != closed {
            debug!(query = text, "unbalanced parentheses, matching nothing");
            return CompiledQuery::Body(match_none());
        }
        self.bool_query(&chars, 0, chars.len(), field)
    }

    /// Recursive step over the `[start, end)` window of `chars`.
    fn bool_query(&self, chars: &[char], start: usize, end: usize, field: &str) -> CompiledQuery {
        if start >= end {
            return CompiledQuery::Body(match_none());
        }
        let Some((op_pos, op)) = find_operator(chars, start, end) else {
            // No top-level operator: unwrap one parenthesis pair or treat
            // the window as a single term.
            if chars[start] == '(' && chars[end - 1] == ')' {
                return self.bool_query(chars, start + 1, end - 1, field);
            }
            let term: String = chars[start..end].iter().collect();
            return self.term_query(&term, field);
        };

        if op == '~' {
            return self.negation(chars, start + 1, end, field);
        }

        let left = self.bool_query(chars, start, op_pos, field);
        let right = self.bool_query(chars, op_pos + 1, end, field);
        let (CompiledQuery::Body(left), CompiledQuery::Body(right)) = (left, right) else {
            // A dropped operand drops the whole combination. For `|` this
            // mirrors conjunction on purpose; see DESIGN.md.
            return CompiledQuery::Dropped;
        };
        let kind = if op == '|' { "should" } else { "must" };
        CompiledQuery::Body(bool_clause(kind, vec![left, right]))
    }

    /// Everything right of a leading `~` up to the window end is the
    /// negation scope. A parenthesis-free scope splits on `|` into
    /// independently negated terms; anything else recurses as one nested
    /// query under a single must-not.
    fn negation(&self, chars: &[char], start: usize, end: usize, field: &str) -> CompiledQuery {
        let scope = &chars[start..end];
        if scope.iter().any(|&c| c == '(' || c == ')') {
            return match self.bool_query(chars, start, end, field) {
                CompiledQuery::Dropped => CompiledQuery::Dropped,
                CompiledQuery::Body(inner) => {
                    CompiledQuery::Body(bool_clause("must_not", vec![inner]))
                }
            };
        }
        let mut must_not = Vec::new();
        for part in scope.split(|&c| c == '|') {
            let term: String = part.iter().collect();
            match self.term_query(&term, field) {
                // Unknown tags under negation are skipped, not kept as
                // empty clauses the engine would reject.
                CompiledQuery::Dropped => {}
                CompiledQuery::Body(body) => must_not.push(body),
            }
        }
        if must_not.is_empty() {
            CompiledQuery::Dropped
        } else {
            CompiledQuery::Body(bool_clause("must_not", must_not))
        }
    }

    /// Classify a single literal term and build its leaf query.
    fn term_query(&self, text: &str, field: &str) -> CompiledQuery {
        if text.is_empty() {
            return CompiledQuery::Dropped;
        }
        if is_grammar_field(field) {
            return match self.gram_dict.category(text) {
                Some(category) => {
                    let subfield = format!("{field}.{category}");
                    CompiledQuery::Body(leaf("match", &subfield, text))
                }
                None => {
                    debug!(tag = text, field, "unknown grammar tag, dropping clause");
                    CompiledQuery::Dropped
                }
            };
        }
        if !text.contains(SPECIAL_CHARS) {
            CompiledQuery::Body(leaf("match", field, text))
        } else if !text.contains(UNSAFE_CHARS) {
            CompiledQuery::Body(leaf("wildcard", field, text))
        } else {
            CompiledQuery::Body(leaf("regexp", field, text))
        }
    }
}

/// Grammar-tag fields get per-category subfield routing.
fn is_grammar_field(field: &str) -> bool {
    field == "ana.gr" || field.ends_with(".ana.gr")
}

/// First top-level operator in the `[start, end)` window: a `~` at the
/// window start short-circuits; otherwise the first `,`, `&` or `|` at
/// parenthesis depth zero wins.
fn find_operator(chars: &[char], start: usize, end: usize) -> Option<(usize, char)> {
    if chars[start] == '~' {
        return Some((start, '~'));
    }
    let mut depth = 0i32;
    for (i, &c) in chars.iter().enumerate().take(end).skip(start) {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' | '&' | '|' if depth == 0 => return Some((i, c)),
            _ => {}
        }
    }
    None
}

fn single_key(key: &str, value: Value) -> Value {
    let mut obj = Map::new();
    obj.insert(key.to_string(), value);
    Value::Object(obj)
}

fn leaf(kind: &str, field: &str, text: &str) -> Value {
    single_key(kind, single_key(field, Value::String(text.to_string())))
}

fn bool_clause(kind: &str, clauses: Vec<Value>) -> Value {
    single_key("bool", single_key(kind, Value::Array(clauses)))
}
