#![no_main]

use korq::config::GrammarDict;
use korq::query::QueryCompiler;
use libfuzzer_sys::fuzz_target;
use std::collections::HashMap;

fuzz_target!(|data: &str| {
    // Arbitrary query strings must never panic, whatever mix of
    // operators, parentheses and metacharacters they contain.
    let compiler = QueryCompiler::new(GrammarDict::new(HashMap::from([(
        "nom".to_string(),
        "case".to_string(),
    )])));
    let _ = compiler.compile(data, "words.wf");
    let _ = compiler.compile(data, "words.ana.gr");
});
