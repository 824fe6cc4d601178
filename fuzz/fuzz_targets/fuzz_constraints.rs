#![no_main]

use korq::relations::ConstraintMap;
use libfuzzer_sys::fuzz_target;
use std::collections::HashMap;

fuzz_target!(|data: Vec<(String, String)>| {
    // Constraint extraction over arbitrary form fields must never panic,
    // and re-extraction from its own encoding must be a fixed point.
    let form: HashMap<String, String> = data.into_iter().collect();
    let constraints = ConstraintMap::from_request(&form);
    let again = ConstraintMap::from_request(&constraints.to_request());
    assert_eq!(constraints, again);
});
