//! Fuzz target for initializer construction.
//!
//! Arbitrary JSON as the unique field names must either be accepted as a
//! list of distinct non-empty strings or rejected with a configuration
//! error, never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use serde_json::Value;

use strictdb::CollectionInitializer;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<Value>(data) else {
        return;
    };

    match CollectionInitializer::new("fuzz", value) {
        Ok(init) => {
            let names = init.unique_field_names();
            let distinct: std::collections::HashSet<_> = names.iter().collect();
            assert_eq!(distinct.len(), names.len());
            assert!(names.iter().all(|n| !n.is_empty()));
        }
        Err(e) => assert!(e.is_config()),
    }
});
