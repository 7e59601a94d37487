//! Fuzz target for validated inserts.
//!
//! Feeds arbitrary JSON objects to `validate_and_insert` and `upsert`.
//! Neither may panic, and whatever they accept must leave the unique
//! field free of duplicates.

#![no_main]

use libfuzzer_sys::fuzz_target;
use serde_json::Value;

use strictdb::schema::{FieldType, ObjectSchema};
use strictdb::{CollectionInitializer, Config, StrictDB};

fuzz_target!(|data: &[u8]| {
    let Ok(Value::Array(items)) = serde_json::from_slice::<Value>(data) else {
        return;
    };

    let Ok(mut db) = StrictDB::open_in_memory(Config::default()) else {
        return;
    };
    let Ok(init) = CollectionInitializer::new("fuzz", "key") else {
        return;
    };
    let init = init.record_schema(ObjectSchema::new().optional("key", FieldType::Any));
    let Ok(mut collection) = init.initialize(&mut db) else {
        return;
    };

    for (i, item) in items.into_iter().enumerate() {
        let Value::Object(doc) = item else {
            continue;
        };
        if i % 2 == 0 {
            let _ = collection.validate_and_insert(doc);
        } else {
            let _ = collection.upsert(doc);
        }
    }

    let mut seen = std::collections::HashSet::new();
    for record in collection.documents() {
        if let Some(key) = record.get("key").filter(|v| !v.is_null()) {
            assert!(seen.insert(key.to_string()), "duplicate key {}", key);
        }
    }
});
