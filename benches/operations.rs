//! Benchmarks for validated collection operations.
//!
//! Run with: `cargo bench --bench operations`

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use serde_json::json;
use strictdb::schema::{FieldType, ObjectSchema};
use strictdb::{CollectionInitializer, Config, Document, StrictDB};

const RECORDS: usize = 1_000;

fn doc(value: serde_json::Value) -> Document {
    value.as_object().cloned().unwrap()
}

fn initializer() -> CollectionInitializer {
    CollectionInitializer::new("posts", "slug")
        .unwrap()
        .record_schema(
            ObjectSchema::new()
                .required("slug", FieldType::String)
                .optional("content", FieldType::String)
                .with_default("views", json!(0)),
        )
}

fn seeded_db(init: &CollectionInitializer) -> StrictDB {
    let mut db = StrictDB::open_in_memory(Config::default()).unwrap();
    {
        let mut posts = init.initialize(&mut db).unwrap();
        for i in 0..RECORDS {
            posts
                .validate_and_insert(doc(json!({"slug": format!("post-{}", i)})))
                .unwrap();
        }
    }
    db
}

fn bench_validate_and_insert(c: &mut Criterion) {
    let init = initializer();

    c.bench_function("validate_and_insert", |b| {
        b.iter_batched(
            || seeded_db(&init),
            |mut db| {
                let mut posts = init.initialize(&mut db).unwrap();
                posts
                    .validate_and_insert(doc(json!({"slug": "fresh", "content": "x"})))
                    .unwrap();
                drop(posts);
                db
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_validate_and_patch(c: &mut Criterion) {
    let init = initializer();
    let mut db = seeded_db(&init);
    let mut posts = init.initialize(&mut db).unwrap();

    let mut n = 0u64;
    c.bench_function("validate_and_patch", |b| {
        b.iter(|| {
            n += 1;
            posts
                .validate_and_patch(doc(json!({"_id": 500, "content": n.to_string()})))
                .unwrap();
        });
    });
}

fn bench_get_by_id(c: &mut Criterion) {
    let init = initializer();
    let mut db = seeded_db(&init);
    let posts = init.initialize(&mut db).unwrap();

    c.bench_function("get_by_id", |b| {
        b.iter(|| posts.get_by_id(criterion::black_box(750)).unwrap());
    });
}

fn bench_validate_unique_fields(c: &mut Criterion) {
    let init = initializer();
    let mut db = seeded_db(&init);
    let posts = init.initialize(&mut db).unwrap();
    let candidate = doc(json!({"slug": "post-999-new"}));

    c.bench_function("validate_unique_fields", |b| {
        b.iter(|| posts.validate_unique_fields(&candidate, None).unwrap());
    });
}

criterion_group!(
    benches,
    bench_validate_and_insert,
    bench_validate_and_patch,
    bench_get_by_id,
    bench_validate_unique_fields
);
criterion_main!(benches);
