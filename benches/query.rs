//! Benchmarks for filtering a generated collection.
use criterion::{Criterion, criterion_group, criterion_main};
use serde_json::{Value, json};
use std::hint::black_box;

use jsonwhere::{ConditionBuilder, ConditionSet, evaluator::evaluate};

fn create_records(n: usize) -> Value {
    Value::Array(
        (0..n)
            .map(|i| {
                json!({
                    "id": i,
                    "name": format!("user-{i}"),
                    "age": (i % 90).to_string(),
                    "city": if i % 3 == 0 { Value::Null } else { json!("Oslo") },
                })
            })
            .collect(),
    )
}

fn bench_evaluate(c: &mut Criterion) {
    let records = create_records(10_000);

    let comparisons: ConditionSet = ConditionBuilder::new()
        .and_where("age", ">=", 30)
        .where_not_null("city")
        .or_where("id", "in", json!([1, 2, 3]))
        .build();
    c.bench_function("evaluate comparisons", |b| {
        b.iter(|| evaluate(black_box(&records), black_box(&comparisons)))
    });

    let patterns: ConditionSet = ConditionBuilder::new()
        .where_match("name", "user-[0-9]*7")
        .or_where("name", "startswith", "user-99")
        .build();
    c.bench_function("evaluate patterns", |b| {
        b.iter(|| evaluate(black_box(&records), black_box(&patterns)))
    });
}

criterion_group!(benches, bench_evaluate);
criterion_main!(benches);
