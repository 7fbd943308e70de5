//! An example of using the [`ConditionBuilder`] fluent API and the
//! [`QueryEngine`] to filter a document.
use jsonwhere::{ConditionBuilder, ConditionSet, QueryEngine};
use serde_json::json;

fn main() {
    // Construct "age >= 18 and name startswith \"R\" or vip = true"
    let conditions: ConditionSet = ConditionBuilder::new()
        .and_where("age", ">=", 18)
        .where_starts_with("name", "R")
        .or_where("vip", "=", true)
        .build();

    // We can verify that the constructed expression matches what we expect
    assert_eq!(
        r#"age >= 18 and name startswith "R" or vip = true"#,
        conditions.to_string()
    );

    // The same expression, parsed from text
    let parsed: ConditionSet = conditions.to_string().parse().unwrap();
    assert_eq!(parsed, conditions);

    let mut engine = QueryEngine::from_value(json!({
        "users": [
            {"name": "Rex", "age": 30},
            {"name": "Roo", "age": 9},
            {"name": "Ada", "age": 41, "vip": true}
        ]
    }));

    let matched = engine.at("users").where_set(&conditions).get().unwrap();
    assert_eq!(
        matched,
        json!([{"name": "Rex", "age": 30}, {"name": "Ada", "age": 41, "vip": true}])
    );

    // Another, grouped example on a fresh view of the same document
    let teens = engine
        .fresh()
        .at("users")
        .where_group(|b| b.and_where("age", ">", 12).and_where("age", "<", 20))
        .or_where_group(|b| b.where_null("age"))
        .count()
        .unwrap();
    assert_eq!(teens, 0);
}
