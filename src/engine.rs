/*!
# Query Engine

[`QueryEngine`] ties the pieces together: a loaded [`Document`], the
[`NodePath`] of the collection to filter, and the [`ConditionBuilder`] holding
the WHERE expression. Terminal operations ([`get`](QueryEngine::get),
[`first`](QueryEngine::first), [`count`](QueryEngine::count)) run the query and
make the result the document that the next query starts from;
[`reset`](QueryEngine::reset) goes back to the document as loaded.

# Examples

```
use jsonwhere::QueryEngine;
use serde_json::json;

let mut engine = QueryEngine::from_value(json!({
    "users": [
        {"name": "Rex", "age": 30},
        {"name": "Max", "age": 12},
        {"name": "Ada", "age": 41}
    ]
}));

let names = engine
    .at("users")
    .and_where("age", ">", 18)
    .and_where("name", "!=", "Ada")
    .get()
    .unwrap();
assert_eq!(names, json!([{"name": "Rex", "age": 30}]));

// queries continue from the last result until reset
assert_eq!(engine.count().unwrap(), 1);
engine.reset();
assert_eq!(engine.at("users").count().unwrap(), 3);
```
*/
use serde_json::Value;
use std::{path::Path, str::FromStr};

use crate::condition::{ConditionBuilder, ConditionSet};
use crate::document::{Document, DocumentFormat};
use crate::error::QueryError;
use crate::evaluator::evaluate;
use crate::path::{NodePath, resolve};

/// A query session over one document.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    document: Document,
    node: NodePath,
    conditions: ConditionBuilder,
}

impl QueryEngine {
    /// Start a session over an existing document.
    #[must_use]
    pub fn new(document: Document) -> Self {
        Self {
            document,
            node: NodePath::root(),
            conditions: ConditionBuilder::new(),
        }
    }

    /// Start a session over an already decoded tree.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        Self::new(Document::new(value))
    }

    /// Load a document from a file, detecting its format from the extension.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::FileNotFound`] if the file does not exist, or
    /// the read/decode failure otherwise.
    pub fn import(path: impl AsRef<Path>) -> Result<Self, QueryError> {
        Ok(Self::new(Document::open(path)?))
    }

    /// Load a document from a file in an explicit format.
    ///
    /// # Errors
    ///
    /// See [`QueryEngine::import`].
    pub fn import_with_format(
        path: impl AsRef<Path>,
        format: DocumentFormat,
    ) -> Result<Self, QueryError> {
        Ok(Self::new(Document::open_with_format(path, format)?))
    }

    /// Set the node path of the collection to filter.
    pub fn at(&mut self, path: impl Into<NodePath>) -> &mut Self {
        self.node = path.into();
        self
    }

    /// Apply `f` to the condition builder in place.
    fn chain(
        &mut self,
        f: impl FnOnce(ConditionBuilder) -> ConditionBuilder,
    ) -> &mut Self {
        self.conditions = f(std::mem::take(&mut self.conditions));
        self
    }

    /// See [`ConditionBuilder::and_where`].
    pub fn and_where(
        &mut self,
        key: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.chain(|b| b.and_where(key, operator, value))
    }

    /// See [`ConditionBuilder::or_where`].
    pub fn or_where(
        &mut self,
        key: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.chain(|b| b.or_where(key, operator, value))
    }

    /// See [`ConditionBuilder::where_group`].
    pub fn where_group<F>(&mut self, build: F) -> &mut Self
    where
        F: FnOnce(ConditionBuilder) -> ConditionBuilder,
    {
        self.chain(|b| b.where_group(build))
    }

    /// See [`ConditionBuilder::or_where_group`].
    pub fn or_where_group<F>(&mut self, build: F) -> &mut Self
    where
        F: FnOnce(ConditionBuilder) -> ConditionBuilder,
    {
        self.chain(|b| b.or_where_group(build))
    }

    /// See [`ConditionBuilder::where_in`].
    pub fn where_in<V: Into<Value>>(
        &mut self,
        key: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.chain(|b| b.where_in(key, values))
    }

    /// See [`ConditionBuilder::where_not_in`].
    pub fn where_not_in<V: Into<Value>>(
        &mut self,
        key: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.chain(|b| b.where_not_in(key, values))
    }

    /// See [`ConditionBuilder::where_null`].
    pub fn where_null(&mut self, key: impl Into<String>) -> &mut Self {
        self.chain(|b| b.where_null(key))
    }

    /// See [`ConditionBuilder::where_not_null`].
    pub fn where_not_null(&mut self, key: impl Into<String>) -> &mut Self {
        self.chain(|b| b.where_not_null(key))
    }

    /// See [`ConditionBuilder::where_starts_with`].
    pub fn where_starts_with(
        &mut self,
        key: impl Into<String>,
        prefix: impl Into<Value>,
    ) -> &mut Self {
        self.chain(|b| b.where_starts_with(key, prefix))
    }

    /// See [`ConditionBuilder::where_ends_with`].
    pub fn where_ends_with(
        &mut self,
        key: impl Into<String>,
        suffix: impl Into<Value>,
    ) -> &mut Self {
        self.chain(|b| b.where_ends_with(key, suffix))
    }

    /// See [`ConditionBuilder::where_match`].
    pub fn where_match(
        &mut self,
        key: impl Into<String>,
        pattern: impl Into<Value>,
    ) -> &mut Self {
        self.chain(|b| b.where_match(key, pattern))
    }

    /// See [`ConditionBuilder::where_contains`].
    pub fn where_contains(
        &mut self,
        key: impl Into<String>,
        needle: impl Into<Value>,
    ) -> &mut Self {
        self.chain(|b| b.where_contains(key, needle))
    }

    /// AND-in every group of a parsed expression: its first group joins the
    /// current group and the rest are OR-ed after it.
    pub fn where_set(&mut self, conditions: &ConditionSet) -> &mut Self {
        for (i, group) in conditions.groups().iter().enumerate() {
            for (j, c) in group.conditions().iter().enumerate() {
                let (key, op, value) = (c.key.clone(), c.operator.clone(), c.value.clone());
                if i > 0 && j == 0 {
                    self.or_where(key, op, value);
                } else {
                    self.and_where(key, op, value);
                }
            }
        }
        self
    }

    /// The WHERE expression built so far.
    #[must_use]
    pub const fn conditions(&self) -> &ConditionSet {
        self.conditions.conditions()
    }

    /// The node path queries filter.
    #[must_use]
    pub const fn node(&self) -> &NodePath {
        &self.node
    }

    /// The document this session queries.
    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.document
    }

    /// Run the query.
    ///
    /// The collection at the node path is filtered with the conditions built
    /// so far, or returned as-is when there are none. A node path that does
    /// not resolve yields an empty array. On success the result becomes the
    /// working document and the node path and conditions are cleared; on
    /// error nothing changes.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::ConditionNotAllowed`] if a condition uses an
    /// unknown operator.
    pub fn get(&mut self) -> Result<Value, QueryError> {
        let result = match resolve(self.document.current(), &self.node) {
            None => {
                log::debug!("node path `{}` not found", self.node);
                Value::Array(Vec::new())
            }
            Some(collection) if self.conditions.is_empty() => collection.clone(),
            Some(collection) => evaluate(collection, self.conditions.conditions())?,
        };

        self.document.replace(result.clone());
        self.node = NodePath::root();
        self.conditions = ConditionBuilder::new();
        Ok(result)
    }

    /// Run the query and return its first record: the first element of an
    /// array or the first value of an object. Scalars and empty collections
    /// have none.
    ///
    /// # Errors
    ///
    /// See [`QueryEngine::get`].
    pub fn first(&mut self) -> Result<Option<Value>, QueryError> {
        Ok(match self.get()? {
            Value::Array(records) => records.into_iter().next(),
            Value::Object(records) => records.into_iter().next().map(|(_, v)| v),
            _ => None,
        })
    }

    /// Run the query and count its records. `null` counts as zero records
    /// and any other scalar as one.
    ///
    /// # Errors
    ///
    /// See [`QueryEngine::get`].
    pub fn count(&mut self) -> Result<usize, QueryError> {
        Ok(match self.get()? {
            Value::Array(records) => records.len(),
            Value::Object(records) => records.len(),
            Value::Null => 0,
            _ => 1,
        })
    }

    /// Go back to the document as loaded, clearing node path and conditions.
    pub fn reset(&mut self) -> &mut Self {
        self.document.reset();
        self.node = NodePath::root();
        self.conditions = ConditionBuilder::new();
        self
    }

    /// A new session over the same loaded document, with clean state. The
    /// base tree is shared, not copied.
    #[must_use]
    pub fn fresh(&self) -> Self {
        Self::new(self.document.fresh())
    }
}

impl From<Value> for QueryEngine {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

impl FromStr for QueryEngine {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s.parse()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn create_store_json() -> Value {
        json!({
            "store": {
                "name": "Corner",
                "books": [
                    {"id": 1, "title": "Dune", "price": 9.5, "author": "Herbert"},
                    {"id": 2, "title": "Emma", "price": 4, "author": "Austen"},
                    {"id": 3, "title": "Ulysses", "price": "12", "author": null},
                    {"id": 4, "title": "Persuasion", "price": 7, "author": "Austen"}
                ]
            }
        })
    }

    fn ids(result: &Value) -> Vec<i64> {
        result
            .as_array()
            .expect("Expected array result")
            .iter()
            .filter_map(|r| r.get("id").and_then(Value::as_i64))
            .collect()
    }

    #[test]
    fn get_filters_collection_at_node() {
        let mut engine = QueryEngine::from_value(create_store_json());
        let result = engine
            .at("store.books")
            .and_where("price", ">", 5)
            .and_where("author", "notnull", Value::Null)
            .get()
            .unwrap();
        assert_eq!(ids(&result), [1, 4]);
    }

    #[test]
    fn or_where_and_grouping() {
        let mut engine = QueryEngine::from_value(create_store_json());
        let result = engine
            .at("store.books")
            .where_ends_with("title", "a")
            .or_where_group(|b| {
                b.where_starts_with("title", "U").where_null("author")
            })
            .get()
            .unwrap();
        assert_eq!(ids(&result), [2, 3]);
    }

    #[test]
    fn no_conditions_returns_collection() {
        let mut engine = QueryEngine::from_value(create_store_json());
        let name = engine.at("store.name").get().unwrap();
        assert_eq!(name, json!("Corner"));
    }

    #[test]
    fn missing_node_yields_empty() {
        let mut engine = QueryEngine::from_value(create_store_json());
        assert_eq!(
            engine.at("store.magazines").and_where("id", "=", 1).get().unwrap(),
            json!([])
        );
        engine.reset();
        assert_eq!(engine.at("store.magazines").count().unwrap(), 0);
    }

    #[test]
    fn queries_chain_on_previous_result() {
        let mut engine = QueryEngine::from_value(create_store_json());
        engine.at("store.books").where_in("author", ["Austen"]).get().unwrap();
        let cheap = engine.and_where("price", "<", 5).get().unwrap();
        assert_eq!(ids(&cheap), [2]);

        engine.reset();
        assert_eq!(engine.at("store.books").count().unwrap(), 4);
    }

    #[test]
    fn first_and_count() {
        let mut engine = QueryEngine::from_value(create_store_json());
        let first = engine
            .at("store.books")
            .where_contains("title", "s")
            .first()
            .unwrap();
        assert_eq!(first.and_then(|b| b.get("id").cloned()), Some(json!(3)));

        let mut engine = engine.fresh();
        assert_eq!(
            engine.at("store.books").where_match("title", "E.*").count().unwrap(),
            1
        );
        assert_eq!(engine.fresh().at("store").first().unwrap(), Some(json!("Corner")));
    }

    #[test]
    fn failed_get_keeps_state() {
        let mut engine = QueryEngine::from_value(create_store_json());
        engine.at("store.books").and_where("price", "~=", 4);
        let before = engine.conditions().clone();

        let result = engine.get();
        assert!(matches!(result, Err(QueryError::ConditionNotAllowed(_))));
        assert_eq!(engine.conditions(), &before);
        assert_eq!(engine.node().to_string(), "store.books");
        assert_eq!(engine.document().current(), &create_store_json());
    }

    #[test]
    fn where_set_appends_parsed_expression() {
        let mut engine = QueryEngine::from_value(create_store_json());
        let parsed: ConditionSet = r#"price >= 9 or author = "Austen""#.parse().unwrap();
        let result = engine.at("store.books").where_set(&parsed).get().unwrap();
        assert_eq!(ids(&result), [1, 2, 3, 4]);
    }

    #[test]
    fn fresh_shares_base_across_threads() {
        let engine = QueryEngine::from_value(create_store_json());
        let handles: Vec<_> = (1..=2)
            .map(|id| {
                let mut view = engine.fresh();
                std::thread::spawn(move || {
                    view.at("store.books").and_where("id", "=", id).count().unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 1);
        }
    }

    #[test]
    fn import_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".json")
            .tempfile()
            .expect("Failed to create temp file");
        write!(file, "{}", create_store_json()).unwrap();

        let mut engine = QueryEngine::import(file.path()).unwrap();
        assert_eq!(engine.at("store.books").count().unwrap(), 4);
        assert!(matches!(
            QueryEngine::import("no/such/file.json"),
            Err(QueryError::FileNotFound(_))
        ));
    }

    #[test]
    fn parse_from_json_text() {
        let mut engine: QueryEngine = r#"[{"a": 1}, {"a": 2}]"#.parse().unwrap();
        assert_eq!(engine.and_where("a", "==", 2).count().unwrap(), 1);
        assert!(matches!(
            "[1,".parse::<QueryEngine>(),
            Err(QueryError::Parse { .. })
        ));
    }
}
