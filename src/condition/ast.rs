/*!
# Condition AST and Builder

Defines the flat OR-of-AND condition model and a fluent API for building it.

# Examples

Conditions added with [`ConditionBuilder::and_where`] join the current group;
[`ConditionBuilder::or_where`] opens a new one:

```
use jsonwhere::condition::ConditionBuilder;

// (age >= 30 AND vip = true) OR name startswith "R"
let conditions = ConditionBuilder::new()
    .and_where("age", ">=", 30)
    .and_where("vip", "=", true)
    .or_where("name", "startswith", "R")
    .build();

assert_eq!(conditions.groups().len(), 2);
assert_eq!(
    conditions.to_string(),
    r#"age >= 30 and vip = true or name startswith "R""#
);
```

The same expression can be parsed from text:

```
use jsonwhere::condition::ConditionSet;
let conditions: ConditionSet = r#"age >= 30 and vip = true or name startswith "R""#
    .parse()
    .expect("Invalid expression");
assert_eq!(conditions.groups().len(), 2);
```
*/
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt::Display, str::FromStr};

use super::{ConditionParseError, parse_conditions};
use crate::error::QueryError;
use crate::operator::Operator;

/// A single `key operator value` test against a record.
///
/// The operator is kept as written; it is only resolved against the
/// [`crate::operator::REGISTRY`] when the condition is evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Record field the condition reads
    pub key: String,
    /// Operator token, e.g. `">="` or `"contains"`
    pub operator: String,
    /// Operand the field is compared with
    pub value: Value,
}

impl Condition {
    /// Helper for ergonomic construction of conditions.
    pub fn new(
        key: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            key: key.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    /// Resolve the operator token.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::ConditionNotAllowed`] if the token is not a
    /// known operator.
    pub fn resolve_operator(&self) -> Result<Operator, QueryError> {
        self.operator.parse()
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if needs_quoting(&self.key) {
            write!(f, "{}", Value::String(self.key.clone()))?;
        } else {
            write!(f, "{}", self.key)?;
        }
        write!(f, " {}", self.operator)?;

        // `null` and `notnull` read naturally without their null operand
        let bare = matches!(self.operator.as_str(), "null" | "notnull")
            && self.value.is_null();
        if !bare {
            write!(f, " {}", self.value)?;
        }
        Ok(())
    }
}

/// Returns `true` if a key cannot be written as a bare identifier in the
/// expression syntax, mirroring the grammar's `ident` rule.
fn needs_quoting(key: &str) -> bool {
    key.is_empty()
        || key.eq_ignore_ascii_case("and")
        || key.eq_ignore_ascii_case("or")
        || !key.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '$' | '@')
        })
}

/// Conditions that must all hold.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionGroup {
    conditions: Vec<Condition>,
}

impl ConditionGroup {
    /// The conditions in insertion order.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Number of conditions in the group.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.conditions.len()
    }

    /// Whether the group has no conditions.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

impl Display for ConditionGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, condition) in self.conditions.iter().enumerate() {
            if i > 0 {
                write!(f, " and ")?;
            }
            write!(f, "{condition}")?;
        }
        Ok(())
    }
}

/// The complete WHERE expression: groups of which at least one must hold.
///
/// An empty set matches no records.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionSet {
    groups: Vec<ConditionGroup>,
}

impl ConditionSet {
    /// The groups in insertion order.
    #[must_use]
    pub fn groups(&self) -> &[ConditionGroup] {
        &self.groups
    }

    /// Whether the set holds no conditions at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(ConditionGroup::is_empty)
    }

    /// Iterate over every condition, group by group.
    pub fn conditions(&self) -> impl Iterator<Item = &Condition> {
        self.groups.iter().flat_map(ConditionGroup::conditions)
    }
}

impl Display for ConditionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .groups
            .iter()
            .filter(|g| !g.is_empty())
            .map(|g| format!("{g}"))
            .collect::<Vec<_>>()
            .join(" or ");
        write!(f, "{joined}")
    }
}

impl FromStr for ConditionSet {
    type Err = ConditionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_conditions(s)
    }
}

/// Builder for WHERE expressions.
///
/// Holds the groups built so far and the index of the group new conditions
/// are AND-ed into.
#[derive(Debug, Clone, Default)]
pub struct ConditionBuilder {
    /// The expression being built
    set: ConditionSet,
    /// Group that `and_where` appends to, once one exists
    current: Option<usize>,
}

impl ConditionBuilder {
    /// Creates a new `ConditionBuilder` with no conditions.
    ///
    /// # Examples
    /// ```
    /// use jsonwhere::condition::ConditionBuilder;
    /// let builder = ConditionBuilder::new();
    /// assert!(builder.is_empty());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the current group, opening the first group if needed.
    fn current_group(&mut self) -> usize {
        match self.current {
            Some(idx) => idx,
            None => self.open_group(),
        }
    }

    /// Open a new group and make it current.
    fn open_group(&mut self) -> usize {
        self.set.groups.push(ConditionGroup::default());
        let idx = self.set.groups.len() - 1;
        self.current = Some(idx);
        idx
    }

    fn push(&mut self, group: usize, condition: Condition) {
        self.set.groups[group].conditions.push(condition);
    }

    /// AND a condition into the current group.
    ///
    /// # Examples
    ///
    /// ```
    /// use jsonwhere::condition::ConditionBuilder;
    /// use jsonwhere::operator::Operator;
    /// let conditions = ConditionBuilder::new()
    ///     .and_where("age", ">", 18)
    ///     .and_where("age", Operator::Less, 65)
    ///     .build();
    /// assert_eq!(conditions.groups().len(), 1);
    /// assert_eq!(conditions.groups()[0].len(), 2);
    /// ```
    #[must_use]
    pub fn and_where(
        mut self,
        key: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        let group = self.current_group();
        self.push(group, Condition::new(key, operator, value));
        self
    }

    /// Open a new group and add a condition to it. Later
    /// [`and_where`](Self::and_where) calls AND into this group.
    ///
    /// # Examples
    ///
    /// ```
    /// use jsonwhere::condition::ConditionBuilder;
    /// let conditions = ConditionBuilder::new()
    ///     .or_where("role", "=", "admin")
    ///     .or_where("role", "=", "owner")
    ///     .and_where("active", "=", true)
    ///     .build();
    /// assert_eq!(
    ///     conditions.to_string(),
    ///     r#"role = "admin" or role = "owner" and active = true"#
    /// );
    /// ```
    #[must_use]
    pub fn or_where(
        mut self,
        key: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        let group = self.open_group();
        self.push(group, Condition::new(key, operator, value));
        self
    }

    /// Let `build` add conditions to the current group (opening the first
    /// group if there is none). `build` may also open further groups.
    ///
    /// # Examples
    ///
    /// ```
    /// use jsonwhere::condition::ConditionBuilder;
    /// let adults = |b: ConditionBuilder| b.and_where("age", ">=", 18).and_where("age", "<", 65);
    /// let conditions = ConditionBuilder::new().where_group(adults).build();
    /// assert_eq!(conditions.to_string(), "age >= 18 and age < 65");
    /// ```
    #[must_use]
    pub fn where_group<F>(mut self, build: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        self.current_group();
        build(self)
    }

    /// Open a new group, then let `build` add conditions to it.
    #[must_use]
    pub fn or_where_group<F>(mut self, build: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        self.open_group();
        build(self)
    }

    /// `key in values`
    #[must_use]
    pub fn where_in<V: Into<Value>>(
        self,
        key: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.and_where(key, Operator::In, values)
    }

    /// `key notin values`
    #[must_use]
    pub fn where_not_in<V: Into<Value>>(
        self,
        key: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.and_where(key, Operator::NotIn, values)
    }

    /// `key null`
    #[must_use]
    pub fn where_null(self, key: impl Into<String>) -> Self {
        self.and_where(key, Operator::Null, Value::Null)
    }

    /// `key notnull`
    #[must_use]
    pub fn where_not_null(self, key: impl Into<String>) -> Self {
        self.and_where(key, Operator::NotNull, Value::Null)
    }

    /// `key startswith prefix`. The prefix is used as a regex.
    #[must_use]
    pub fn where_starts_with(
        self,
        key: impl Into<String>,
        prefix: impl Into<Value>,
    ) -> Self {
        self.and_where(key, Operator::StartsWith, prefix)
    }

    /// `key endswith suffix`. The suffix is matched literally.
    #[must_use]
    pub fn where_ends_with(
        self,
        key: impl Into<String>,
        suffix: impl Into<Value>,
    ) -> Self {
        self.and_where(key, Operator::EndsWith, suffix)
    }

    /// `key match pattern`. The pattern must match the whole field.
    #[must_use]
    pub fn where_match(
        self,
        key: impl Into<String>,
        pattern: impl Into<Value>,
    ) -> Self {
        self.and_where(key, Operator::Match, pattern)
    }

    /// `key contains needle`
    #[must_use]
    pub fn where_contains(
        self,
        key: impl Into<String>,
        needle: impl Into<Value>,
    ) -> Self {
        self.and_where(key, Operator::Contains, needle)
    }

    /// Whether no condition has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// The expression built so far. May contain empty groups left by a
    /// grouped sub-expression that added nothing; they never match.
    #[must_use]
    pub const fn conditions(&self) -> &ConditionSet {
        &self.set
    }

    /// Return the built expression, without empty groups.
    #[must_use]
    pub fn build(self) -> ConditionSet {
        let mut set = self.set;
        set.groups.retain(|g| !g.is_empty());
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn where_after_where_augments_group() {
        let set = ConditionBuilder::new()
            .and_where("a", "=", 1)
            .and_where("b", "=", 2)
            .build();
        assert_eq!(set.groups().len(), 1);
        assert_eq!(
            set.groups()[0].conditions(),
            &[Condition::new("a", "=", 1), Condition::new("b", "=", 2)]
        );
    }

    #[test]
    fn or_where_opens_group_even_first() {
        let set = ConditionBuilder::new().or_where("a", "=", 1).build();
        assert_eq!(set.groups().len(), 1);

        let set = ConditionBuilder::new()
            .or_where("a", "=", 1)
            .or_where("b", "=", 2)
            .and_where("c", "=", 3)
            .build();
        assert_eq!(set.groups().len(), 2);
        assert_eq!(set.groups()[0].len(), 1);
        assert_eq!(set.groups()[1].len(), 2);
    }

    #[test]
    fn typed_wrappers_use_fixed_tokens() {
        let set = ConditionBuilder::new()
            .where_in("a", [1, 2])
            .where_not_in("b", ["x"])
            .where_null("c")
            .where_not_null("d")
            .where_starts_with("e", "R")
            .where_ends_with("f", "x")
            .where_match("g", "R.*")
            .where_contains("h", "ex")
            .build();
        let tokens: Vec<&str> =
            set.conditions().map(|c| c.operator.as_str()).collect();
        assert_eq!(
            tokens,
            [
                "in",
                "notin",
                "null",
                "notnull",
                "startswith",
                "endswith",
                "match",
                "contains"
            ]
        );
        assert_eq!(set.groups()[0].conditions()[0].value, json!([1, 2]));
        assert_eq!(set.groups()[0].conditions()[2].value, Value::Null);
    }

    #[test]
    fn group_closure_adds_to_current_group() {
        let set = ConditionBuilder::new()
            .and_where("a", "=", 1)
            .where_group(|b| b.and_where("b", "=", 2).or_where("c", "=", 3))
            .build();
        assert_eq!(set.to_string(), "a = 1 and b = 2 or c = 3");
    }

    #[test]
    fn or_group_closure_opens_group() {
        let set = ConditionBuilder::new()
            .and_where("a", "=", 1)
            .or_where_group(|b| b.and_where("b", "=", 2).and_where("c", "=", 3))
            .build();
        assert_eq!(set.groups().len(), 2);
        assert_eq!(set.to_string(), "a = 1 or b = 2 and c = 3");
    }

    #[test]
    fn empty_groups_are_dropped_on_build() {
        let builder = ConditionBuilder::new()
            .and_where("a", "=", 1)
            .or_where_group(|b| b);
        assert_eq!(builder.conditions().groups().len(), 2);
        assert_eq!(builder.build().groups().len(), 1);

        let builder = ConditionBuilder::new().where_group(|b| b);
        assert!(builder.is_empty());
        assert!(builder.build().groups().is_empty());
    }

    #[test]
    fn display_quotes_awkward_keys() {
        let set = ConditionBuilder::new()
            .and_where("first name", "=", "Rex")
            .and_where("or", "notnull", Value::Null)
            .and_where("tags", "in", json!(["a", "b"]))
            .build();
        assert_eq!(
            set.to_string(),
            r#""first name" = "Rex" and "or" notnull and tags in ["a","b"]"#
        );
    }

    #[test]
    fn unknown_operator_kept_until_resolved() {
        let condition = Condition::new("age", "~=", 1);
        assert_eq!(condition.operator, "~=");
        assert!(matches!(
            condition.resolve_operator(),
            Err(QueryError::ConditionNotAllowed(_))
        ));
    }

    #[test]
    fn condition_set_serializes_as_nested_lists() {
        let set = ConditionBuilder::new()
            .and_where("age", ">", 18)
            .or_where("name", "startswith", "R")
            .build();
        let encoded = serde_json::to_value(&set).unwrap();
        assert_eq!(
            encoded,
            json!([
                [{"key": "age", "operator": ">", "value": 18}],
                [{"key": "name", "operator": "startswith", "value": "R"}]
            ])
        );
        let decoded: ConditionSet = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, set);
    }
}
