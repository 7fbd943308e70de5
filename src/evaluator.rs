/*!
# Filter Evaluator

Applies a [`ConditionSet`] to every record of a collection and keeps the
records for which at least one group has all of its conditions true.

Operators are resolved, and patterns compiled, once per call before any
record is visited: an unknown operator fails the whole call and no partial
result is produced.
*/
use regex::Regex;
use serde_json::Value;

use crate::condition::{Condition, ConditionSet};
use crate::error::QueryError;
use crate::operator::{self, Operator, Predicate};
use crate::path::{PathSegment, child};

/// How a compiled condition tests its field.
enum Test<'c> {
    /// Registry predicate with its operand
    Predicate(Predicate, &'c Value),
    /// Pre-compiled pattern; `None` when the operand is not a valid regex
    Pattern(Option<Regex>),
}

/// A condition with its operator resolved.
struct CompiledCondition<'c> {
    key: PathSegment,
    test: Test<'c>,
}

impl<'c> CompiledCondition<'c> {
    fn compile(condition: &'c Condition) -> Result<Self, QueryError> {
        let op = condition.resolve_operator()?;
        let test = if op.is_pattern() {
            Test::Pattern(
                op.pattern(&condition.value)
                    .and_then(|source| operator::compile_pattern(&source)),
            )
        } else {
            Test::Predicate(op.predicate(), &condition.value)
        };
        Ok(Self { key: PathSegment::Field(condition.key.clone()), test })
    }

    fn holds(&self, record: &Value) -> bool {
        let field = child(record, &self.key);
        match &self.test {
            Test::Predicate(predicate, operand) => predicate(field, operand),
            Test::Pattern(re) => {
                re.as_ref().is_some_and(|re| operator::pattern_matches(re, field))
            }
        }
    }
}

/// Resolved form of a whole [`ConditionSet`]; empty groups are dropped.
struct CompiledSet<'c> {
    groups: Vec<Vec<CompiledCondition<'c>>>,
}

impl<'c> CompiledSet<'c> {
    fn compile(conditions: &'c ConditionSet) -> Result<Self, QueryError> {
        let groups = conditions
            .groups()
            .iter()
            .filter(|group| !group.is_empty())
            .map(|group| {
                group
                    .conditions()
                    .iter()
                    .map(CompiledCondition::compile)
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { groups })
    }

    /// OR over groups of AND over conditions.
    fn matches(&self, record: &Value) -> bool {
        self.groups
            .iter()
            .any(|group| group.iter().all(|condition| condition.holds(record)))
    }
}

/// Evaluate `conditions` against a single record.
///
/// # Errors
///
/// Returns [`QueryError::ConditionNotAllowed`] if a condition uses an unknown
/// operator.
///
/// # Examples
///
/// ```
/// use jsonwhere::condition::ConditionBuilder;
/// use jsonwhere::evaluator::matches;
/// use serde_json::json;
///
/// let conditions = ConditionBuilder::new().and_where("age", "=", "30").build();
/// assert!(matches(&json!({"age": 30, "name": "Rex"}), &conditions).unwrap());
/// ```
pub fn matches(record: &Value, conditions: &ConditionSet) -> Result<bool, QueryError> {
    Ok(CompiledSet::compile(conditions)?.matches(record))
}

/// Filter `collection` with `conditions`, keeping the order of the surviving
/// records.
///
/// Arrays yield an array of the matching elements and objects yield an object
/// of the matching entries. A scalar has no records and yields an empty array.
/// An empty condition set matches nothing.
///
/// # Errors
///
/// Returns [`QueryError::ConditionNotAllowed`] if a condition uses an unknown
/// operator.
///
/// # Examples
///
/// ```
/// use jsonwhere::condition::ConditionBuilder;
/// use jsonwhere::evaluator::evaluate;
/// use serde_json::json;
///
/// let users = json!([
///     {"name": "Rex", "age": 30},
///     {"name": "Max", "age": 12},
///     {"name": "Ada"}
/// ]);
/// let conditions = ConditionBuilder::new()
///     .and_where("age", ">=", 18)
///     .or_where("age", "null", json!(null))
///     .build();
///
/// let adults = evaluate(&users, &conditions).unwrap();
/// assert_eq!(adults, json!([{"name": "Rex", "age": 30}, {"name": "Ada"}]));
/// ```
pub fn evaluate(collection: &Value, conditions: &ConditionSet) -> Result<Value, QueryError> {
    let compiled = CompiledSet::compile(conditions)?;

    let filtered = match collection {
        Value::Array(records) => Value::Array(
            records
                .iter()
                .filter(|record| keep(&compiled, record))
                .cloned()
                .collect(),
        ),
        Value::Object(records) => Value::Object(
            records
                .iter()
                .filter(|(_, record)| keep(&compiled, record))
                .map(|(key, record)| (key.clone(), record.clone()))
                .collect(),
        ),
        _ => {
            log::debug!("collection is a scalar, nothing to filter");
            Value::Array(Vec::new())
        }
    };

    log::debug!(
        "{} of {} records matched `{conditions}`",
        record_count(&filtered),
        record_count(collection)
    );
    Ok(filtered)
}

fn keep(compiled: &CompiledSet<'_>, record: &Value) -> bool {
    let keep = compiled.matches(record);
    if !keep {
        log::trace!("rejected {record}");
    }
    keep
}

fn record_count(collection: &Value) -> usize {
    match collection {
        Value::Array(records) => records.len(),
        Value::Object(records) => records.len(),
        _ => 0,
    }
}

/// Whether a token names a registered operator.
#[must_use]
pub fn is_allowed(token: &str) -> bool {
    token.parse::<Operator>().is_ok()
}
