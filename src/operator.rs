/*!
# Operator Registry

The fixed set of condition operators and the predicates they dispatch to.

Every operator is a row in [`REGISTRY`]: its enum variant, its token as
written in a condition (e.g. `">="` or `"startswith"`), and a predicate
`fn(field, operand) -> bool`. The field is `None` when the record has no such
key.

## Loose comparisons

`=`, `!=`, `in`, `notin` and `null` compare loosely. An absent field compares
like `null`.

| left / right        | equal when                                          |
|---------------------|-----------------------------------------------------|
| null / null         | always                                              |
| bool / any          | the bool equals the truthiness of the other side    |
| null / string       | the string is empty                                 |
| null / number       | the number is zero                                  |
| null / array/object | the container is empty                              |
| number / number     | numerically equal (`30 = 30.0`)                     |
| number / string     | numeric string: numerically equal; else same text   |
| string / string     | both numeric: numerically equal; else same bytes    |
| array / array       | same length, pairwise loosely equal                 |
| object / object     | same keys, loosely equal values                     |

Anything else is unequal. `null`, `false`, `0`, `""`, `"0"`, `[]` and `{}`
are falsy.

`==` and `!==` compare structurally without coercion. Object members are
compared by key, so `{"a": 1, "b": 2}` and `{"b": 2, "a": 1}` are strictly
equal even though their member order differs.

The ordering operators `>`, `<`, `>=` and `<=` hold only between mutually
ordered values: two nulls, two bools, or numbers and numeric strings and
plain strings as above. An absent field orders like `null`.

## Pattern operators

`startswith`, `endswith`, `match` and `contains` work on the text form of the
field: strings as-is, numbers as written except that integral floats lose
their fraction (`30.0` reads `"30"`), `true` as `"1"`, `false` and `null` as
`""`. Arrays and objects never match.

`startswith` and `match` build a regex from the operand without escaping it,
so metacharacters in the operand are live. Do not feed them untrusted input
unless that is what you want.
*/
use regex::Regex;
use serde_json::{Number, Value};
use std::{borrow::Cow, cmp::Ordering, fmt::Display, str::FromStr};

use crate::error::QueryError;

/// A predicate over a record field (`None` when absent) and a condition
/// operand.
pub type Predicate = fn(Option<&Value>, &Value) -> bool;

/// Operators a condition can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`: loose equality
    Equal,
    /// `==`: strict equality
    ExactEqual,
    /// `!=`: loose inequality
    NotEqual,
    /// `!==`: strict inequality
    NotExactEqual,
    /// `>`
    Greater,
    /// `<`
    Less,
    /// `>=`
    GreaterEqual,
    /// `<=`
    LessEqual,
    /// `in`: loosely equal to an element of the operand array
    In,
    /// `notin`: loosely equal to no element of the operand array
    NotIn,
    /// `null`: absent or null
    Null,
    /// `notnull`: present and not null
    NotNull,
    /// `startswith`: regex prefix match
    StartsWith,
    /// `endswith`: literal suffix
    EndsWith,
    /// `match`: full regex match
    Match,
    /// `contains`: literal substring
    Contains,
}

/// Token and predicate for every [`Operator`].
pub static REGISTRY: [(Operator, &str, Predicate); 16] = [
    (Operator::Equal, "=", equal),
    (Operator::ExactEqual, "==", exact_equal),
    (Operator::NotEqual, "!=", not_equal),
    (Operator::NotExactEqual, "!==", not_exact_equal),
    (Operator::Greater, ">", greater),
    (Operator::Less, "<", less),
    (Operator::GreaterEqual, ">=", greater_equal),
    (Operator::LessEqual, "<=", less_equal),
    (Operator::In, "in", is_in),
    (Operator::NotIn, "notin", not_in),
    (Operator::Null, "null", null),
    (Operator::NotNull, "notnull", not_null),
    (Operator::StartsWith, "startswith", starts_with),
    (Operator::EndsWith, "endswith", ends_with),
    (Operator::Match, "match", full_match),
    (Operator::Contains, "contains", contains),
];

impl Operator {
    /// The registry row for this operator.
    fn entry(self) -> &'static (Self, &'static str, Predicate) {
        // rows are laid out in declaration order
        &REGISTRY[self as usize]
    }

    /// The token this operator is written as.
    #[must_use]
    pub fn token(self) -> &'static str {
        self.entry().1
    }

    /// The predicate this operator dispatches to.
    #[must_use]
    pub fn predicate(self) -> Predicate {
        self.entry().2
    }

    /// Apply the operator to a field and an operand.
    #[must_use]
    pub fn test(self, field: Option<&Value>, operand: &Value) -> bool {
        (self.predicate())(field, operand)
    }

    /// Whether the operator compiles its operand into a regex.
    #[must_use]
    pub const fn is_pattern(self) -> bool {
        matches!(self, Self::StartsWith | Self::Match)
    }

    /// The regex source this operator matches with, for pattern operators
    /// whose operand has a text form.
    #[must_use]
    pub fn pattern(self, operand: &Value) -> Option<String> {
        let operand = text(Some(operand))?;
        match self {
            Self::StartsWith => Some(format!("^(?:{operand})")),
            Self::Match => {
                let inner = operand
                    .trim_start_matches(['/', '^'])
                    .trim_end_matches(['$', '/']);
                Some(format!("^(?:{inner})$"))
            }
            _ => None,
        }
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        REGISTRY
            .iter()
            .find(|(_, token, _)| *token == s)
            .map(|(op, _, _)| *op)
            .ok_or_else(|| QueryError::ConditionNotAllowed(s.to_string()))
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.token().to_string()
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// Compile a pattern, logging and discarding it if it is not a valid regex.
pub(crate) fn compile_pattern(source: &str) -> Option<Regex> {
    match Regex::new(source) {
        Ok(re) => Some(re),
        Err(err) => {
            log::warn!("pattern {source:?} never matches: {err}");
            None
        }
    }
}

/// Whether the text form of `field` matches `re`.
pub(crate) fn pattern_matches(re: &Regex, field: Option<&Value>) -> bool {
    text(field).is_some_and(|t| re.is_match(&t))
}

// ==============================================================================
// Coercion
// ==============================================================================

static NULL: Value = Value::Null;

/// Parse a numeric string, allowing surrounding whitespace but rejecting the
/// `inf`/`nan` spellings `f64::from_str` accepts.
fn numeric_str(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty()
        || !s
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
    {
        return None;
    }
    s.parse().ok()
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x == y,
        _ => match (a.as_u64(), b.as_u64()) {
            (Some(x), Some(y)) => x == y,
            _ => a.as_f64() == b.as_f64(),
        },
    }
}

fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => Some(x.cmp(&y)),
        _ => match (a.as_u64(), b.as_u64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
    }
}

/// Text form of a number: integral floats drop their fraction (`30.0` is
/// `"30"`).
fn number_text(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => {
            format!("{f:.0}")
        }
        _ => n.to_string(),
    }
}

/// Truthiness of a value.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Loose equality, see the module table.
#[must_use]
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), other) | (other, Value::Bool(x)) => *x == truthy(other),
        (Value::Null, Value::String(s)) | (Value::String(s), Value::Null) => {
            s.is_empty()
        }
        (Value::Null, Value::Number(n)) | (Value::Number(n), Value::Null) => {
            n.as_f64() == Some(0.0)
        }
        (Value::Null, Value::Array(items))
        | (Value::Array(items), Value::Null) => items.is_empty(),
        (Value::Null, Value::Object(map)) | (Value::Object(map), Value::Null) => {
            map.is_empty()
        }
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Number(n), Value::String(s))
        | (Value::String(s), Value::Number(n)) => numeric_str(s).map_or_else(
            || number_text(n) == *s,
            |f| n.as_f64() == Some(f),
        ),
        (Value::String(x), Value::String(y)) => {
            match (numeric_str(x), numeric_str(y)) {
                (Some(p), Some(q)) => p == q,
                _ => x == y,
            }
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| loose_eq(p, q))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| loose_eq(v, w)))
        }
        _ => false,
    }
}

/// Ordering between mutually ordered values, `None` otherwise.
#[must_use]
pub fn loose_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::Number(n), Value::String(s)) => {
            n.as_f64()?.partial_cmp(&numeric_str(s)?)
        }
        (Value::String(s), Value::Number(n)) => {
            numeric_str(s)?.partial_cmp(&n.as_f64()?)
        }
        (Value::String(x), Value::String(y)) => {
            match (numeric_str(x), numeric_str(y)) {
                (Some(p), Some(q)) => p.partial_cmp(&q),
                _ => Some(x.cmp(y)),
            }
        }
        _ => None,
    }
}

/// Text form of a field for the pattern operators.
fn text(field: Option<&Value>) -> Option<Cow<'_, str>> {
    match field.unwrap_or(&NULL) {
        Value::String(s) => Some(Cow::Borrowed(s)),
        Value::Number(n) => Some(Cow::Owned(number_text(n))),
        Value::Bool(true) => Some(Cow::Borrowed("1")),
        Value::Bool(false) | Value::Null => Some(Cow::Borrowed("")),
        Value::Array(_) | Value::Object(_) => None,
    }
}

// ==============================================================================
// Predicates
// ==============================================================================

fn equal(field: Option<&Value>, operand: &Value) -> bool {
    loose_eq(field.unwrap_or(&NULL), operand)
}

fn exact_equal(field: Option<&Value>, operand: &Value) -> bool {
    field.unwrap_or(&NULL) == operand
}

fn not_equal(field: Option<&Value>, operand: &Value) -> bool {
    !equal(field, operand)
}

fn not_exact_equal(field: Option<&Value>, operand: &Value) -> bool {
    !exact_equal(field, operand)
}

fn ordered(field: Option<&Value>, operand: &Value) -> Option<Ordering> {
    loose_cmp(field.unwrap_or(&NULL), operand)
}

fn greater(field: Option<&Value>, operand: &Value) -> bool {
    ordered(field, operand) == Some(Ordering::Greater)
}

fn less(field: Option<&Value>, operand: &Value) -> bool {
    ordered(field, operand) == Some(Ordering::Less)
}

fn greater_equal(field: Option<&Value>, operand: &Value) -> bool {
    matches!(ordered(field, operand), Some(Ordering::Greater | Ordering::Equal))
}

fn less_equal(field: Option<&Value>, operand: &Value) -> bool {
    matches!(ordered(field, operand), Some(Ordering::Less | Ordering::Equal))
}

fn is_in(field: Option<&Value>, operand: &Value) -> bool {
    let field = field.unwrap_or(&NULL);
    operand
        .as_array()
        .is_some_and(|items| items.iter().any(|item| loose_eq(field, item)))
}

fn not_in(field: Option<&Value>, operand: &Value) -> bool {
    let field = field.unwrap_or(&NULL);
    operand
        .as_array()
        .is_some_and(|items| !items.iter().any(|item| loose_eq(field, item)))
}

fn null(field: Option<&Value>, operand: &Value) -> bool {
    field.is_none_or(|v| v.is_null() || loose_eq(v, operand))
}

fn not_null(field: Option<&Value>, operand: &Value) -> bool {
    field.is_some_and(|v| !v.is_null() && v != operand)
}

fn starts_with(field: Option<&Value>, operand: &Value) -> bool {
    regex_predicate(Operator::StartsWith, field, operand)
}

fn full_match(field: Option<&Value>, operand: &Value) -> bool {
    regex_predicate(Operator::Match, field, operand)
}

/// Compiles on every call; the evaluator compiles once per condition instead.
fn regex_predicate(op: Operator, field: Option<&Value>, operand: &Value) -> bool {
    op.pattern(operand)
        .and_then(|source| compile_pattern(&source))
        .is_some_and(|re| pattern_matches(&re, field))
}

fn ends_with(field: Option<&Value>, operand: &Value) -> bool {
    match (text(field), text(Some(operand))) {
        (Some(haystack), Some(suffix)) => haystack.ends_with(suffix.as_ref()),
        _ => false,
    }
}

fn contains(field: Option<&Value>, operand: &Value) -> bool {
    match (text(field), text(Some(operand))) {
        (Some(haystack), Some(needle)) => haystack.contains(needle.as_ref()),
        _ => false,
    }
}
