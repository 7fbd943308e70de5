/*!
# Condition Parser

Parser for converting WHERE expression strings into [`ConditionSet`] objects.

## Examples

```rust
use jsonwhere::condition::parser;
let parsed = parser::parse_conditions(r#"age >= 30 and name contains "ex" or vip = true"#)
    .expect("Invalid expression");
assert_eq!(parsed.groups().len(), 2);
assert_eq!(
    r#"age >= 30 and name contains "ex" or vip = true"#,
    parsed.to_string()
);
```

Operators are not checked here; `age ~= 1` parses and fails only when it is
evaluated.

## Errors

If the input is invalid, [`parse_conditions`] returns a
[`ConditionParseError`] describing how the parsing failed:

```rust
use jsonwhere::condition::parser::{self, ConditionParseError};

let result = parser::parse_conditions("age >= 30 and");
assert!(matches!(result, Err(ConditionParseError::UnexpectedToken(_))));
```
*/

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use serde_json::Value;
use std::error::Error;
use std::fmt;

use super::{ConditionBuilder, ConditionSet};

/// Parser for turning raw WHERE expressions into [`ConditionSet`] objects.
#[derive(Parser)]
#[grammar = "condition/grammar/where.pest"]
pub struct WhereParser;

/// Represents errors that can occur while parsing a WHERE expression.
#[derive(Debug, Clone)]
pub enum ConditionParseError {
    /// Unexpected token encountered during parsing.
    UnexpectedToken(String),
    /// A literal operand is not valid JSON, e.g. `007`.
    InvalidLiteral(String),
    /// The input ended unexpectedly, indicating an incomplete expression.
    UnexpectedEndOfInput,
}

impl Error for ConditionParseError {}

impl fmt::Display for ConditionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedToken(token) => {
                write!(f, "Unexpected token: {token}")
            }
            Self::InvalidLiteral(literal) => {
                write!(f, "Invalid literal: {literal}")
            }
            Self::UnexpectedEndOfInput => {
                write!(f, "Unexpected end of input")
            }
        }
    }
}

/// Parse an input expression into a [`ConditionSet`]. The empty expression
/// yields an empty set.
///
/// # Errors
///
/// Returns a [`ConditionParseError`] describing how the parsing failed.
pub fn parse_conditions(input: &str) -> Result<ConditionSet, ConditionParseError> {
    let mut pairs = WhereParser::parse(Rule::expression, input)
        .map_err(|e| ConditionParseError::UnexpectedToken(e.to_string()))?;

    let expression = pairs.next().ok_or(ConditionParseError::UnexpectedEndOfInput)?;

    match expression.into_inner().next() {
        Some(pair) if pair.as_rule() == Rule::disjunction => {
            Ok(parse_disjunction(pair)?.build())
        }
        Some(_) => Ok(ConditionSet::default()),
        None => Err(ConditionParseError::UnexpectedEndOfInput),
    }
}

/// Parse a disjunction rule: every conjunction after the first opens a new
/// group.
fn parse_disjunction(pair: Pair<Rule>) -> Result<ConditionBuilder, ConditionParseError> {
    expect_rule(&pair, Rule::disjunction)?;

    let mut builder = ConditionBuilder::new();
    let conjunctions = pair.into_inner().filter(|p| p.as_rule() != Rule::or_kw);
    for (i, conjunction) in conjunctions.enumerate() {
        expect_rule(&conjunction, Rule::conjunction)?;
        let clauses = conjunction
            .into_inner()
            .filter(|p| p.as_rule() != Rule::and_kw);
        for (j, clause) in clauses.enumerate() {
            let (key, operator, value) = parse_clause(clause)?;
            builder = if i > 0 && j == 0 {
                builder.or_where(key, operator, value)
            } else {
                builder.and_where(key, operator, value)
            };
        }
    }
    Ok(builder)
}

/// Parse a clause rule into its key, operator token and operand. A missing
/// operand is `null`.
fn parse_clause(
    pair: Pair<Rule>,
) -> Result<(String, String, Value), ConditionParseError> {
    expect_rule(&pair, Rule::clause)?;

    let mut inner = pair.into_inner();

    let key_pair = inner.next().ok_or(ConditionParseError::UnexpectedEndOfInput)?;
    let key = match key_pair.as_rule() {
        Rule::ident => key_pair.as_str().to_string(),
        Rule::string => serde_json::from_str(key_pair.as_str()).map_err(|_| {
            ConditionParseError::InvalidLiteral(key_pair.as_str().to_string())
        })?,
        other => {
            return Err(ConditionParseError::UnexpectedToken(format!(
                "Expected key, got {other:?}"
            )));
        }
    };

    let operator_pair = inner.next().ok_or(ConditionParseError::UnexpectedEndOfInput)?;
    expect_rule(&operator_pair, Rule::operator)?;
    let operator = operator_pair.as_str().to_string();

    let value = inner.next().map(parse_literal).transpose()?.unwrap_or(Value::Null);

    Ok((key, operator, value))
}

/// Parse a literal rule by handing its span to `serde_json`.
fn parse_literal(pair: Pair<Rule>) -> Result<Value, ConditionParseError> {
    expect_rule(&pair, Rule::literal)?;
    serde_json::from_str(pair.as_str())
        .map_err(|_| ConditionParseError::InvalidLiteral(pair.as_str().to_string()))
}

fn expect_rule(pair: &Pair<Rule>, rule: Rule) -> Result<(), ConditionParseError> {
    if pair.as_rule() == rule {
        Ok(())
    } else {
        Err(ConditionParseError::UnexpectedToken(format!(
            "Expected {rule:?} rule, got {:?}",
            pair.as_rule()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_single_clause() {
        let expr = "age >= 30";
        let result = parse_conditions(expr).unwrap();
        assert_eq!(expr, result.to_string());
    }

    #[test]
    fn parse_conjunction_and_disjunction() {
        let expr = r#"age >= 30 and name startswith "R" or vip = true"#;
        let result = parse_conditions(expr).unwrap();
        assert_eq!(result.groups().len(), 2);
        assert_eq!(result.groups()[0].len(), 2);
        assert_eq!(expr, result.to_string());
    }

    #[test]
    fn parse_symbolic_connectives() {
        let result = parse_conditions("a = 1 && b = 2 || c = 3").unwrap();
        assert_eq!("a = 1 and b = 2 or c = 3", result.to_string());
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let result = parse_conditions("a = 1 AND b = 2 Or c = 3").unwrap();
        assert_eq!(result.groups().len(), 2);
    }

    #[test]
    fn parse_without_spaces_around_symbols() {
        let result = parse_conditions("age>=-5").unwrap();
        let condition = &result.groups()[0].conditions()[0];
        assert_eq!(condition.operator, ">=");
        assert_eq!(condition.value, json!(-5));
    }

    #[test]
    fn parse_literals() {
        let result = parse_conditions(
            r#"a in [1, "two", null] and b = {"x": [true]} and c = 1.5e2 and d = false"#,
        )
        .unwrap();
        let values: Vec<&Value> =
            result.conditions().map(|c| &c.value).collect();
        assert_eq!(
            values,
            [&json!([1, "two", null]), &json!({"x": [true]}), &json!(150.0), &json!(false)]
        );
    }

    #[test]
    fn missing_operand_is_null() {
        let expr = "deleted_at null and email notnull";
        let result = parse_conditions(expr).unwrap();
        assert!(result.conditions().all(|c| c.value.is_null()));
        assert_eq!(expr, result.to_string());
    }

    #[test]
    fn quoted_keys() {
        let expr = r#""first name" = "Rex" and "and" = 1"#;
        let result = parse_conditions(expr).unwrap();
        assert_eq!(result.groups()[0].conditions()[0].key, "first name");
        assert_eq!(expr, result.to_string());
    }

    #[test]
    fn unknown_operator_parses() {
        let result = parse_conditions("age ~= 30").unwrap();
        assert_eq!(result.groups()[0].conditions()[0].operator, "~=");
    }

    #[test]
    fn parse_empty() {
        let result = parse_conditions("  ").unwrap();
        assert!(result.is_empty());
        assert_eq!("", result.to_string());
    }

    #[test]
    fn parse_invalid_number_literal() {
        let result = parse_conditions("age = 007");
        assert!(
            matches!(result, Err(ConditionParseError::InvalidLiteral(_))),
            "Actual result: {result:?}"
        );
    }

    #[test]
    fn parse_dangling_connective() {
        let result = parse_conditions("age = 1 and");
        assert!(matches!(result, Err(ConditionParseError::UnexpectedToken(_))));
    }

    #[test]
    fn parse_unclosed_string() {
        let result = parse_conditions(r#"name = "Rex"#);
        assert!(matches!(result, Err(ConditionParseError::UnexpectedToken(_))));
    }

    #[test]
    fn parse_missing_connective() {
        let result = parse_conditions("a = 1 b = 2");
        assert!(matches!(result, Err(ConditionParseError::UnexpectedToken(_))));
    }
}
