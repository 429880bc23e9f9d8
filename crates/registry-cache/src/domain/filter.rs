//! # Member Filters
//!
//! Operator queries arrive as a JSON object of `field -> {"$in": [..]}` or
//! `field -> value`. Only `$in` is allowed and only whitelisted fields may
//! be named.

use serde_json::{Map, Value};

use super::errors::RegistryCacheError;
use super::member::{AttributeKey, MemberRecord};

/// Identity fields that may be filtered on, besides every attribute key.
pub const IDENTITY_FIELDS: [&str; 7] = [
    "node",
    "parentNode",
    "label",
    "owner",
    "resolver",
    "address",
    "reverseNode",
];

const IN_OPERATOR: &str = "$in";

/// One field constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals the value.
    Eq(Value),
    /// Field equals one of the values.
    In(Vec<Value>),
}

/// A validated member filter. An empty filter matches everything.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MemberFilter {
    conditions: Vec<(String, Condition)>,
}

impl MemberFilter {
    /// Filter matching every member.
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter on one attribute value.
    pub fn attribute_eq(key: AttributeKey, value: impl Into<Value>) -> Self {
        Self {
            conditions: vec![(key.as_str().to_string(), Condition::Eq(value.into()))],
        }
    }

    /// Parse and validate a filter query string. Blank input matches all.
    pub fn parse(raw: &str) -> Result<Self, RegistryCacheError> {
        if raw.trim().is_empty() {
            return Ok(Self::all());
        }
        let value: Value = serde_json::from_str(raw)
            .map_err(|_| RegistryCacheError::invalid_filter("Filter querystring in not valid"))?;
        match value {
            Value::Object(fields) => Self::from_object(fields),
            _ => Err(RegistryCacheError::invalid_filter(
                "Filter querystring in not valid",
            )),
        }
    }

    fn from_object(fields: Map<String, Value>) -> Result<Self, RegistryCacheError> {
        let unknown: Map<String, Value> = fields
            .keys()
            .filter(|field| !is_filterable(field))
            .map(|field| {
                (
                    field.clone(),
                    Value::Array(vec![Value::String(format!(
                        "property {} should not exist",
                        field
                    ))]),
                )
            })
            .collect();
        if !unknown.is_empty() {
            return Err(RegistryCacheError::InvalidFilter {
                message: "Filter querystring in not valid".to_string(),
                fields: Some(Value::Object(unknown)),
            });
        }

        let mut conditions = Vec::with_capacity(fields.len());
        for (field, constraint) in fields {
            let condition = match constraint {
                Value::Object(operators) if !operators.is_empty() => {
                    parse_operators(&field, operators)?
                }
                other => Condition::Eq(other),
            };
            conditions.push((field, condition));
        }
        Ok(Self { conditions })
    }

    /// True if no constraint is set.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// True if `record` satisfies every constraint.
    pub fn matches(&self, record: &MemberRecord) -> bool {
        self.conditions.iter().all(|(field, condition)| {
            let actual = record.field_value(field);
            match condition {
                Condition::Eq(expected) => value_matches(actual.as_ref(), expected),
                Condition::In(options) => options
                    .iter()
                    .any(|expected| value_matches(actual.as_ref(), expected)),
            }
        })
    }
}

fn is_filterable(field: &str) -> bool {
    IDENTITY_FIELDS.contains(&field) || AttributeKey::parse(field).is_some()
}

fn parse_operators(
    field: &str,
    operators: Map<String, Value>,
) -> Result<Condition, RegistryCacheError> {
    let mut values = Vec::new();
    for (operator, operand) in operators {
        if operator != IN_OPERATOR {
            return Err(RegistryCacheError::invalid_filter(format!(
                "Field [{}] has unallowed operator [{}]",
                field, operator
            )));
        }
        match operand {
            Value::Array(items) => values.extend(items),
            other => {
                return Err(RegistryCacheError::invalid_filter(format!(
                    "Field [{}] with operator [{}] has wrong value [{}]",
                    field, IN_OPERATOR, other
                )))
            }
        }
    }
    Ok(Condition::In(values))
}

/// Equality with array membership: an array field matches any element.
fn value_matches(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None => expected.is_null(),
        Some(actual) if actual == expected => true,
        Some(Value::Array(items)) => items.contains(expected),
        Some(_) => false,
    }
}
