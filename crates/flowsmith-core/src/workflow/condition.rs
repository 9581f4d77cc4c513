//! Routing rule evaluation.
//!
//! A conditional edge inspects the structured output of its source node. Rules
//! are tried in declared order and the first one that holds picks the target;
//! when none holds the edge's default is used. A rule whose field path does not
//! resolve is simply false, for every operator.

use flowsmith_types::workflow::{ConditionalEdge, Operator, Rule};
use serde_json::Value;

use super::substitution::resolve_in_value;

/// Pick the target for `edge` given its source node's output.
pub fn select_target<'a>(edge: &'a ConditionalEdge, output: &Value) -> &'a str {
    edge.rules
        .iter()
        .find(|rule| evaluate_rule(rule, output))
        .map(|rule| rule.target.as_str())
        .unwrap_or(edge.default.as_str())
}

/// Whether `rule` holds for `output`.
pub fn evaluate_rule(rule: &Rule, output: &Value) -> bool {
    match resolve_in_value(output, &rule.field) {
        Some(actual) => compare(rule.operator, actual, &rule.value),
        None => false,
    }
}

/// Apply `operator` with the resolved field on the left and the rule value on
/// the right.
pub fn compare(operator: Operator, actual: &Value, expected: &Value) -> bool {
    match operator {
        Operator::Gt => ordered(actual, expected).is_some_and(|(a, b)| a > b),
        Operator::Lt => ordered(actual, expected).is_some_and(|(a, b)| a < b),
        Operator::Ge => ordered(actual, expected).is_some_and(|(a, b)| a >= b),
        Operator::Le => ordered(actual, expected).is_some_and(|(a, b)| a <= b),
        Operator::Eq => values_equal(actual, expected),
        Operator::Ne => !values_equal(actual, expected),
        Operator::Contains => contains(actual, expected),
        Operator::NotContains => !contains(actual, expected),
        Operator::In => contains_member(expected, actual),
        Operator::NotIn => !contains_member(expected, actual),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn ordered(actual: &Value, expected: &Value) -> Option<(f64, f64)> {
    Some((as_number(actual)?, as_number(expected)?))
}

/// JSON equality, except that a number equals a numerically equal number or
/// numeric string (`8`, `8.0` and `"8"` are all equal).
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_) | Value::String(_))
        | (Value::String(_), Value::Number(_)) => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
        _ => a == b,
    }
}

/// Substring of a string, element of an array, or key of an object.
fn contains(haystack: &Value, needle: &Value) -> bool {
    match (haystack, needle) {
        (Value::String(h), Value::String(n)) => h.contains(n.as_str()),
        (Value::Array(items), _) => items.iter().any(|item| values_equal(item, needle)),
        (Value::Object(map), Value::String(k)) => map.contains_key(k),
        _ => false,
    }
}

/// Whether `member` is an element of the array `collection`, or a substring of
/// the string `collection`.
fn contains_member(collection: &Value, member: &Value) -> bool {
    match (collection, member) {
        (Value::Array(items), _) => items.iter().any(|item| values_equal(item, member)),
        (Value::String(s), Value::String(m)) => s.contains(m.as_str()),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
