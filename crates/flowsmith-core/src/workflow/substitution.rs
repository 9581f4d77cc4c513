//! Placeholder substitution for instructions and parameters.
//!
//! Placeholders look like `{name}` or `{name.path.0.field}` and are resolved
//! against a scope map. A placeholder whose full path does not resolve is left
//! in the text verbatim; substitution never fails. Replacement text is not
//! scanned again, so a value containing braces cannot inject new placeholders.

use std::sync::LazyLock;

use flowsmith_types::workflow::Params;
use regex::{Captures, Regex};
use serde_json::Value;

/// `{ident(.segment)*}`, where segments may be keys or array indices.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_-]*(?:\.[A-Za-z0-9_-]+)*)\}")
        .expect("placeholder pattern is valid")
});

/// A string that is exactly one placeholder and nothing else.
static WHOLE_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\{([A-Za-z_][A-Za-z0-9_-]*(?:\.[A-Za-z0-9_-]+)*)\}$")
        .expect("placeholder pattern is valid")
});

/// Walk a dotted path through the scope.
///
/// The first segment selects a scope entry; later segments index into objects
/// by key and into arrays by position.
pub fn resolve_path<'a>(scope: &'a Params, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = scope.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Resolve a dotted path against a single JSON value (no scope lookup).
pub fn resolve_in_value<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Replace every resolvable placeholder in `text`.
pub fn substitute_str(text: &str, scope: &Params) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| match resolve_path(scope, &caps[1]) {
            Some(value) => render(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Substitute placeholders inside a JSON value, recursing through containers.
///
/// A string that consists of a single resolvable placeholder is replaced by the
/// referenced value itself, keeping its JSON type.
pub fn substitute_value(value: &Value, scope: &Params) -> Value {
    match value {
        Value::String(s) => {
            if let Some(caps) = WHOLE_PLACEHOLDER.captures(s) {
                if let Some(resolved) = resolve_path(scope, &caps[1]) {
                    return resolved.clone();
                }
            }
            Value::String(substitute_str(s, scope))
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute_value(v, scope)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_value(v, scope)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Substitute every value of a parameter map.
pub fn substitute_params(params: &Params, scope: &Params) -> Params {
    params
        .iter()
        .map(|(k, v)| (k.clone(), substitute_value(v, scope)))
        .collect()
}

/// Placeholder paths referenced by `text`, in order of appearance.
pub fn placeholders(text: &str) -> Vec<&str> {
    PLACEHOLDER
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

/// Text form of a value: strings raw, everything else compact JSON.
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => panic!("scope must be an object"),
        }
    }

    #[test]
    fn test_simple_substitution() {
        let s = scope(json!({"topic": "X"}));
        assert_eq!(substitute_str("Research {topic}", &s), "Research X");
    }

    #[test]
    fn test_missing_placeholder_left_verbatim() {
        let s = scope(json!({"topic": "X"}));
        assert_eq!(
            substitute_str("Compare {topic} with {other}", &s),
            "Compare X with {other}"
        );
    }

    #[test]
    fn test_nested_path_and_index() {
        let s = scope(json!({
            "node_a": {"field": "value", "items": [{"name": "first"}, {"name": "second"}]}
        }));
        assert_eq!(substitute_str("{node_a.field}", &s), "value");
        assert_eq!(substitute_str("{node_a.items.1.name}", &s), "second");
        assert_eq!(substitute_str("{node_a.items.9.name}", &s), "{node_a.items.9.name}");
    }

    #[test]
    fn test_field_path_into_string_output_is_a_miss() {
        let s = scope(json!({"node_a": "plain text"}));
        assert_eq!(substitute_str("See {node_a.field}", &s), "See {node_a.field}");
    }

    #[test]
    fn test_non_string_values_render_as_json() {
        let s = scope(json!({"n": 3, "flag": true, "obj": {"k": [1, 2]}}));
        assert_eq!(
            substitute_str("{n} {flag} {obj}", &s),
            r#"3 true {"k":[1,2]}"#
        );
    }

    #[test]
    fn test_replacement_is_not_rescanned() {
        let s = scope(json!({"a": "{b}", "b": "boom"}));
        assert_eq!(substitute_str("{a}", &s), "{b}");
    }

    #[test]
    fn test_non_placeholder_braces_untouched() {
        let s = scope(json!({"x": 1}));
        assert_eq!(substitute_str("{ not one } {1abc} {}", &s), "{ not one } {1abc} {}");
    }

    #[test]
    fn test_whole_placeholder_preserves_type() {
        let s = scope(json!({"limit": 10, "tags": ["a", "b"]}));
        let params = json!({
            "limit": "{limit}",
            "tags": "{tags}",
            "label": "top {limit}",
            "missing": "{nope}",
            "nested": {"inner": ["{limit}"]}
        });
        let out = substitute_value(&params, &s);
        assert_eq!(
            out,
            json!({
                "limit": 10,
                "tags": ["a", "b"],
                "label": "top 10",
                "missing": "{nope}",
                "nested": {"inner": [10]}
            })
        );
    }

    #[test]
    fn test_resolve_path_misses() {
        let s = scope(json!({"a": {"b": 1}}));
        assert_eq!(resolve_path(&s, "a.b"), Some(&json!(1)));
        assert_eq!(resolve_path(&s, "a.c"), None);
        assert_eq!(resolve_path(&s, "a.b.c"), None);
        assert_eq!(resolve_path(&s, "z"), None);
    }

    #[test]
    fn test_placeholders_listed_in_order() {
        assert_eq!(
            placeholders("Use {research} and {analyze.score} for {topic}"),
            vec!["research", "analyze.score", "topic"]
        );
    }
}
