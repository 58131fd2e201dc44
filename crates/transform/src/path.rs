//! Dotted path lookups over JSON documents.
//!
//! Paths are dot separated. A numeric component indexes an array, `\.`
//! escapes a literal dot inside a key, and `#` on an array yields its length
//! (or, followed by more components, the array of those components looked up
//! on every element). `0.certificate` on `[{"certificate": "x"}]` is `"x"`.

use serde_json::Value;
use std::borrow::Cow;

/// Look up `path` in `root`.
///
/// Returns a borrowed value for plain navigation and an owned one when the
/// path contains `#`. An empty path never matches.
pub fn get<'a>(root: &'a Value, path: &str) -> Option<Cow<'a, Value>> {
    if path.is_empty() {
        return None;
    }
    let components = split(path);
    walk(root, &components)
}

/// String form of a looked-up value: strings verbatim, `null` as empty,
/// everything else as compact JSON text.
pub fn string_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// [`get`] followed by [`string_form`]; an absent path gives `""`.
pub fn get_string(root: &Value, path: &str) -> String {
    get(root, path)
        .map(|value| string_form(&value))
        .unwrap_or_default()
}

/// Integer coercion: numbers truncate, numeric strings parse, `true` is 1,
/// anything else is 0.
pub fn as_int(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|u| u as i64))
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
                .unwrap_or(0)
        }
        Value::Bool(true) => 1,
        _ => 0,
    }
}

/// Float coercion with the same rules as [`as_int`].
pub fn as_float(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Value::Bool(true) => 1.0,
        _ => 0.0,
    }
}

/// Boolean coercion: non-zero numbers and strings parsing as `true`.
pub fn as_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "t"),
        _ => false,
    }
}

fn split(path: &str) -> Vec<String> {
    let mut components = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '.' => components.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    components.push(current);
    components
}

fn walk<'a>(current: &'a Value, components: &[String]) -> Option<Cow<'a, Value>> {
    let Some((head, rest)) = components.split_first() else {
        return Some(Cow::Borrowed(current));
    };

    match current {
        Value::Object(map) => map.get(head.as_str()).and_then(|next| walk(next, rest)),
        Value::Array(items) if head == "#" => {
            if rest.is_empty() {
                return Some(Cow::Owned(Value::from(items.len())));
            }
            let collected = items
                .iter()
                .filter_map(|item| walk(item, rest))
                .map(Cow::into_owned)
                .collect();
            Some(Cow::Owned(Value::Array(collected)))
        }
        Value::Array(items) => head
            .parse::<usize>()
            .ok()
            .and_then(|idx| items.get(idx))
            .and_then(|next| walk(next, rest)),
        _ => None,
    }
}
