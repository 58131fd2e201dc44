//! Declarative JSON-to-JSON reshaping.
//!
//! A spec is a JSON array of operations applied in order to a working
//! document:
//!
//! ```json
//! [
//!   {"operation": "shift", "spec": {"Results.policy": "data.policy_number"}},
//!   {"operation": "default", "spec": {"Results.source": "broker"}},
//!   {"operation": "timestamp", "spec": {"Results.sent_at": {"inputFormat": "$now", "outputFormat": "2006-01-02T15:04:05Z07:00"}}}
//! ]
//! ```
//!
//! Paths use `a.b[0].c` (or `a.[0].c`) syntax; `[*]` on the read side
//! collects from every element of an array.

use crate::error::TransformError;
use crate::layout;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Largest array index a target path may write to.
const MAX_TARGET_INDEX: usize = 4096;

/// Reshapes an input document according to a spec. Both sides are JSON text.
pub trait Reshaper: Send + Sync {
    fn reshape(&self, spec: &str, input: &str) -> Result<String, TransformError>;
}

#[derive(Debug, Clone, Deserialize)]
struct OperationSpec {
    operation: String,
    #[serde(default)]
    spec: Value,
    #[serde(default)]
    require: bool,
    #[serde(default)]
    over: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Shift,
    Default,
    Timestamp,
    Concat,
    Coalesce,
    Extract,
    Delete,
    Pass,
}

impl Operation {
    fn parse(name: &str) -> Result<Self, TransformError> {
        match name {
            "shift" => Ok(Self::Shift),
            "default" => Ok(Self::Default),
            "timestamp" => Ok(Self::Timestamp),
            "concat" => Ok(Self::Concat),
            "coalesce" => Ok(Self::Coalesce),
            "extract" => Ok(Self::Extract),
            "delete" => Ok(Self::Delete),
            "pass" => Ok(Self::Pass),
            other => Err(TransformError::invalid_spec(format!(
                "unknown operation '{other}'"
            ))),
        }
    }
}

/// The built-in [`Reshaper`].
///
/// `$now` timestamps use the wall clock unless the reshaper was pinned to a
/// fixed instant with [`SpecReshaper::at`].
#[derive(Debug, Clone, Default)]
pub struct SpecReshaper {
    now: Option<DateTime<Utc>>,
}

impl SpecReshaper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now: Some(now) }
    }

    fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    fn apply(&self, op: &OperationSpec, doc: Value) -> Result<Value, TransformError> {
        let kind = Operation::parse(&op.operation)?;

        if let Some(over) = op.over.as_deref() {
            let mut doc = doc;
            let path = JsonPath::parse(over)?;
            let items = match path.get(&doc) {
                Some(Value::Array(items)) => items,
                Some(_) => {
                    return Err(TransformError::invalid_input(format!(
                        "'over' path '{over}' is not an array"
                    )))
                }
                None => return Ok(doc),
            };
            let reshaped = items
                .into_iter()
                .map(|item| self.apply_one(kind, op, item))
                .collect::<Result<Vec<_>, _>>()?;
            path.set(&mut doc, Value::Array(reshaped))?;
            return Ok(doc);
        }

        self.apply_one(kind, op, doc)
    }

    fn apply_one(
        &self,
        kind: Operation,
        op: &OperationSpec,
        doc: Value,
    ) -> Result<Value, TransformError> {
        match kind {
            Operation::Shift => shift(&op.spec, &doc, op.require),
            Operation::Default => default(&op.spec, doc),
            Operation::Timestamp => self.timestamp(&op.spec, doc, op.require),
            Operation::Concat => concat(&op.spec, doc),
            Operation::Coalesce => coalesce(&op.spec, doc, op.require),
            Operation::Extract => extract(&op.spec, doc, op.require),
            Operation::Delete => delete(&op.spec, doc),
            Operation::Pass => Ok(doc),
        }
    }

    fn timestamp(&self, spec: &Value, mut doc: Value, require: bool) -> Result<Value, TransformError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct TimestampSpec {
            input_format: String,
            output_format: String,
        }

        for (target, raw) in spec_object(spec, "timestamp")? {
            let conversion: TimestampSpec = serde_json::from_value(raw.clone()).map_err(|err| {
                TransformError::InvalidSpec {
                    context: common::diag!("timestamp '{}': {}", target, err),
                    source: Some(err),
                }
            })?;
            let path = JsonPath::parse(target)?;

            let instant = if conversion.input_format == "$now" {
                self.now().fixed_offset()
            } else {
                let Some(current) = path.get(&doc) else {
                    if require {
                        return Err(TransformError::missing_path(target));
                    }
                    continue;
                };
                let Some(text) = current.as_str() else {
                    return Err(TransformError::invalid_input(format!(
                        "timestamp '{target}' is not a string"
                    )));
                };
                layout::parse(text, &conversion.input_format).map_err(|err| {
                    TransformError::timestamp(
                        format!("'{text}' does not match '{}'", conversion.input_format),
                        Some(err),
                    )
                })?
            };

            let rendered = match conversion.output_format.as_str() {
                "$unix" => Value::from(instant.timestamp()),
                out => Value::String(layout::format(&instant, out)),
            };
            path.set(&mut doc, rendered)?;
        }
        Ok(doc)
    }
}

impl Reshaper for SpecReshaper {
    fn reshape(&self, spec: &str, input: &str) -> Result<String, TransformError> {
        if input.trim().is_empty() {
            return Err(TransformError::invalid_input("input document is empty"));
        }
        let operations: Vec<OperationSpec> =
            serde_json::from_str(spec).map_err(|err| TransformError::InvalidSpec {
                context: common::diag!("spec is not a list of operations: {}", err),
                source: Some(err),
            })?;
        let mut doc: Value =
            serde_json::from_str(input).map_err(|err| TransformError::InvalidInput {
                context: common::diag!("{}", err),
                source: Some(err),
            })?;

        for op in &operations {
            tracing::trace!(operation = %op.operation, "applying reshape operation");
            doc = self.apply(op, doc)?;
        }

        serde_json::to_string(&doc).map_err(|err| TransformError::InvalidInput {
            context: common::diag!("reshaped document is not serialisable: {}", err),
            source: Some(err),
        })
    }
}

fn spec_object<'a>(spec: &'a Value, operation: &str) -> Result<&'a Map<String, Value>, TransformError> {
    spec.as_object().ok_or_else(|| {
        TransformError::invalid_spec(format!("'{operation}' expects an object spec"))
    })
}

fn read(doc: &Value, source: &str, require: bool) -> Result<Value, TransformError> {
    match source {
        "$" => return Ok(doc.clone()),
        "" => return Ok(Value::Null),
        _ => {}
    }
    match JsonPath::parse(source)?.get(doc) {
        Some(value) => Ok(value),
        None if require => Err(TransformError::missing_path(source)),
        None => Ok(Value::Null),
    }
}

fn shift(spec: &Value, doc: &Value, require: bool) -> Result<Value, TransformError> {
    let mut out = Value::Object(Map::new());
    for (target, source) in spec_object(spec, "shift")? {
        let value = match source {
            Value::String(path) => read(doc, path, require)?,
            Value::Array(paths) => Value::Array(
                paths
                    .iter()
                    .map(|path| match path.as_str() {
                        Some(path) => read(doc, path, require),
                        None => Err(TransformError::invalid_spec(format!(
                            "shift '{target}' sources must be strings"
                        ))),
                    })
                    .collect::<Result<_, _>>()?,
            ),
            _ => {
                return Err(TransformError::invalid_spec(format!(
                    "shift '{target}' expects a path or a list of paths"
                )))
            }
        };
        if target == "$" {
            out = value;
        } else {
            JsonPath::parse(target)?.set(&mut out, value)?;
        }
    }
    Ok(out)
}

fn default(spec: &Value, mut doc: Value) -> Result<Value, TransformError> {
    for (target, value) in spec_object(spec, "default")? {
        JsonPath::parse(target)?.set(&mut doc, value.clone())?;
    }
    Ok(doc)
}

fn concat(spec: &Value, mut doc: Value) -> Result<Value, TransformError> {
    #[derive(Deserialize)]
    struct Source {
        path: Option<String>,
        value: Option<Value>,
    }
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct ConcatSpec {
        sources: Vec<Source>,
        target_path: String,
        #[serde(default)]
        delim: String,
    }

    let spec: ConcatSpec =
        serde_json::from_value(spec.clone()).map_err(|err| TransformError::InvalidSpec {
            context: common::diag!("concat: {}", err),
            source: Some(err),
        })?;

    let mut parts = Vec::with_capacity(spec.sources.len());
    for source in &spec.sources {
        let piece = match (&source.value, &source.path) {
            (Some(value), _) => crate::path::string_form(value),
            (None, Some(path)) => JsonPath::parse(path)?
                .get(&doc)
                .map(|value| crate::path::string_form(&value))
                .unwrap_or_default(),
            (None, None) => {
                return Err(TransformError::invalid_spec(
                    "concat sources need a 'path' or a 'value'",
                ))
            }
        };
        parts.push(piece);
    }

    JsonPath::parse(&spec.target_path)?.set(&mut doc, Value::String(parts.join(&spec.delim)))?;
    Ok(doc)
}

fn coalesce(spec: &Value, mut doc: Value, require: bool) -> Result<Value, TransformError> {
    for (target, candidates) in spec_object(spec, "coalesce")? {
        let Some(candidates) = candidates.as_array() else {
            return Err(TransformError::invalid_spec(format!(
                "coalesce '{target}' expects a list of paths"
            )));
        };
        let mut found = None;
        for candidate in candidates.iter().filter_map(Value::as_str) {
            if let Some(value) = JsonPath::parse(candidate)?.get(&doc) {
                if !value.is_null() {
                    found = Some(value);
                    break;
                }
            }
        }
        match found {
            Some(value) => JsonPath::parse(target)?.set(&mut doc, value)?,
            None if require => return Err(TransformError::missing_path(target)),
            None => {}
        }
    }
    Ok(doc)
}

fn extract(spec: &Value, doc: Value, require: bool) -> Result<Value, TransformError> {
    let Some(path) = spec.get("path").and_then(Value::as_str) else {
        return Err(TransformError::invalid_spec("extract expects a 'path'"));
    };
    read(&doc, path, require)
}

fn delete(spec: &Value, mut doc: Value) -> Result<Value, TransformError> {
    let Some(paths) = spec.get("paths").and_then(Value::as_array) else {
        return Err(TransformError::invalid_spec("delete expects a list of 'paths'"));
    };
    for path in paths.iter().filter_map(Value::as_str) {
        JsonPath::parse(path)?.delete(&mut doc);
    }
    Ok(doc)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
    Each,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct JsonPath(Vec<Segment>);

impl JsonPath {
    fn parse(raw: &str) -> Result<Self, TransformError> {
        if raw.is_empty() {
            return Err(TransformError::invalid_spec("empty path"));
        }
        let mut segments = Vec::new();
        for part in raw.split('.') {
            let (key, mut brackets) = match part.find('[') {
                Some(pos) => (&part[..pos], &part[pos..]),
                None => (part, ""),
            };
            if !key.is_empty() {
                segments.push(Segment::Key(key.to_string()));
            }
            while !brackets.is_empty() {
                let close = brackets.find(']').ok_or_else(|| {
                    TransformError::invalid_spec(format!("unclosed '[' in path '{raw}'"))
                })?;
                let inner = &brackets[1..close];
                let segment = if inner == "*" {
                    Segment::Each
                } else {
                    inner.parse::<usize>().map(Segment::Index).map_err(|_| {
                        TransformError::invalid_spec(format!(
                            "'{inner}' is not an array index in path '{raw}'"
                        ))
                    })?
                };
                segments.push(segment);
                brackets = &brackets[close + 1..];
                if !brackets.is_empty() && !brackets.starts_with('[') {
                    return Err(TransformError::invalid_spec(format!(
                        "unexpected '{brackets}' in path '{raw}'"
                    )));
                }
            }
        }
        Ok(Self(segments))
    }

    fn get(&self, doc: &Value) -> Option<Value> {
        Self::get_from(doc, &self.0)
    }

    fn get_from(current: &Value, segments: &[Segment]) -> Option<Value> {
        let Some((head, rest)) = segments.split_first() else {
            return Some(current.clone());
        };
        match (head, current) {
            (Segment::Key(key), Value::Object(map)) => {
                map.get(key).and_then(|next| Self::get_from(next, rest))
            }
            (Segment::Index(idx), Value::Array(items)) => {
                items.get(*idx).and_then(|next| Self::get_from(next, rest))
            }
            (Segment::Each, Value::Array(items)) => Some(Value::Array(
                items
                    .iter()
                    .filter_map(|item| Self::get_from(item, rest))
                    .collect(),
            )),
            _ => None,
        }
    }

    fn set(&self, doc: &mut Value, value: Value) -> Result<(), TransformError> {
        let mut current = doc;
        for segment in &self.0 {
            current = match segment {
                Segment::Key(key) => {
                    if !current.is_object() {
                        *current = Value::Object(Map::new());
                    }
                    current
                        .as_object_mut()
                        .map(|map| map.entry(key.clone()).or_insert(Value::Null))
                        .ok_or_else(|| TransformError::invalid_spec(format!("cannot set '{key}'")))?
                }
                Segment::Index(idx) => {
                    if !current.is_array() {
                        *current = Value::Array(Vec::new());
                    }
                    let items = current.as_array_mut().ok_or_else(|| {
                        TransformError::invalid_spec(format!("cannot index [{idx}]"))
                    })?;
                    if *idx > MAX_TARGET_INDEX {
                        return Err(TransformError::invalid_spec(format!(
                            "target index [{idx}] exceeds {MAX_TARGET_INDEX}"
                        )));
                    }
                    if items.len() <= *idx {
                        items.resize(*idx + 1, Value::Null);
                    }
                    &mut items[*idx]
                }
                Segment::Each => {
                    return Err(TransformError::invalid_spec(
                        "'[*]' cannot be used in a target path",
                    ))
                }
            };
        }
        *current = value;
        Ok(())
    }

    fn delete(&self, doc: &mut Value) {
        let Some((last, parents)) = self.0.split_last() else {
            return;
        };
        let mut current = doc;
        for segment in parents {
            let next = match (segment, current) {
                (Segment::Key(key), Value::Object(map)) => map.get_mut(key),
                (Segment::Index(idx), Value::Array(items)) => items.get_mut(*idx),
                _ => None,
            };
            match next {
                Some(next) => current = next,
                None => return,
            }
        }
        match (last, current) {
            (Segment::Key(key), Value::Object(map)) => {
                map.remove(key);
            }
            (Segment::Index(idx), Value::Array(items)) if *idx < items.len() => {
                items.remove(*idx);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn run(spec: Value, input: Value) -> Value {
        let out = SpecReshaper::new()
            .reshape(&spec.to_string(), &input.to_string())
            .expect("reshape");
        serde_json::from_str(&out).expect("json output")
    }

    #[test]
    fn test_shift_paths_arrays_and_root() {
        let out = run(
            json!([{"operation": "shift", "spec": {
                "Results.policy": "data.policy_number",
                "Results.items[0].id": "data.items[1].id",
                "Results.ids": ["data.items[0].id", "data.items.[1].id"],
                "Results.all_ids": "data.items[*].id",
                "Results.missing": "data.nope",
                "raw": "$"
            }}]),
            json!({"data": {"policy_number": "P-1", "items": [{"id": 10}, {"id": 11}]}}),
        );
        assert_eq!(out["Results"]["policy"], json!("P-1"));
        assert_eq!(out["Results"]["items"], json!([{"id": 11}]));
        assert_eq!(out["Results"]["ids"], json!([10, 11]));
        assert_eq!(out["Results"]["all_ids"], json!([10, 11]));
        assert_eq!(out["Results"]["missing"], Value::Null);
        assert_eq!(out["raw"]["data"]["policy_number"], json!("P-1"));
    }

    #[test]
    fn test_shift_require() {
        let err = SpecReshaper::new()
            .reshape(
                r#"[{"operation": "shift", "require": true, "spec": {"a": "b.c"}}]"#,
                r#"{"b": {}}"#,
            )
            .expect_err("required path");
        assert!(matches!(err, TransformError::MissingPath { .. }));
    }

    #[test]
    fn test_default_concat_delete() {
        let out = run(
            json!([
                {"operation": "default", "spec": {"meta.source": "broker", "meta.version": 2}},
                {"operation": "concat", "spec": {
                    "sources": [{"value": "ID"}, {"path": "policy"}, {"path": "nope"}],
                    "targetPath": "meta.key",
                    "delim": "-"
                }},
                {"operation": "delete", "spec": {"paths": ["secret", "meta.version"]}}
            ]),
            json!({"policy": "P-1", "secret": "x"}),
        );
        assert_eq!(
            out,
            json!({"policy": "P-1", "meta": {"source": "broker", "key": "ID-P-1-"}})
        );
    }

    #[test]
    fn test_timestamp_conversion_and_now() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let out = SpecReshaper::at(now)
            .reshape(
                &json!([{"operation": "timestamp", "spec": {
                    "issued": {"inputFormat": "02/01/2006", "outputFormat": "2006-01-02T15:04:05Z07:00"},
                    "sent_at": {"inputFormat": "$now", "outputFormat": "2006-01-02 15:04:05"},
                    "epoch": {"inputFormat": "$now", "outputFormat": "$unix"},
                    "absent": {"inputFormat": "2006", "outputFormat": "2006"}
                }}])
                .to_string(),
                r#"{"issued": "19/05/2022"}"#,
            )
            .expect("reshape");
        let out: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(out["issued"], json!("2022-05-19T00:00:00Z"));
        assert_eq!(out["sent_at"], json!("2024-01-02 03:04:05"));
        assert_eq!(out["epoch"], json!(1704164645));
        assert!(out.get("absent").is_none());
    }

    #[test]
    fn test_over_and_coalesce() {
        let out = run(
            json!([
                {"operation": "coalesce", "spec": {"name": ["nick", "full_name"]}},
                {"operation": "default", "over": "rows", "spec": {"kind": "row"}}
            ]),
            json!({"full_name": "Ann", "rows": [{"id": 1}, {"id": 2}]}),
        );
        assert_eq!(out["name"], json!("Ann"));
        assert_eq!(out["rows"], json!([{"id": 1, "kind": "row"}, {"id": 2, "kind": "row"}]));
    }

    #[test]
    fn test_pass_and_extract() {
        assert_eq!(run(json!([{"operation": "pass"}]), json!({"a": 1})), json!({"a": 1}));
        assert_eq!(
            run(json!([{"operation": "extract", "spec": {"path": "a.b"}}]), json!({"a": {"b": [1]}})),
            json!([1])
        );
    }

    #[test]
    fn test_errors() {
        let reshaper = SpecReshaper::new();
        assert!(matches!(
            reshaper.reshape(r#"[{"operation": "explode"}]"#, "{}"),
            Err(TransformError::InvalidSpec { .. })
        ));
        assert!(matches!(
            reshaper.reshape("[]", "   "),
            Err(TransformError::InvalidInput { .. })
        ));
        assert!(matches!(
            reshaper.reshape("[]", "{not json"),
            Err(TransformError::InvalidInput { .. })
        ));
        assert!(matches!(
            reshaper.reshape("{}", "{}"),
            Err(TransformError::InvalidSpec { .. })
        ));
    }

    #[test]
    fn test_target_index_is_bounded() {
        let reshaper = SpecReshaper::new();
        assert!(matches!(
            reshaper.reshape(
                r#"[{"operation": "default", "spec": {"a[99999999999]": 1}}]"#,
                "{}"
            ),
            Err(TransformError::InvalidSpec { .. })
        ));
        assert_eq!(
            run(json!([{"operation": "default", "spec": {"a[2]": 1}}]), json!({})),
            json!({"a": [null, null, 1]})
        );
    }
}
