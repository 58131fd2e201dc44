use crate::error::UpdateError;
use crate::escape::escape_string;
use common::config::{ConfigKey, UpdateDataConfig, UpdateDataMapping};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::Span;
use transform::path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Literal,
    Prepared,
}

/// What happens when a column value cannot be resolved: `Lenient` renders
/// whatever is left (an empty fragment, `NULL`, a typed zero), `Strict`
/// raises [`UpdateError::ResolutionError`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionMode {
    #[default]
    Lenient,
    Strict,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    pub output: OutputMode,
    pub resolution: ResolutionMode,
}

impl UpdateOptions {
    pub fn prepared(mut self) -> Self {
        self.output = OutputMode::Prepared;
        self
    }

    pub fn strict(mut self) -> Self {
        self.resolution = ResolutionMode::Strict;
        self
    }
}

/// How a column mapping obtains its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnOp {
    /// `JSON_SET` on the column named by the first segment of the key.
    Json,
    /// Plain assignment of a value looked up in the response.
    GJson,
    /// Capture group of a pattern applied to a response string.
    Regex(usize),
    /// The configured value itself.
    Static,
}

impl ColumnOp {
    /// Case-insensitive. `regex[n]` selects group `n`; a missing or
    /// non-numeric index selects the whole match. Unknown operations are
    /// static.
    pub fn parse(operation: &str) -> Self {
        let upper = operation.trim().to_ascii_uppercase();
        match upper.as_str() {
            "JSON" => ColumnOp::Json,
            "GJSON" => ColumnOp::GJson,
            op if op.starts_with("REGEX") => {
                let index = op
                    .split_once('[')
                    .and_then(|(_, rest)| rest.split(']').next())
                    .and_then(|idx| idx.parse::<usize>().ok())
                    .unwrap_or(0);
                ColumnOp::Regex(index)
            }
            _ => ColumnOp::Static,
        }
    }
}

/// A resolved column assignment: the literal fragment and the value bound
/// to its placeholder in prepared mode.
struct Assignment {
    literal: String,
    bound: String,
}

struct Statement<'a> {
    table: &'a str,
    assignments: Vec<String>,
    conditions: Vec<String>,
    values: Vec<String>,
    cond_values: Vec<String>,
}

pub struct UpdateStatementBuilder {
    options: UpdateOptions,
    span: Span,
}

impl Default for UpdateStatementBuilder {
    fn default() -> Self {
        Self::new(UpdateOptions::default())
    }
}

impl UpdateStatementBuilder {
    pub fn new(options: UpdateOptions) -> Self {
        Self {
            options,
            span: Span::none(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// One statement (or prepared batch) per selected mapping, in trigger
    /// order then mapping order. Nothing is executed.
    pub fn build(
        &self,
        config: &UpdateDataConfig,
        data: &Value,
        response: &Value,
        state: &str,
        status_process: &str,
    ) -> Result<Vec<String>, UpdateError> {
        let _entered = self.span.enter();

        let selected = config.select(state, status_process);
        if selected.is_empty() {
            return Err(UpdateError::config("there is no statement to be processed"));
        }
        tracing::debug!(state, status_process, mappings = selected.len(), "building update statements");

        selected
            .into_iter()
            .map(|mapping| {
                let statement = self.statement(mapping, data, response)?;
                Ok(match self.options.output {
                    OutputMode::Literal => literal(&statement),
                    OutputMode::Prepared => prepared(&statement),
                })
            })
            .collect()
    }

    /// [`build`](Self::build) over JSON text. Unparseable documents are
    /// treated as empty in lenient mode.
    pub fn build_from_str(
        &self,
        config: &UpdateDataConfig,
        data: &str,
        response: &str,
        state: &str,
        status_process: &str,
    ) -> Result<Vec<String>, UpdateError> {
        let data = self.parse_document("data", data)?;
        let response = self.parse_document("response", response)?;
        self.build(config, &data, &response, state, status_process)
    }

    fn parse_document(&self, what: &str, raw: &str) -> Result<Value, UpdateError> {
        match serde_json::from_str(raw) {
            Ok(doc) => Ok(doc),
            Err(err) if self.options.resolution == ResolutionMode::Lenient => {
                tracing::warn!(parent: &self.span, document = what, error = %err, "document is not JSON, treating it as empty");
                Ok(Value::Null)
            }
            Err(err) => Err(UpdateError::ResolutionError {
                context: common::diag!("{} is not JSON: {}", what, err),
                source: Some(Box::new(err)),
            }),
        }
    }

    fn statement<'a>(
        &self,
        mapping: &'a UpdateDataMapping,
        data: &Value,
        response: &Value,
    ) -> Result<Statement<'a>, UpdateError> {
        let mut statement = Statement {
            table: &mapping.table,
            assignments: Vec::with_capacity(mapping.column_mappings.len()),
            conditions: Vec::with_capacity(mapping.conditions.len()),
            values: Vec::new(),
            cond_values: Vec::new(),
        };

        for column in &mapping.column_mappings {
            let assignment = self.assignment(column, response)?;
            match self.options.output {
                OutputMode::Literal => statement.assignments.push(assignment.literal),
                OutputMode::Prepared => {
                    statement.assignments.push(format!("{} = ?", column.key));
                    statement.values.push(format!("\"{}\"", assignment.bound));
                }
            }
        }

        for condition in &mapping.conditions {
            let value = path::get(data, &condition.value);
            match self.options.output {
                OutputMode::Literal => {
                    let rendered = match value.as_deref() {
                        Some(Value::String(s)) => format!("'{}'", escape_string(s)),
                        other => render(other),
                    };
                    statement.conditions.push(condition.key.replace('?', &rendered));
                }
                OutputMode::Prepared => {
                    statement.conditions.push(condition.key.clone());
                    statement.cond_values.push(match value.as_deref() {
                        Some(Value::String(s)) => format!("\"{}\"", escape_string(s)),
                        other => render(other),
                    });
                }
            }
        }

        Ok(statement)
    }

    fn assignment(&self, column: &ConfigKey, response: &Value) -> Result<Assignment, UpdateError> {
        let op = ColumnOp::parse(&column.operation);
        let quoted = column.is_string_typed();

        let assignment = match op {
            ColumnOp::Json | ColumnOp::GJson => {
                let value = self.lookup(column, response)?;
                let value = typed(value.as_ref(), &column.value_type);
                let rendered = match &value {
                    Value::String(s) => escape_string(s),
                    other => render(Some(other)),
                };
                let operand = if quoted {
                    format!("'{rendered}'")
                } else {
                    rendered.clone()
                };

                if op == ColumnOp::Json {
                    let base = column.key.split('.').next().unwrap_or_default();
                    Assignment {
                        literal: format!(
                            "{base} = JSON_SET({base}, '$.{}', {operand})",
                            column.value
                        ),
                        bound: format!("JSON_SET({base}, '$.{}', {rendered})", column.value),
                    }
                } else {
                    Assignment {
                        literal: format!("{} = {operand}", column.key),
                        bound: escape_string(&column.value),
                    }
                }
            }
            ColumnOp::Regex(index) => {
                let subject = self
                    .lookup(column, response)?
                    .map(|value| path::string_form(&value))
                    .unwrap_or_default();
                let literal = match self.capture(column, &subject, index)? {
                    Some(captured) => format!("{} = '{}'", column.key, escape_string(&captured)),
                    None => String::new(),
                };
                Assignment {
                    literal,
                    bound: escape_string(&column.value),
                }
            }
            ColumnOp::Static => {
                let literal = if quoted {
                    format!("{} = '{}'", column.key, escape_string(&column.value))
                } else {
                    format!("{} = {}", column.key, column.value)
                };
                Assignment {
                    literal,
                    bound: escape_string(&column.value),
                }
            }
        };
        Ok(assignment)
    }

    fn lookup(&self, column: &ConfigKey, response: &Value) -> Result<Option<Value>, UpdateError> {
        match path::get(response, &column.value) {
            Some(value) => Ok(Some(value.into_owned())),
            None if self.options.resolution == ResolutionMode::Strict => {
                Err(UpdateError::resolution(format!(
                    "column '{}': '{}' is not present in the response",
                    column.key, column.value
                )))
            }
            None => {
                tracing::warn!(parent: &self.span, column = %column.key, path = %column.value, "response path not found");
                Ok(None)
            }
        }
    }

    fn capture(&self, column: &ConfigKey, subject: &str, index: usize) -> Result<Option<String>, UpdateError> {
        let strict = self.options.resolution == ResolutionMode::Strict;
        let pattern = match Regex::new(&column.value_type) {
            Ok(pattern) => pattern,
            Err(err) if strict => return Err(err.into()),
            Err(err) => {
                tracing::warn!(parent: &self.span, column = %column.key, error = %err, "invalid pattern, column skipped");
                return Ok(None);
            }
        };

        let captured = pattern
            .captures(subject)
            .filter(|caps| index < caps.len())
            .map(|caps| caps.get(index).map(|m| m.as_str().to_string()).unwrap_or_default());

        match captured {
            Some(value) => Ok(Some(value)),
            None if strict => Err(UpdateError::resolution(format!(
                "column '{}': pattern '{}' has no group {} matching '{}'",
                column.key, column.value_type, index, subject
            ))),
            None => {
                tracing::warn!(parent: &self.span, column = %column.key, "pattern did not match, column skipped");
                Ok(None)
            }
        }
    }
}

/// Coerce a looked-up value to the declared column type. Absent values
/// become the type's zero value; untyped columns keep the raw value.
fn typed(value: Option<&Value>, value_type: &str) -> Value {
    let raw = value.unwrap_or(&Value::Null);
    match value_type.to_ascii_uppercase().as_str() {
        "NUMBER" | "INT64" => Value::from(path::as_int(raw)),
        "FLOAT" | "FLOAT64" => serde_json::Number::from_f64(path::as_float(raw))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "STRING" => Value::String(path::string_form(raw)),
        "BOOLEAN" => Value::Bool(path::as_bool(raw)),
        _ => raw.clone(),
    }
}

fn render(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "NULL".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if n.is_f64() => f.to_string(),
            _ => n.to_string(),
        },
        Some(other) => other.to_string(),
    }
}

fn literal(statement: &Statement<'_>) -> String {
    format!(
        "UPDATE {} SET {} WHERE {}",
        statement.table,
        statement.assignments.join(", "),
        statement.conditions.join(" AND ")
    )
}

fn prepared(statement: &Statement<'_>) -> String {
    let name: String = format!(
        "stmntupdate{}",
        statement
            .table
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
    );

    let mut batch = format!("PREPARE {name} FROM '{}';", literal(statement));
    let mut using = Vec::with_capacity(statement.values.len() + statement.cond_values.len());

    let bindings = statement
        .values
        .iter()
        .enumerate()
        .map(|(i, v)| (format!("Values{i}"), v))
        .chain(
            statement
                .cond_values
                .iter()
                .enumerate()
                .map(|(i, v)| (format!("Cond{i}"), v)),
        );
    for (var, value) in bindings {
        batch.push_str(&format!("SET @{var} = {value};"));
        using.push(format!("@{var}"));
    }

    batch.push_str(&format!("EXECUTE {name} USING {};", using.join(", ")));
    batch.push_str(&format!("DEALLOCATE PREPARE {name};"));
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn column(key: &str, operation: &str, value_type: &str, value: &str) -> ConfigKey {
        ConfigKey {
            key: key.into(),
            operation: operation.into(),
            value_type: value_type.into(),
            value: value.into(),
            ..ConfigKey::default()
        }
    }

    #[test]
    fn test_column_op_parsing() {
        assert_eq!(ColumnOp::parse("json"), ColumnOp::Json);
        assert_eq!(ColumnOp::parse("GJson"), ColumnOp::GJson);
        assert_eq!(ColumnOp::parse("regex"), ColumnOp::Regex(0));
        assert_eq!(ColumnOp::parse("Regex[2]"), ColumnOp::Regex(2));
        assert_eq!(ColumnOp::parse("regex[x]"), ColumnOp::Regex(0));
        assert_eq!(ColumnOp::parse("static"), ColumnOp::Static);
        assert_eq!(ColumnOp::parse("whatever"), ColumnOp::Static);
    }

    #[test]
    fn test_typed_extraction() {
        assert_eq!(typed(Some(&json!("200")), "number"), json!(200));
        assert_eq!(typed(Some(&json!("1.5")), "float64"), json!(1.5));
        assert_eq!(typed(Some(&json!(7)), "string"), json!("7"));
        assert_eq!(typed(Some(&json!("true")), "boolean"), json!(true));
        assert_eq!(typed(Some(&json!("200")), "int"), json!("200"));
        assert_eq!(typed(None, "int64"), json!(0));
        assert_eq!(typed(None, "function"), Value::Null);
    }

    #[test]
    fn test_render() {
        assert_eq!(render(None), "NULL");
        assert_eq!(render(Some(&json!(200))), "200");
        assert_eq!(render(Some(&json!(2.0))), "2");
        assert_eq!(render(Some(&json!(0.25))), "0.25");
        assert_eq!(render(Some(&json!(false))), "false");
    }

    #[test]
    fn test_gjson_typed_assignments() {
        let builder = UpdateStatementBuilder::default();
        let response = json!({"premi": 36000, "result": "Success"});

        let numeric = builder
            .assignment(&column("premium", "gjson", "number", "premi"), &response)
            .unwrap();
        assert_eq!(numeric.literal, "premium = 36000");

        let text = builder
            .assignment(&column("result", "gjson", "string", "result"), &response)
            .unwrap();
        assert_eq!(text.literal, "result = 'Success'");
        assert_eq!(text.bound, "result");
    }

    #[test]
    fn test_json_assignment_uses_base_column() {
        let builder = UpdateStatementBuilder::default();
        let response = json!([{"status": "200"}]);
        let assignment = builder
            .assignment(&column("raw_response.status", "json", "int", "0.status"), &response)
            .unwrap();
        assert_eq!(
            assignment.literal,
            "raw_response = JSON_SET(raw_response, '$.0.status', 200)"
        );
        assert_eq!(assignment.bound, "JSON_SET(raw_response, '$.0.status', 200)");
    }

    #[test]
    fn test_missing_path_lenient_and_strict() {
        let response = json!({});
        let lenient = UpdateStatementBuilder::default()
            .assignment(&column("note", "gjson", "", "nope"), &response)
            .unwrap();
        assert_eq!(lenient.literal, "note = NULL");

        let err = UpdateStatementBuilder::new(UpdateOptions::default().strict())
            .assignment(&column("note", "gjson", "", "nope"), &response)
            .err()
            .expect("strict mode rejects missing paths");
        assert!(matches!(err, UpdateError::ResolutionError { .. }));
    }

    #[test]
    fn test_regex_group_out_of_range() {
        let response = json!({"msg": "Nopolis : 122N ,"});
        let lenient = UpdateStatementBuilder::default()
            .assignment(&column("insurance_number", "regex[3]", ": (.*?) ,", "msg"), &response)
            .unwrap();
        assert_eq!(lenient.literal, "");

        let strict = UpdateStatementBuilder::new(UpdateOptions::default().strict())
            .assignment(&column("insurance_number", "regex[3]", ": (.*?) ,", "msg"), &response);
        assert!(matches!(strict, Err(UpdateError::ResolutionError { .. })));
    }

    #[test]
    fn test_condition_rendering() {
        let config: UpdateDataConfig = serde_json::from_value(json!({
            "trigger_status": {"S": "G"},
            "mappings": [{
                "name": "G", "table": "policy-items", "status": "ok",
                "conditions": [
                    {"key": "id = ?", "value": "id"},
                    {"key": "deleted_at IS ? OR deleted_at = ?", "value": "deleted_at"},
                    {"key": "name = ?", "value": "name"}
                ],
                "column_mappings": [{"key": "flag", "operation": "static", "value": "1"}]
            }]
        }))
        .unwrap();
        let data = json!({"id": 42, "name": "O'Brien"});

        let literal = UpdateStatementBuilder::default()
            .build(&config, &data, &json!({}), "s", "OK")
            .unwrap();
        assert_eq!(
            literal,
            vec!["UPDATE policy-items SET flag = 1 WHERE id = 42 AND deleted_at IS NULL OR deleted_at = NULL AND name = 'O\\'Brien'"]
        );

        let prepared = UpdateStatementBuilder::new(UpdateOptions::default().prepared())
            .build(&config, &data, &json!({}), "s", "OK")
            .unwrap();
        assert_eq!(
            prepared,
            vec![concat!(
                "PREPARE stmntupdatepolicyitems FROM 'UPDATE policy-items SET flag = ? WHERE id = ? AND deleted_at IS ? OR deleted_at = ? AND name = ?';",
                "SET @Values0 = \"1\";SET @Cond0 = 42;SET @Cond1 = NULL;SET @Cond2 = \"O\\'Brien\";",
                "EXECUTE stmntupdatepolicyitems USING @Values0, @Cond0, @Cond1, @Cond2;",
                "DEALLOCATE PREPARE stmntupdatepolicyitems;"
            )]
        );
    }

    #[test]
    fn test_no_selected_mapping() {
        let err = UpdateStatementBuilder::default()
            .build(&UpdateDataConfig::default(), &json!({}), &json!({}), "S", "ok")
            .unwrap_err();
        assert!(matches!(err, UpdateError::ConfigError { .. }));
        assert!(err.to_string().contains("there is no statement to be processed"));
    }

    #[test]
    fn test_build_from_str_lenient_on_bad_response() {
        let config: UpdateDataConfig = serde_json::from_value(json!({
            "trigger_status": {"S": "G"},
            "mappings": [{
                "name": "G", "table": "t", "status": "ok",
                "conditions": [{"key": "id = ?", "value": "id"}],
                "column_mappings": [{"key": "c", "operation": "gjson", "type": "string", "value": "x"}]
            }]
        }))
        .unwrap();

        let lenient = UpdateStatementBuilder::default()
            .build_from_str(&config, r#"{"id": "A"}"#, "<html>bad gateway</html>", "S", "ok")
            .unwrap();
        assert_eq!(lenient, vec!["UPDATE t SET c = '' WHERE id = 'A'"]);

        let strict = UpdateStatementBuilder::new(UpdateOptions::default().strict())
            .build_from_str(&config, r#"{"id": "A"}"#, "<html>bad gateway</html>", "S", "ok");
        assert!(matches!(strict, Err(UpdateError::ResolutionError { .. })));
    }
}
