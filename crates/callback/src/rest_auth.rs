use crate::error::CallbackError;
use crate::resolver::KeyMaps;
use common::config::{CallbackConfig, GeneratedKey};
use serde_json::{Map, Value};
use shared_clients::HttpClient;
use std::collections::BTreeMap;
use transform::path;
use transform::Reshaper;

const BEARER_TOKEN: &str = "BEARER_TOKEN";

/// Token round-trip for `REST` auth keys.
///
/// Calls the partner's auth endpoint described by the key's `rest_config`,
/// checks the response against `success_response_body` and publishes each
/// `response_mapping` entry as
/// `generated_keys.<key>.response_mapping.<name>`.
pub struct RestAuthClient<'a> {
    http: &'a dyn HttpClient,
    reshaper: &'a dyn Reshaper,
}

impl<'a> RestAuthClient<'a> {
    pub fn new(http: &'a dyn HttpClient, reshaper: &'a dyn Reshaper) -> Self {
        Self { http, reshaper }
    }

    pub async fn authenticate(
        &self,
        key: &GeneratedKey,
        rest: &CallbackConfig,
        input: &str,
        maps: &mut KeyMaps,
    ) -> Result<(), CallbackError> {
        let Some(response_mapping) = rest.response_mapping.as_ref() else {
            return Err(CallbackError::config(format!(
                "{}: rest_config has no response_mapping",
                key.placeholder()
            )));
        };

        let body = self.request_body(key, rest, input)?;
        let url = rest.url();
        let resp = self
            .http
            .call(&rest.method, &url, &rest.headers, &body)
            .await?;
        tracing::info!(%url, status = resp.status, "auth endpoint responded");
        if !resp.is_success() {
            tracing::warn!(%url, status = resp.status, "auth endpoint returned a non-success status");
        }

        let response: Value = resp.json().map_err(|err| CallbackError::NetworkError {
            context: common::diag!("auth response from {} is not JSON: {}", url, err),
            source: Some(Box::new(err)),
        })?;

        if let Some(expected) = rest.success_response_body.as_ref() {
            check_success(&response, expected)?;
        }

        for (name, response_path) in response_mapping {
            let placeholder = format!("{}.response_mapping.{}", key.placeholder(), name);
            let value = path::get_string(&response, response_path);
            if name.eq_ignore_ascii_case(BEARER_TOKEN) {
                if value.is_empty() {
                    return Err(CallbackError::auth_validation(format!(
                        "auth response from {url} has no token at '{response_path}'"
                    )));
                }
                maps.insert_generated(placeholder, format!("Bearer {value}"));
            } else {
                maps.insert_generated(placeholder, value);
            }
        }
        Ok(())
    }

    fn request_body(
        &self,
        key: &GeneratedKey,
        rest: &CallbackConfig,
        input: &str,
    ) -> Result<String, CallbackError> {
        match (&rest.body_mapping, &rest.static_body_mapping) {
            (Some(_), Some(_)) => Err(CallbackError::config(format!(
                "{}: rest_config sets both body_mapping and static_body_mapping",
                key.placeholder()
            ))),
            (None, None) => Err(CallbackError::config(format!(
                "{}: rest_config sets neither body_mapping nor static_body_mapping",
                key.placeholder()
            ))),
            (None, Some(fixed)) => static_body(fixed),
            (Some(_), None) => {
                let spec = rest.body_mapping_spec()?.unwrap_or_default();
                Ok(self.reshaper.reshape(&spec, input)?)
            }
        }
    }
}

fn static_body(fixed: &Map<String, Value>) -> Result<String, CallbackError> {
    let body = match fixed.get("Payloads") {
        Some(payloads) => serde_json::to_string(payloads)?,
        None => serde_json::to_string(fixed)?,
    };
    Ok(body)
}

/// Every configured path must be present and non-null; when non-null
/// candidates are listed the value must equal at least one of them.
pub fn check_success(
    response: &Value,
    expected: &BTreeMap<String, Vec<Value>>,
) -> Result<(), CallbackError> {
    for (response_path, candidates) in expected {
        let Some(actual) = path::get(response, response_path).filter(|v| !v.is_null()) else {
            return Err(CallbackError::auth_validation(format!(
                "auth response has no value at '{response_path}'"
            )));
        };

        let mut non_null = candidates.iter().filter(|c| !c.is_null()).peekable();
        if non_null.peek().is_none() {
            continue;
        }
        if !non_null.any(|candidate| candidate_matches(&actual, candidate)) {
            return Err(CallbackError::auth_validation(format!(
                "auth response value {} at '{response_path}' is not one of {}",
                actual,
                Value::Array(candidates.clone())
            )));
        }
    }
    Ok(())
}

fn candidate_matches(actual: &Value, candidate: &Value) -> bool {
    match candidate {
        Value::Number(n) => match n.as_i64().or_else(|| n.as_u64().map(|u| u as i64)) {
            Some(int) => path::as_int(actual) == int,
            None => {
                let float = n.as_f64().unwrap_or_default();
                if float.fract() == 0.0 {
                    path::as_int(actual) == float as i64
                } else {
                    path::as_float(actual) == float
                }
            }
        },
        Value::String(s) => path::string_form(actual) == *s,
        Value::Bool(b) => actual.as_bool() == Some(*b) || path::string_form(actual) == b.to_string(),
        other => actual == other,
    }
}
