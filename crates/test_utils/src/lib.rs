use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;

pub const POLICY_NUMBER: &str = "KMNL-CRDT-20220519-FN8GA";
pub const TRANSACTION_NUMBER: &str = "TROLOLO-00001-02";

/// Directory holding the shared fixture documents.
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

pub fn fixture_path(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

/// Raw text of a fixture. Panics when the file is missing.
pub fn read_fixture(name: &str) -> String {
    let path = fixture_path(name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("fixture {}: {e}", path.display()))
}

fn json_fixture(name: &str) -> Value {
    serde_json::from_str(&read_fixture(name)).unwrap_or_else(|e| panic!("fixture {name}: {e}"))
}

/// Policy row as stored before the partner call.
pub static POLICY_SNAPSHOT: Lazy<Value> = Lazy::new(|| json_fixture("policy_snapshot.json"));

/// Partner reply to a policy issuance, including a hostile string field.
pub static PARTNER_RESPONSE: Lazy<Value> = Lazy::new(|| json_fixture("partner_response.json"));

/// Partner reply to a repeated issuance carrying the number in free text.
pub static FEEDBACK_RESPONSE: Lazy<Value> = Lazy::new(|| json_fixture("feedback_response.json"));

/// Callback configuration for a REST token round-trip against `base_url`.
pub fn rest_auth_callback_config(base_url: &str) -> Value {
    json!({
        "method": "POST",
        "base_url": base_url,
        "endpoint": "policies",
        "generated_keys": [{
            "name": "token",
            "type": "auth",
            "auth_type": "REST",
            "auth_config": {
                "rest_config": {
                    "method": "POST",
                    "base_url": base_url,
                    "endpoint": "oauth/token",
                    "headers": {"Content-Type": "application/json"},
                    "static_body_mapping": {
                        "Payloads": {"client_id": "qoala", "client_secret": "hunter2"}
                    },
                    "success_response_body": {"ErrorCode": [0]},
                    "response_mapping": {
                        "bearer_token": "data.access_token",
                        "expires_in": "data.expires_in"
                    }
                }
            }
        }],
        "headers": {
            "Authorization": "generated_keys.token.response_mapping.bearer_token",
            "Content-Type": "application/json"
        }
    })
}
