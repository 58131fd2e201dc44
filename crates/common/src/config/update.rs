use crate::config::callback::ConfigKey;
use crate::utils::equal_fold;
use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Ordered `(state, mapping group)` pairs gating which update mappings run.
///
/// Accepts a JSON object (pairs keep document order), an array of
/// `[state, group]` pairs, or an array of `{"state", "mapping"}` objects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerStatus(Vec<(String, String)>);

impl TriggerStatus {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Mapping group names whose trigger state matches `state`, in order.
    pub fn groups_for<'a>(&'a self, state: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(trigger, _)| equal_fold(trigger, state))
            .map(|(_, group)| group.as_str())
    }
}

impl<S, G> FromIterator<(S, G)> for TriggerStatus
where
    S: Into<String>,
    G: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (S, G)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(state, group)| (state.into(), group.into()))
                .collect(),
        )
    }
}

impl Serialize for TriggerStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (state, group) in &self.0 {
            map.serialize_entry(state, group)?;
        }
        map.end()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TriggerPair {
    Tuple(String, String),
    Named { state: String, mapping: String },
}

impl<'de> Deserialize<'de> for TriggerStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TriggerStatusVisitor;

        impl<'de> Visitor<'de> for TriggerStatusVisitor {
            type Value = TriggerStatus;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an object or a list of (state, mapping) pairs")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((state, group)) = access.next_entry::<String, String>()? {
                    pairs.push((state, group));
                }
                Ok(TriggerStatus(pairs))
            }

            fn visit_seq<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(pair) = access.next_element::<TriggerPair>()? {
                    pairs.push(match pair {
                        TriggerPair::Tuple(state, group) => (state, group),
                        TriggerPair::Named { state, mapping } => (state, mapping),
                    });
                }
                Ok(TriggerStatus(pairs))
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(TriggerStatus::default())
            }

            fn visit_none<E>(self) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(TriggerStatus::default())
            }
        }

        deserializer.deserialize_any(TriggerStatusVisitor)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct UpdateDataMapping {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub conditions: Vec<ConfigKey>,
    #[serde(default)]
    pub column_mappings: Vec<ConfigKey>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct UpdateDataConfig {
    #[serde(default)]
    pub trigger_status: TriggerStatus,
    #[serde(default)]
    pub mappings: Vec<UpdateDataMapping>,
}

impl UpdateDataConfig {
    /// Mappings selected for `(state, status_process)`: every trigger pair
    /// whose state matches, then every mapping of that group with a matching
    /// status. Trigger order first, mapping order second.
    pub fn select<'a>(&'a self, state: &'a str, status_process: &'a str) -> Vec<&'a UpdateDataMapping> {
        self.trigger_status
            .groups_for(state)
            .flat_map(|group| {
                self.mappings.iter().filter(move |mapping| {
                    equal_fold(&mapping.name, group) && equal_fold(&mapping.status, status_process)
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_keeps_document_order() {
        let raw = r#"{"trigger_status": {"Z_STATE": "G1", "A_STATE": "G2", "M_STATE": "G3"}}"#;
        let config: UpdateDataConfig = serde_json::from_str(raw).expect("config");
        let states: Vec<&str> = config
            .trigger_status
            .pairs()
            .iter()
            .map(|(state, _)| state.as_str())
            .collect();
        assert_eq!(states, vec!["Z_STATE", "A_STATE", "M_STATE"]);
    }

    #[test]
    fn test_sequence_forms() {
        let tuples: TriggerStatus =
            serde_json::from_value(json!([["POLICY_ACTIVE", "G1"], ["POLICY_ACTIVE", "G2"]]))
                .expect("tuples");
        assert_eq!(
            tuples.groups_for("policy_active").collect::<Vec<_>>(),
            vec!["G1", "G2"]
        );

        let named: TriggerStatus =
            serde_json::from_value(json!([{"state": "CLAIM_INITIATED", "mapping": "G9"}]))
                .expect("named");
        assert_eq!(named.pairs(), &[("CLAIM_INITIATED".to_string(), "G9".to_string())]);
    }

    #[test]
    fn test_null_is_empty() {
        let config: UpdateDataConfig =
            serde_json::from_value(json!({"trigger_status": null})).expect("config");
        assert!(config.trigger_status.is_empty());
    }

    #[test]
    fn test_serialize_round_trips_order() {
        let status: TriggerStatus = [("B", "1"), ("A", "2")].into_iter().collect();
        assert_eq!(
            serde_json::to_string(&status).unwrap(),
            r#"{"B":"1","A":"2"}"#
        );
    }

    #[test]
    fn test_select_matches_state_name_and_status() {
        let config: UpdateDataConfig = serde_json::from_value(json!({
            "trigger_status": {"POLICY_INITIATED": "UUID1", "CLAIM_INITIATED": "UUID2"},
            "mappings": [
                {"name": "UUID1", "table": "policies", "status": "success"},
                {"name": "UUID1", "table": "callback_logs", "status": "success"},
                {"name": "UUID1", "table": "policies", "status": "failed"},
                {"name": "UUID2", "table": "claims", "status": "success"}
            ]
        }))
        .expect("config");

        let tables: Vec<&str> = config
            .select("POLICY_INITIATED", "SUCCESS")
            .into_iter()
            .map(|m| m.table.as_str())
            .collect();
        assert_eq!(tables, vec!["policies", "callback_logs"]);
        assert!(config.select("UNKNOWN", "success").is_empty());
    }
}
