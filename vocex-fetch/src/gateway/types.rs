//! Gateway request and response envelopes.

use serde::{de::Error, Deserialize, Deserializer, Serialize};

/// Outer request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMessage {
    /// Request id, echoed back by the gateway.
    pub id: String,
    /// The request body.
    pub request: MetaRequest,
    /// Request signature. The explorer only calls public methods and leaves it empty.
    #[serde(default)]
    pub signature: String,
}

/// Gateway request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaRequest {
    /// Method name.
    pub method: String,
    /// Entity to scope the request to.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entity_id: String,
    /// Pagination cursor: the last identifier already known.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub from_id: String,
    /// Page size.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub list_size: u32,
    /// Process to scope the request to.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub process_id: String,
    /// Unix time the request was sent at.
    #[serde(default)]
    pub timestamp: i64,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

impl MetaRequest {
    /// Creates a request for `method` with no parameters.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            ..Default::default()
        }
    }
}

/// Outer response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMessage {
    /// Id of the request this answers.
    pub id: String,
    /// The response body.
    pub response: MetaResponse,
    /// Gateway signature over the response body.
    #[serde(default)]
    pub signature: String,
}

/// Gateway response body. Fields not returned by a method are left at their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetaResponse {
    /// True if the request succeeded.
    pub ok: bool,
    /// Human readable status or error message.
    pub message: String,
    /// Id of the request this answers.
    pub request: String,
    /// Item count for counting methods.
    pub size: Option<u64>,
    /// Entity identifiers for `getEntityList`.
    pub entity_ids: Vec<String>,
    /// Process identifiers for `getProcessList`.
    pub process_list: Vec<String>,
    /// Per-question tallies for `getResults`.
    #[serde(deserialize_with = "string_matrix")]
    pub results: Vec<Vec<String>>,
    /// Process state for `getResults`.
    pub state: String,
    /// Process type for `getResults`.
    #[serde(rename = "type")]
    pub process_type: String,
    /// True once the results of a process are final.
    #[serde(rename = "final")]
    pub is_final: Option<bool>,
    /// Unix time the response was produced at.
    pub timestamp: i64,
}

/// Results of a voting process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessResults {
    /// Per-question tallies, empty while no results are available.
    pub results: Vec<Vec<String>>,
    /// Process state.
    pub state: String,
    /// Process type.
    pub process_type: String,
    /// True once the results are final.
    pub is_final: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Tally {
    Str(String),
    Num(serde_json::Number),
}

/// Tallies arrive as numbers from older gateways and as decimal strings from newer ones.
fn string_matrix<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<String>>, D::Error> {
    let raw = Option::<Vec<Vec<Tally>>>::deserialize(d)?.unwrap_or_default();
    raw.into_iter()
        .map(|row| {
            row.into_iter()
                .map(|tally| match tally {
                    Tally::Str(s) if s.chars().all(|c| c.is_ascii_digit()) => Ok(s),
                    Tally::Str(s) => Err(D::Error::custom(format!("invalid tally {s:?}"))),
                    Tally::Num(n) => Ok(n.to_string()),
                })
                .collect()
        })
        .collect()
}
