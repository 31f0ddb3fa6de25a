//! Wire types for the REST SQL API.
//!
//! Result rows are kept as raw JSON: the console never interprets a result
//! beyond the few fields it needs (errors, the first scalar value).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Message carried by the synthesized result of a query stopped with `KILL QUERY`.
pub const QUERY_CANCELED: &str = "Query canceled";

/// Server-issued identifier of a SQL connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body of `POST /sql/{id}/queries`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub sql: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rows: Option<u32>,
}

impl QueryRequest {
    pub fn new(sql: impl Into<String>, max_rows: Option<u32>) -> Self {
        Self {
            sql: sql.into(),
            max_rows,
        }
    }
}

/// Envelope of every JSON:API style response: `{"data": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// A query result document, i.e. the `data` member of a query response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub attributes: ResultAttributes,
}

/// Attributes of a result document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultAttributes {
    #[serde(default)]
    pub sql: String,
    /// One entry per statement: a result set, an OK packet or an error.
    #[serde(default)]
    pub results: Vec<Value>,
}

impl ResultSet {
    /// Builds a document from raw per-statement results.
    pub fn new(sql: impl Into<String>, results: Vec<Value>) -> Self {
        Self {
            id: None,
            kind: None,
            attributes: ResultAttributes {
                sql: sql.into(),
                results,
            },
        }
    }

    /// The result reported for a query stopped by `KILL QUERY`.
    pub fn canceled(sql: impl Into<String>) -> Self {
        let mut message = Map::new();
        message.insert("message".to_string(), Value::from(QUERY_CANCELED));
        Self::new(sql, vec![Value::Object(message)])
    }

    pub fn results(&self) -> &[Value] {
        &self.attributes.results
    }

    /// Returns the first result if it is an error row, i.e. carries `errno`.
    pub fn first_error(&self) -> Option<&Map<String, Value>> {
        self.results()
            .first()
            .and_then(Value::as_object)
            .filter(|row| row.contains_key("errno"))
    }

    /// Returns `data[0][0]` of the first result set, if any.
    pub fn first_value(&self) -> Option<&Value> {
        self.results()
            .first()?
            .get("data")?
            .as_array()?
            .first()?
            .as_array()?
            .first()
    }
}

/// Attributes returned when a connection is opened or cloned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionAttributes {
    #[serde(default)]
    pub thread_id: u64,
    #[serde(default)]
    pub seconds_idle: Option<f64>,
}

/// The `data` member of `POST /sql` and `POST /sql/{id}/clone` responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    #[serde(default)]
    pub attributes: ConnectionAttributes,
}

/// REST API error document: `{"errors": [{"detail": "..."}]}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorDocument {
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub detail: String,
}

impl ErrorDocument {
    /// Joins every error detail, falling back to the raw body.
    pub fn message_or(body: &str) -> String {
        match serde_json::from_str::<ErrorDocument>(body) {
            Ok(doc) if !doc.errors.is_empty() => doc
                .errors
                .into_iter()
                .map(|e| e.detail)
                .collect::<Vec<_>>()
                .join("; "),
            _ => body.to_string(),
        }
    }
}
