//! Request specification engine
//!
//! A [`Specification`] is the declarative contract for one endpoint and
//! method. It translates loosely-typed client input into a renamed, coerced
//! record ready to become a database document, and shapes outgoing responses
//! so every declared field is present.
//!
//! Problems with client input are collected as warnings rather than
//! returned as errors, so one response can report all of them at once. The
//! only hard failure is a present value that cannot be coerced.

pub mod coerce;
pub mod sink;

use std::collections::{BTreeMap, BTreeSet};

use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::warn;

pub use coerce::{FieldType, InvalidValue};
pub use sink::{RecordingSink, SinkEvent, TracingWarningSink, WarningSink};

/// A human-readable problem with a request, returned to the client
pub type Warning = String;

/// Untyped field map, used for both raw input and interpreted records
pub type Record = Map<String, Value>;

/// Name of the implicit response field carrying warnings
pub const WARNINGS_FIELD: &str = "warnings";

/// A present field value that failed coercion
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Field '{field}' is invalid: {source}")]
pub struct CoercionError {
    pub field: String,
    #[source]
    pub source: InvalidValue,
}

impl CoercionError {
    /// The error phrased as a client-facing warning
    pub fn to_warning(&self) -> Warning {
        format!("{}.", self)
    }
}

/// Contract for one endpoint and method
#[derive(Debug, Clone)]
pub struct Specification {
    name: &'static str,
    endpoint: &'static str,
    description: &'static str,
    method: Method,
    required_fields: BTreeMap<&'static str, FieldType>,
    optional_fields: BTreeMap<&'static str, FieldType>,
    database_map: BTreeMap<&'static str, &'static str>,
    response_fields: BTreeMap<&'static str, FieldType>,
    annotations: BTreeMap<&'static str, String>,
}

impl Specification {
    /// Start a contract with no fields
    pub fn new(name: &'static str, endpoint: &'static str, method: Method) -> Self {
        Self {
            name,
            endpoint,
            description: "No description available.",
            method,
            required_fields: BTreeMap::new(),
            optional_fields: BTreeMap::new(),
            database_map: BTreeMap::new(),
            response_fields: BTreeMap::new(),
            annotations: BTreeMap::new(),
        }
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn required(mut self, field: &'static str, kind: FieldType) -> Self {
        self.required_fields.insert(field, kind);
        self
    }

    pub fn optional(mut self, field: &'static str, kind: FieldType) -> Self {
        self.optional_fields.insert(field, kind);
        self
    }

    /// Store `field` under `column` when interpreting requests
    pub fn rename(mut self, field: &'static str, column: &'static str) -> Self {
        self.database_map.insert(field, column);
        self
    }

    pub fn response(mut self, field: &'static str, kind: FieldType) -> Self {
        self.response_fields.insert(field, kind);
        self
    }

    pub fn annotate(mut self, field: &'static str, note: impl Into<String>) -> Self {
        self.annotations.insert(field, note.into());
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn endpoint(&self) -> &'static str {
        self.endpoint
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.required_fields.keys().copied()
    }

    pub fn optional_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.optional_fields.keys().copied()
    }

    pub fn response_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.response_fields.keys().copied()
    }

    /// Internal name a request field is stored under
    pub fn column(&self, field: &str) -> String {
        self.database_map
            .get(field)
            .map(|column| column.to_string())
            .unwrap_or_else(|| field.to_string())
    }

    /// Structural problems with the contract itself.
    ///
    /// A field may be required or optional but not both, and every rename
    /// must refer to a declared input field.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for field in self.required_fields.keys() {
            if self.optional_fields.contains_key(field) {
                problems.push(format!(
                    "{} {}: '{}' is both required and optional",
                    self.method, self.endpoint, field
                ));
            }
        }
        for field in self.database_map.keys() {
            if !self.required_fields.contains_key(field) && !self.optional_fields.contains_key(field) {
                problems.push(format!(
                    "{} {}: rename of undeclared field '{}'",
                    self.method, self.endpoint, field
                ));
            }
        }
        problems
    }

    /// Interpret client input according to the contract.
    ///
    /// Declared fields are coerced and stored under their internal name.
    /// Missing required fields produce a single combined warning. In strict
    /// mode each undeclared field produces a warning and is dropped; outside
    /// strict mode undeclared fields are dropped silently.
    pub fn interpret(
        &self,
        data: &Record,
        strict: bool,
    ) -> Result<(Record, Vec<Warning>), CoercionError> {
        let mut interpreted = Record::new();
        let mut warnings = Vec::new();
        let mut missing: BTreeSet<&'static str> = self.required_fields.keys().copied().collect();

        for (field, value) in data {
            let kind = if let Some(kind) = self.required_fields.get(field.as_str()) {
                missing.remove(field.as_str());
                kind
            } else if let Some(kind) = self.optional_fields.get(field.as_str()) {
                kind
            } else {
                if strict {
                    warnings.push(format!("Field '{}' is not in the specification.", field));
                }
                continue;
            };

            let coerced = (kind.coerce)(Some(value)).map_err(|source| CoercionError {
                field: field.clone(),
                source,
            })?;
            interpreted.insert(self.column(field), coerced);
        }

        if !missing.is_empty() {
            let names: Vec<&str> = missing.into_iter().collect();
            warnings.push(format!("Missing required fields: {}.", names.join(", ")));
        }

        Ok((interpreted, warnings))
    }

    /// Shape a response body according to the contract.
    ///
    /// Undeclared keys in `values` are reported as contract drift but still
    /// sent. Declared keys missing from `values` receive their default.
    /// `warnings` are appended to any already present in `values`. Without
    /// an explicit status the response is 400 when any warning is present,
    /// otherwise 200.
    pub fn shape_response(
        &self,
        values: Record,
        warnings: Vec<Warning>,
        status: Option<StatusCode>,
        sink: &dyn WarningSink,
    ) -> ShapedResponse {
        let mut body = values;
        let mut accumulated = match body.remove(WARNINGS_FIELD) {
            Some(Value::Array(existing)) => existing
                .into_iter()
                .map(|w| match w {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![other.to_string()],
        };

        for key in body.keys() {
            if !self.response_fields.contains_key(key.as_str()) {
                let drift = format!("Response field '{}' not in specification.", key);
                warn!(contract = self.name, endpoint = self.endpoint, "{}", drift);
                sink.record(self, &[drift]);
            }
        }

        for (field, kind) in &self.response_fields {
            if !body.contains_key(*field) {
                body.insert(field.to_string(), (kind.default)());
            }
        }

        accumulated.extend(warnings);
        let status = status.unwrap_or(if accumulated.is_empty() {
            StatusCode::OK
        } else {
            StatusCode::BAD_REQUEST
        });

        if !accumulated.is_empty() {
            sink.record(self, &accumulated);
        }

        body.insert(
            WARNINGS_FIELD.to_string(),
            Value::Array(accumulated.into_iter().map(Value::String).collect()),
        );

        ShapedResponse { status, body }
    }

    /// JSON description of the contract, for the documentation endpoint
    pub fn to_json(&self) -> Value {
        let describe_fields = |fields: &BTreeMap<&'static str, FieldType>| -> Vec<Value> {
            fields
                .iter()
                .map(|(field, kind)| {
                    let mut entry = json!({ "name": field, "type": kind.name });
                    if let Some(column) = self.database_map.get(field) {
                        entry["stored_as"] = json!(column);
                    }
                    if let Some(note) = self.annotations.get(field) {
                        entry["note"] = json!(note);
                    }
                    entry
                })
                .collect()
        };

        json!({
            "name": self.name,
            "endpoint": self.endpoint,
            "method": self.method.as_str(),
            "description": self.description,
            "required_fields": describe_fields(&self.required_fields),
            "optional_fields": describe_fields(&self.optional_fields),
            "response_fields": describe_fields(&self.response_fields),
        })
    }
}

/// A fully shaped response: status plus JSON object body
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedResponse {
    pub status: StatusCode,
    pub body: Record,
}

impl ShapedResponse {
    /// Warnings carried by the body
    pub fn warnings(&self) -> Vec<&str> {
        self.body
            .get(WARNINGS_FIELD)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

impl IntoResponse for ShapedResponse {
    fn into_response(self) -> Response {
        (self.status, Json(Value::Object(self.body))).into_response()
    }
}
