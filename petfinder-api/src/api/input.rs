//! Turning raw requests into interpreted records, or into rejections

use std::collections::HashMap;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use petfinder_common::spec::{Record, ShapedResponse, Specification, Warning};
use serde_json::Value;

use crate::AppState;

/// Query string parameters as a raw record of strings
pub fn query_record(params: HashMap<String, String>) -> Record {
    params
        .into_iter()
        .map(|(field, value)| (field, Value::String(value)))
        .collect()
}

/// JSON body as a raw record, or the warning explaining why it is not one
pub fn body_record(body: Result<Json<Value>, JsonRejection>) -> Result<Record, Warning> {
    match body {
        Ok(Json(Value::Object(record))) => Ok(record),
        Ok(Json(_)) => Err("Request body must be a JSON object.".to_string()),
        Err(rejection) => Err(format!("Request body could not be read: {}.", rejection.body_text())),
    }
}

/// Interpret `raw` against `spec`.
///
/// Any warning, or a value that fails coercion, rejects the request with a
/// shaped 400 response.
pub fn interpret(
    state: &AppState,
    spec: &Specification,
    raw: Result<Record, Warning>,
) -> Result<Record, ShapedResponse> {
    let raw = raw.map_err(|warning| reject(state, spec, vec![warning], None))?;

    match spec.interpret(&raw, state.strict) {
        Ok((record, warnings)) if warnings.is_empty() => Ok(record),
        Ok((_, warnings)) => Err(reject(state, spec, warnings, None)),
        Err(coercion) => Err(reject(state, spec, vec![coercion.to_warning()], None)),
    }
}

/// Successful response carrying `values`
pub fn respond(state: &AppState, spec: &Specification, values: Record) -> ShapedResponse {
    spec.shape_response(values, Vec::new(), None, state.warning_sink.as_ref())
}

/// Response carrying only warnings
pub fn reject(
    state: &AppState,
    spec: &Specification,
    warnings: Vec<Warning>,
    status: Option<StatusCode>,
) -> ShapedResponse {
    spec.shape_response(Record::new(), warnings, status, state.warning_sink.as_ref())
}

/// 404 for a pet id with no alert
pub fn alert_not_found(state: &AppState, spec: &Specification, pet_id: &str) -> ShapedResponse {
    reject(
        state,
        spec,
        vec![format!("No alert found for pet id '{}'.", pet_id)],
        Some(StatusCode::NOT_FOUND),
    )
}

/// String field of an interpreted record ("" when absent)
pub fn text<'a>(record: &'a Record, column: &str) -> &'a str {
    record.get(column).and_then(Value::as_str).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_record_keeps_strings() {
        let mut params = HashMap::new();
        params.insert("location_lat".to_string(), "51.5".to_string());
        let record = query_record(params);
        assert_eq!(record["location_lat"], json!("51.5"));
    }

    #[test]
    fn test_body_must_be_object() {
        assert!(body_record(Ok(Json(json!({"id": "x"})))).is_ok());
        let warning = body_record(Ok(Json(json!([1, 2])))).unwrap_err();
        assert!(warning.contains("JSON object"));
    }

    #[test]
    fn test_text_defaults_to_empty() {
        let record: Record = serde_json::from_value(json!({"id": "x", "n": 1})).unwrap();
        assert_eq!(text(&record, "id"), "x");
        assert_eq!(text(&record, "n"), "");
        assert_eq!(text(&record, "missing"), "");
    }
}
