//! Self-describing contract documentation

use axum::Json;
use petfinder_common::endpoints;
use serde_json::{json, Value};

/// GET /api/docs
///
/// Every endpoint contract: fields, their types, renames and notes.
pub async fn get_docs() -> Json<Value> {
    let specifications: Vec<Value> = endpoints::all().into_iter().map(|spec| spec.to_json()).collect();
    Json(json!({ "specifications": specifications }))
}
