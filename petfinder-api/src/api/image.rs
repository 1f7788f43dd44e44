//! Image upload endpoint

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use petfinder_common::endpoints::UPLOAD_IMAGE;
use petfinder_common::spec::{Record, ShapedResponse, Warning};
use petfinder_common::Error;
use serde_json::Value;

use super::input;
use crate::error::ApiResult;
use crate::AppState;

/// POST /image
///
/// Stores a base64 JPEG and answers with its reference as `id`.
pub async fn upload_image(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<ShapedResponse> {
    let spec = &*UPLOAD_IMAGE;
    let record = match input::interpret(&state, spec, input::body_record(body)) {
        Ok(record) => record,
        Err(rejected) => return Ok(rejected),
    };

    match state.images.upload_base64(input::text(&record, "base64")).await {
        Ok(image) => {
            let mut values = Record::new();
            values.insert("id".to_string(), Value::String(image));
            Ok(input::respond(&state, spec, values))
        }
        Err(Error::InvalidInput(reason)) => Ok(input::reject(&state, spec, vec![format!("{}.", reason)], None)),
        Err(e) => Err(e.into()),
    }
}

/// Public URL of an uploaded image, or the warning explaining why the
/// reference cannot be used
pub(super) async fn resolve_image(state: &AppState, image: &str) -> ApiResult<Result<String, Warning>> {
    match state.images.publish(image).await {
        Ok(url) => Ok(Ok(url)),
        Err(Error::InvalidInput(reason)) | Err(Error::NotFound(reason)) => Ok(Err(format!("{}.", reason))),
        Err(e) => Err(e.into()),
    }
}
