//! Pet alert endpoints
//!
//! Alerts are keyed by pet id. Creating an alert for an id that already has
//! one updates it in place, keeping the sightings gathered so far.

use std::collections::HashMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use petfinder_common::endpoints::{
    ADD_PET_IMAGE, CREATE_ALERT, DEFAULT_NEARBY_RADIUS_KM, GET_ALERT, NEARBY_ALERTS, PET_FOUND,
    REMOVE_SIGHTING,
};
use petfinder_common::geo::{within_radius, GeoPoint};
use petfinder_common::spec::{Record, ShapedResponse};
use petfinder_common::AlertDocument;
use serde_json::Value;
use tracing::info;

use super::{image, input};
use crate::error::ApiResult;
use crate::AppState;

/// POST /pet/found
///
/// Closes the pet's alert and forgets its reference photos.
pub async fn pet_found(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<ShapedResponse> {
    let spec = &*PET_FOUND;
    let record = match input::interpret(&state, spec, input::body_record(body)) {
        Ok(record) => record,
        Err(rejected) => return Ok(rejected),
    };
    let pet_id = input::text(&record, &spec.column("id"));

    if !state.store.delete_alert(pet_id).await? {
        return Ok(input::alert_not_found(&state, spec, pet_id));
    }
    state.store.delete_pet_images(pet_id).await?;

    info!(pet_id, "Pet reported found");
    Ok(input::respond(&state, spec, Record::new()))
}

/// POST /pet/alert
pub async fn create_alert(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<ShapedResponse> {
    let spec = &*CREATE_ALERT;
    let record = match input::interpret(&state, spec, input::body_record(body)) {
        Ok(record) => record,
        Err(rejected) => return Ok(rejected),
    };
    let pet_id = input::text(&record, "pet_id").to_string();
    if pet_id.is_empty() {
        let warning = "Field 'id' must not be empty.".to_string();
        return Ok(input::reject(&state, spec, vec![warning], None));
    }

    let timestamp = Utc::now().to_rfc3339();
    let alert = state
        .store
        .upsert_alert(&pet_id, move |existing| {
            let mut alert = match existing {
                Some(mut alert) => {
                    alert.update_from_record(record)?;
                    alert
                }
                None => AlertDocument::from_record(record)?,
            };
            alert.timestamp = Some(timestamp);
            Ok(alert)
        })
        .await?;
    info!(pet_id = %pet_id, sightings = alert.sightings.len(), "Saved alert");

    Ok(input::respond(&state, spec, Record::new()))
}

/// GET /pet/alert
pub async fn get_alert(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<ShapedResponse> {
    let spec = &*GET_ALERT;
    let record = match input::interpret(&state, spec, Ok(input::query_record(params))) {
        Ok(record) => record,
        Err(rejected) => return Ok(rejected),
    };
    let pet_id = input::text(&record, "pet_id");

    let Some(alert) = state.store.get_alert(pet_id).await? else {
        return Ok(input::alert_not_found(&state, spec, pet_id));
    };

    let mut values = alert.to_public_record()?;
    values.remove("pet_id");
    Ok(input::respond(&state, spec, values))
}

/// GET /pet/nearby
///
/// Alerts within `radius` km (great-circle) of the given point. A missing or
/// non-positive radius means the default.
pub async fn nearby_alerts(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<ShapedResponse> {
    let spec = &*NEARBY_ALERTS;
    let record = match input::interpret(&state, spec, Ok(input::query_record(params))) {
        Ok(record) => record,
        Err(rejected) => return Ok(rejected),
    };

    let number = |column: &str| record.get(column).and_then(Value::as_f64);
    let center = GeoPoint::new(
        number("location_lat").unwrap_or_default(),
        number("location_long").unwrap_or_default(),
    );
    let radius = number("radius")
        .filter(|radius| *radius > 0.0)
        .unwrap_or(DEFAULT_NEARBY_RADIUS_KM);

    let alerts = state.store.list_alerts().await?;
    let nearby = within_radius(center, &alerts, radius, AlertDocument::location)
        .into_iter()
        .map(|alert| alert.to_public_record().map(Value::Object))
        .collect::<petfinder_common::Result<Vec<Value>>>()?;

    let mut values = Record::new();
    values.insert("alerts".to_string(), Value::Array(nearby));
    Ok(input::respond(&state, spec, values))
}

/// POST /pet/image
///
/// Adds a reference photo for a pet. When the embedding service knows the
/// photo, its embedding becomes the alert's embedding for ranked matching.
pub async fn add_pet_image(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<ShapedResponse> {
    let spec = &*ADD_PET_IMAGE;
    let record = match input::interpret(&state, spec, input::body_record(body)) {
        Ok(record) => record,
        Err(rejected) => return Ok(rejected),
    };
    let pet_id = input::text(&record, "pet_id");
    let image = input::text(&record, "image");

    let url = match image::resolve_image(&state, image).await? {
        Ok(url) => url,
        Err(warning) => return Ok(input::reject(&state, spec, vec![warning], None)),
    };

    let photos = state.store.add_pet_image(pet_id, image, &url).await?;

    if let Some(embedding) = state.embedder.embed(image).await {
        let updated = state
            .store
            .modify_alert(pet_id, |alert| alert.embedding = Some(embedding))
            .await?;
        if updated.is_some() {
            info!(pet_id, "Alert embedding updated from new photo");
        }
    }

    let mut values = Record::new();
    values.insert(
        "images".to_string(),
        Value::Array(photos.image_urls.into_iter().map(Value::String).collect()),
    );
    Ok(input::respond(&state, spec, values))
}

/// DELETE /pet/alert/sighting
pub async fn remove_sighting(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<ShapedResponse> {
    let spec = &*REMOVE_SIGHTING;
    let record = match input::interpret(&state, spec, Ok(input::query_record(params))) {
        Ok(record) => record,
        Err(rejected) => return Ok(rejected),
    };
    let pet_id = input::text(&record, "pet_id");
    let index = record.get("index").and_then(Value::as_i64).unwrap_or_default();

    let position = usize::try_from(index).ok();
    let outcome = state
        .store
        .modify_alert(pet_id, |alert| position.and_then(|i| alert.remove_sighting(i)))
        .await?;
    let Some((alert, removed)) = outcome else {
        return Ok(input::alert_not_found(&state, spec, pet_id));
    };

    if removed.is_none() {
        let warning = format!(
            "Sighting index {} is out of range for pet id '{}' ({} sightings).",
            index,
            pet_id,
            alert.sightings.len()
        );
        return Ok(input::reject(&state, spec, vec![warning], None));
    }
    info!(pet_id, index, "Removed sighting");

    let mut values = Record::new();
    if let Some(sightings) = alert.to_public_record()?.remove("sightings") {
        values.insert("sightings".to_string(), sightings);
    }
    Ok(input::respond(&state, spec, values))
}
