//! Sighting reports
//!
//! A sighting is never stored on its own. It is attached to every alert the
//! matcher selects, plus the alert of any pet the reporter named.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use petfinder_common::documents::PetId;
use petfinder_common::endpoints::REPORT_SIGHTING;
use petfinder_common::spec::{Record, ShapedResponse};
use petfinder_common::{AlertDocument, SightingDocument};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{image, input};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /sighting
pub async fn report_sighting(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<ShapedResponse> {
    let spec = &*REPORT_SIGHTING;
    let record = match input::interpret(&state, spec, input::body_record(body)) {
        Ok(record) => record,
        Err(rejected) => return Ok(rejected),
    };

    let mut sighting = SightingDocument::from_record(record)?;
    sighting.timestamp = Some(Utc::now().to_rfc3339());

    if let Some(image) = sighting.image.clone().filter(|image| !image.is_empty()) {
        match image::resolve_image(&state, &image).await? {
            Ok(url) => sighting.image_url = Some(url),
            Err(warning) => return Ok(input::reject(&state, spec, vec![warning], None)),
        }
        sighting.embedding = state.embedder.embed(&image).await;
    }

    if let Some(pet_id) = sighting.pet_id.clone().filter(|id| !id.is_empty()) {
        sighting.match_with.push(pet_id);
    }

    let alerts = state.store.list_alerts().await?;
    let mut targets: Vec<PetId> = {
        let mut matcher = state
            .matcher
            .lock()
            .map_err(|_| ApiError::Internal("Matcher lock poisoned".to_string()))?;
        matcher
            .match_alerts(&sighting, &alerts)
            .into_iter()
            .map(|alert| alert.pet_id.clone())
            .collect()
    };
    debug!(candidates = alerts.len(), selected = targets.len(), "Matched sighting");

    for pet_id in &sighting.match_with {
        if targets.contains(pet_id) {
            continue;
        }
        if alerts.iter().any(|alert| &alert.pet_id == pet_id) {
            targets.push(pet_id.clone());
        } else {
            warn!(pet_id = %pet_id, "Sighting names a pet with no open alert");
        }
    }

    // Attach to the stored alerts, not the snapshot the matcher saw
    let mut attached: Vec<AlertDocument> = Vec::with_capacity(targets.len());
    for pet_id in &targets {
        let appended = state
            .store
            .modify_alert(pet_id, |alert| alert.add_sighting(sighting.clone()))
            .await?;
        match appended {
            Some((alert, ())) => attached.push(alert),
            None => debug!(pet_id = %pet_id, "Alert closed before the sighting was attached"),
        }
    }

    for alert in &attached {
        state.notifier.notify_sighting(alert, &sighting).await;
    }

    info!(matched = attached.len(), "Sighting reported");

    let mut values = Record::new();
    values.insert("matchN".to_string(), json!(attached.len()));
    Ok(input::respond(&state, spec, values))
}
