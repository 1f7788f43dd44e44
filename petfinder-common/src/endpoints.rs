//! Contracts for every PetFinder endpoint
//!
//! Each contract is built once and shared. The route layer interprets
//! requests and shapes responses through these, never by hand.

use axum::http::Method;
use once_cell::sync::Lazy;

use crate::spec::coerce::{BOOL, FLAG, FLOAT, INT, LIST, STRING};
use crate::spec::Specification;

/// Radius used by `/pet/nearby` when the client does not send one (km)
pub const DEFAULT_NEARBY_RADIUS_KM: f64 = 30.0;

pub static UPLOAD_IMAGE: Lazy<Specification> = Lazy::new(|| {
    Specification::new("Upload Image", "/image", Method::POST)
        .describe("Uploads an image to storage, returning its reference as id.")
        .required("base64", STRING)
        .response("id", STRING)
        .annotate("base64", "Base64-encoded JPEG data.")
});

pub static REPORT_SIGHTING: Lazy<Specification> = Lazy::new(|| {
    Specification::new("Report a Sighting", "/sighting", Method::POST)
        .describe("Reports a sighting of a pet, matching it with any alerts.")
        .optional("location_lat", FLOAT)
        .optional("location_long", FLOAT)
        .optional("specificLocation", STRING)
        .optional("description", STRING)
        .optional("breed", STRING)
        .optional("color", STRING)
        .optional("other", STRING)
        .optional("behaviour", STRING)
        .optional("health", STRING)
        .optional("image", STRING)
        .optional("id", STRING)
        .optional("chatID", STRING)
        .optional("contactinfo", STRING)
        .optional("message", STRING)
        .rename("specificLocation", "location_desc")
        .rename("id", "pet_id")
        .rename("chatID", "chat_id")
        .response("matchN", INT)
        .annotate(
            "image",
            format!(
                "Should be an image reference obtained from a call to {}.",
                UPLOAD_IMAGE.endpoint()
            ),
        )
        .annotate("id", "If set, the sighting is attached to this pet's alert.")
        .annotate("matchN", "The number of alerts matched by the sighting.")
        .annotate(
            "chatID",
            "If set, indicates that the user is willing to be contacted about the sighting.",
        )
});

pub static PET_FOUND: Lazy<Specification> = Lazy::new(|| {
    Specification::new("Report a Pet as Found", "/pet/found", Method::POST)
        .describe("Reports a pet as found, removing any alerts associated with it.")
        .required("id", STRING)
});

pub static CREATE_ALERT: Lazy<Specification> = Lazy::new(|| {
    Specification::new("Report a Pet as Lost", "/pet/alert", Method::POST)
        .describe("Reports a pet as lost, creating an alert for it.")
        .required("id", STRING)
        .optional("animal", STRING)
        .optional("breed", STRING)
        .optional("description", STRING)
        .optional("location_lat", FLOAT)
        .optional("location_long", FLOAT)
        .optional("condition", STRING)
        .optional("more", STRING)
        .optional("assistance", FLAG)
        .optional("name", STRING)
        .optional("push_token", STRING)
        .optional("size", STRING)
        .optional("contactinfo", STRING)
        .optional("message", STRING)
        .rename("id", "pet_id")
        .annotate("push_token", "Device token that receives a push when a sighting matches.")
});

pub static GET_ALERT: Lazy<Specification> = Lazy::new(|| {
    Specification::new("Get Alert Information", "/pet/alert", Method::GET)
        .describe("Gets information about a pet alert and any matched sightings reported.")
        .required("id", STRING)
        .rename("id", "pet_id")
        .response("animal", STRING)
        .response("breed", STRING)
        .response("description", STRING)
        .response("location_lat", FLOAT)
        .response("location_long", FLOAT)
        .response("condition", STRING)
        .response("more", STRING)
        .response("assistance", BOOL)
        .response("name", STRING)
        .response("sightings", LIST)
        .response("push_token", STRING)
        .response("timestamp", STRING)
        .response("size", STRING)
        .response("contactinfo", STRING)
        .response("message", STRING)
        .annotate(
            "sightings",
            format!(
                "Sightings that matched the alert (see '{}'). Note that 'specificLocation' \
                 is returned as 'location_desc' instead.",
                REPORT_SIGHTING.name()
            ),
        )
});

pub static NEARBY_ALERTS: Lazy<Specification> = Lazy::new(|| {
    Specification::new("Get Nearby Alerts", "/pet/nearby", Method::GET)
        .describe("Gets alerts that are nearby the provided location.")
        .required("location_lat", FLOAT)
        .required("location_long", FLOAT)
        .optional("radius", FLOAT)
        .response("alerts", LIST)
        .annotate(
            "radius",
            format!("Search radius in kilometres (default {}).", DEFAULT_NEARBY_RADIUS_KM),
        )
});

pub static ADD_PET_IMAGE: Lazy<Specification> = Lazy::new(|| {
    Specification::new("Add a Pet Photo", "/pet/image", Method::POST)
        .describe("Registers a reference photo of a lost pet, used to recognise it in sightings.")
        .required("id", STRING)
        .required("image", STRING)
        .rename("id", "pet_id")
        .response("images", LIST)
        .annotate(
            "image",
            format!(
                "Should be an image reference obtained from a call to {}.",
                UPLOAD_IMAGE.endpoint()
            ),
        )
});

pub static REMOVE_SIGHTING: Lazy<Specification> = Lazy::new(|| {
    Specification::new("Remove a Sighting", "/pet/alert/sighting", Method::DELETE)
        .describe("Removes one sighting, by position, from a pet alert.")
        .required("id", STRING)
        .required("index", INT)
        .rename("id", "pet_id")
        .response("sightings", LIST)
        .annotate("index", "Zero-based position in the alert's sighting list.")
});

/// Every contract the service exposes
pub fn all() -> Vec<&'static Specification> {
    vec![
        &*UPLOAD_IMAGE,
        &*REPORT_SIGHTING,
        &*PET_FOUND,
        &*CREATE_ALERT,
        &*GET_ALERT,
        &*NEARBY_ALERTS,
        &*ADD_PET_IMAGE,
        &*REMOVE_SIGHTING,
    ]
}
