//! HTTP API handlers for petfinder-api

pub mod docs;
pub mod health;
pub mod image;
pub mod input;
pub mod pet;
pub mod sighting;

pub use docs::get_docs;
pub use health::health_routes;
pub use image::upload_image;
pub use pet::{add_pet_image, create_alert, get_alert, nearby_alerts, pet_found, remove_sighting};
pub use sighting::report_sighting;
