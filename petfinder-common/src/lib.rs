//! # PetFinder Common Library
//!
//! Shared code for the PetFinder service:
//! - Request specification engine and endpoint contracts
//! - Document shapes (alerts, sightings, pet photos)
//! - Sighting-to-alert matching
//! - Geographic and embedding similarity helpers
//! - Configuration loading

pub mod config;
pub mod documents;
pub mod endpoints;
pub mod error;
pub mod geo;
pub mod matcher;
pub mod similarity;
pub mod spec;

pub use documents::{AlertDocument, PetImagesDocument, SightingDocument};
pub use error::{Error, Result};
pub use matcher::Matcher;
pub use spec::Specification;
