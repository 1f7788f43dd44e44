//! Document shapes stored by the service
//!
//! Documents are built from interpreted request records (see
//! [`crate::spec`]), so their field names are the internal, renamed ones.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geo::GeoPoint;
use crate::spec::Record;
use crate::{Error, Result};

/// Pet identifier, primary key of alerts and pet photos
pub type PetId = String;

/// Reference to an image in storage, as returned by `/image`
pub type ImageRef = String;

/// A report that a missing pet may have been seen.
///
/// Not stored on its own; sightings live inside the alerts they matched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SightingDocument {
    pub location_lat: Option<f64>,
    pub location_long: Option<f64>,
    pub location_desc: Option<String>,
    pub description: Option<String>,
    pub breed: Option<String>,
    pub color: Option<String>,
    pub other: Option<String>,
    pub behaviour: Option<String>,
    pub health: Option<String>,
    pub contactinfo: Option<String>,
    pub message: Option<String>,
    pub chat_id: Option<String>,
    /// Pet the reporter believes they saw, if any
    pub pet_id: Option<PetId>,
    pub image: Option<ImageRef>,
    pub image_url: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub timestamp: Option<String>,
    /// Alerts this sighting should be attached to regardless of matching
    pub match_with: Vec<PetId>,
}

impl SightingDocument {
    /// Build from a record interpreted by the sighting contract
    pub fn from_record(record: Record) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(record))?)
    }

    pub fn location(&self) -> Option<GeoPoint> {
        GeoPoint::from_parts(self.location_lat, self.location_long)
    }
}

/// An open "pet is missing" report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertDocument {
    pub pet_id: PetId,
    pub name: Option<String>,
    pub animal: Option<String>,
    pub breed: Option<String>,
    pub description: Option<String>,
    pub assistance: Option<bool>,
    pub location_lat: Option<f64>,
    pub location_long: Option<f64>,
    pub condition: Option<String>,
    pub more: Option<String>,
    pub size: Option<String>,
    pub contactinfo: Option<String>,
    pub message: Option<String>,
    pub push_token: Option<String>,
    pub timestamp: Option<String>,
    /// Embedding of the pet's most recent reference photo
    pub embedding: Option<Vec<f32>>,
    pub sightings: Vec<SightingDocument>,
}

impl AlertDocument {
    pub fn new(pet_id: impl Into<PetId>) -> Self {
        Self {
            pet_id: pet_id.into(),
            ..Default::default()
        }
    }

    /// Build from a record interpreted by the alert contract
    pub fn from_record(record: Record) -> Result<Self> {
        let alert: Self = serde_json::from_value(Value::Object(record))?;
        if alert.pet_id.is_empty() {
            return Err(Error::InvalidInput("alert without pet id".to_string()));
        }
        Ok(alert)
    }

    /// Overwrite every field present in `record`, keeping the rest.
    ///
    /// Sightings and the stored embedding are never replaced this way.
    pub fn update_from_record(&mut self, record: Record) -> Result<()> {
        let mut merged = match serde_json::to_value(&*self)? {
            Value::Object(map) => map,
            _ => return Err(Error::Internal("alert did not serialize to an object".to_string())),
        };
        for (key, value) in record {
            if key != "sightings" && key != "embedding" && key != "pet_id" {
                merged.insert(key, value);
            }
        }
        *self = serde_json::from_value(Value::Object(merged))?;
        Ok(())
    }

    pub fn location(&self) -> Option<GeoPoint> {
        GeoPoint::from_parts(self.location_lat, self.location_long)
    }

    /// Attach a matched sighting
    pub fn add_sighting(&mut self, sighting: SightingDocument) {
        self.sightings.push(sighting);
    }

    /// Detach the sighting at `index`, if it exists
    pub fn remove_sighting(&mut self, index: usize) -> Option<SightingDocument> {
        (index < self.sightings.len()).then(|| self.sightings.remove(index))
    }

    /// Client-facing view: all set fields except embeddings.
    ///
    /// Unset fields are left out so response shaping fills in their
    /// defaults. The pet id is kept; callers answering a lookup by id drop
    /// it themselves.
    pub fn to_public_record(&self) -> Result<Record> {
        let mut record = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => return Err(Error::Internal("alert did not serialize to an object".to_string())),
        };
        record.remove("embedding");
        record.retain(|_, value| !value.is_null());
        if let Some(Value::Array(sightings)) = record.get_mut("sightings") {
            for sighting in sightings.iter_mut() {
                if let Value::Object(fields) = sighting {
                    fields.remove("embedding");
                }
            }
        }
        Ok(record)
    }
}

/// Reference photos of a lost pet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PetImagesDocument {
    pub pet_id: PetId,
    pub images: Vec<ImageRef>,
    pub image_urls: Vec<String>,
}

impl PetImagesDocument {
    pub fn new(pet_id: impl Into<PetId>) -> Self {
        Self {
            pet_id: pet_id.into(),
            ..Default::default()
        }
    }

    pub fn add_image(&mut self, image: ImageRef, url: String) {
        self.images.push(image);
        self.image_urls.push(url);
    }
}
