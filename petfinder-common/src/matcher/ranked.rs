//! Similarity-ranked matching
//!
//! Each alert is scored by how much its pet photo looks like the sighting
//! photo, weighted by how close the two locations are:
//!
//! ```text
//! score = similarity(sighting, alert) * (decay / distance(sighting, alert))
//! ```
//!
//! The best `k` alerts are selected. Once the candidate pool holds no more
//! than `k` alerts only the single best one is taken.

use std::cmp::Ordering;

use tracing::debug;

use crate::documents::{AlertDocument, SightingDocument};
use crate::geo::{self, GeoPoint};
use crate::similarity;

/// Default number of alerts a sighting can match
pub const DEFAULT_K: usize = 1;

/// Default proximity weight
pub const DEFAULT_DECAY: f64 = 0.03;

/// Distances below this are treated as this, so coincident points score
/// as the closest possible instead of dividing by zero.
pub const MIN_DISTANCE: f64 = 1e-6;

/// Embedding similarity function
pub type SimilarityFn = fn(&[f32], &[f32]) -> f64;

/// Location distance function
pub type DistanceFn = fn(GeoPoint, GeoPoint) -> f64;

/// Nearest-neighbour matcher over embeddings and location
#[derive(Clone, Copy)]
pub struct RankedMatcher {
    k: usize,
    decay: f64,
    similarity: SimilarityFn,
    distance: DistanceFn,
}

impl std::fmt::Debug for RankedMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RankedMatcher")
            .field("k", &self.k)
            .field("decay", &self.decay)
            .finish_non_exhaustive()
    }
}

impl Default for RankedMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_K, DEFAULT_DECAY)
    }
}

impl RankedMatcher {
    /// Cosine similarity and straight-line distance
    pub fn new(k: usize, decay: f64) -> Self {
        Self {
            k,
            decay,
            similarity: similarity::cosine_similarity,
            distance: geo::euclidean,
        }
    }

    pub fn with_similarity(mut self, similarity: SimilarityFn) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn with_distance(mut self, distance: DistanceFn) -> Self {
        self.distance = distance;
        self
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn decay(&self) -> f64 {
        self.decay
    }

    /// Score one alert against a sighting's embedding and location.
    ///
    /// `None` when the alert has no embedding or no location.
    pub fn score(&self, embedding: &[f32], location: GeoPoint, alert: &AlertDocument) -> Option<f64> {
        let alert_embedding = alert.embedding.as_deref()?;
        let alert_location = alert.location()?;

        let similarity = (self.similarity)(embedding, alert_embedding);
        let distance = (self.distance)(location, alert_location).max(MIN_DISTANCE);
        Some(similarity * (self.decay / distance))
    }

    /// Every scorable alert with its score, best first
    pub fn rank<'a>(
        &self,
        sighting: &SightingDocument,
        alerts: &'a [AlertDocument],
    ) -> Vec<(f64, &'a AlertDocument)> {
        let (Some(embedding), Some(location)) = (sighting.embedding.as_deref(), sighting.location()) else {
            debug!("Sighting lacks embedding or location; nothing to rank");
            return Vec::new();
        };

        let mut scored: Vec<(f64, &AlertDocument)> = alerts
            .iter()
            .filter_map(|alert| match self.score(embedding, location, alert) {
                Some(score) => Some((score, alert)),
                None => {
                    debug!(pet_id = %alert.pet_id, "Skipping alert without embedding or location");
                    None
                }
            })
            .collect();

        // NaN sorts last
        scored.sort_by(|a, b| match (a.0.is_nan(), b.0.is_nan()) {
            (false, false) => b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal),
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (true, true) => Ordering::Equal,
        });
        scored
    }

    /// Number of alerts to select from a pool of `candidates`
    pub fn selection_size(&self, candidates: usize) -> usize {
        if candidates <= self.k {
            self.k.min(1)
        } else {
            self.k
        }
    }

    pub fn match_alerts<'a>(
        &self,
        sighting: &SightingDocument,
        alerts: &'a [AlertDocument],
    ) -> Vec<&'a AlertDocument> {
        let ranked = self.rank(sighting, alerts);
        let take = self.selection_size(ranked.len());
        ranked.into_iter().take(take).map(|(_, alert)| alert).collect()
    }
}
