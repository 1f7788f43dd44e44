//! Client for the image embedding model service
//!
//! The model runs elsewhere and exposes `GET /embed?fname=<image>`,
//! answering `{"embedding": [...]}`. Batch-shaped answers (a list holding
//! one vector) are accepted too.

use petfinder_common::config::EmbeddingConfig;
use petfinder_common::{Error, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    remote: Option<Remote>,
}

#[derive(Debug, Clone)]
struct Remote {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingPayload,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmbeddingPayload {
    Flat(Vec<f32>),
    Batch(Vec<Vec<f32>>),
}

impl EmbeddingPayload {
    fn into_vector(self) -> Option<Vec<f32>> {
        let vector = match self {
            EmbeddingPayload::Flat(v) => v,
            EmbeddingPayload::Batch(rows) => rows.into_iter().next()?,
        };
        (!vector.is_empty()).then_some(vector)
    }
}

impl EmbeddingClient {
    /// No model available; every embedding is absent
    pub fn disabled() -> Self {
        Self { remote: None }
    }

    pub fn remote(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Embedding client setup failed: {}", e)))?;

        Ok(Self {
            remote: Some(Remote {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
            }),
        })
    }

    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        match &config.url {
            Some(url) => Self::remote(url, Duration::from_secs(config.timeout_secs)),
            None => Ok(Self::disabled()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.remote.is_some()
    }

    /// Embedding for a stored image.
    ///
    /// Failures are logged and reported as no embedding; a sighting without
    /// one is still stored, it just cannot be ranked.
    pub async fn embed(&self, image: &str) -> Option<Vec<f32>> {
        let remote = self.remote.as_ref()?;
        match remote.fetch(image).await {
            Ok(Some(vector)) => {
                debug!(image, dimensions = vector.len(), "Embedded image");
                Some(vector)
            }
            Ok(None) => {
                warn!(image, "Embedding service returned an empty embedding");
                None
            }
            Err(e) => {
                warn!(image, "Embedding request failed: {}", e);
                None
            }
        }
    }
}

impl Remote {
    async fn fetch(&self, image: &str) -> std::result::Result<Option<Vec<f32>>, reqwest::Error> {
        let response: EmbedResponse = self
            .client
            .get(format!("{}/embed", self.base_url))
            .query(&[("fname", image)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.embedding.into_vector())
    }
}
