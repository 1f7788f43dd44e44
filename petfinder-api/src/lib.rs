//! petfinder-api library - lost-and-found pet reporting service
//!
//! Wires the endpoint contracts and the matcher from `petfinder-common` to
//! HTTP routes, the document store, image storage, the embedding model
//! client and push delivery.

use std::sync::{Arc, Mutex};

use axum::Router;
use petfinder_common::config::ServiceConfig;
use petfinder_common::spec::{TracingWarningSink, WarningSink};
use petfinder_common::Matcher;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod embedding;
pub mod error;
pub mod images;
pub mod notify;
pub mod store;

use embedding::EmbeddingClient;
use images::ImageStore;
use notify::PushNotifier;
use store::DocumentStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: DocumentStore,
    pub images: ImageStore,
    pub embedder: EmbeddingClient,
    pub notifier: PushNotifier,
    /// The single matcher instance; locked only around a match call
    pub matcher: Arc<Mutex<Matcher>>,
    /// Receives every warning sent to clients
    pub warning_sink: Arc<dyn WarningSink>,
    /// Reject request fields outside the contract
    pub strict: bool,
}

impl AppState {
    /// Create new application state, logging warnings through `tracing`
    pub fn new(
        store: DocumentStore,
        images: ImageStore,
        embedder: EmbeddingClient,
        notifier: PushNotifier,
        matcher: Matcher,
    ) -> Self {
        Self {
            store,
            images,
            embedder,
            notifier,
            matcher: Arc::new(Mutex::new(matcher)),
            warning_sink: Arc::new(TracingWarningSink),
            strict: true,
        }
    }

    /// State for a configured service
    pub fn from_config(
        config: &ServiceConfig,
        store: DocumentStore,
        images: ImageStore,
    ) -> petfinder_common::Result<Self> {
        let embedder = EmbeddingClient::from_config(&config.embedding)?;
        let notifier = PushNotifier::from_config(&config.push)?;
        let matcher = Matcher::from_config(&config.matcher);
        Ok(Self::new(store, images, embedder, notifier, matcher).with_strict(config.strict_requests))
    }

    pub fn with_warning_sink(mut self, sink: Arc<dyn WarningSink>) -> Self {
        self.warning_sink = sink;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{delete, get, post};

    let images = ServeDir::new(state.images.dir());

    Router::new()
        .route("/image", post(api::upload_image))
        .route("/sighting", post(api::report_sighting))
        .route("/pet/found", post(api::pet_found))
        .route("/pet/alert", get(api::get_alert).post(api::create_alert))
        .route("/pet/alert/sighting", delete(api::remove_sighting))
        .route("/pet/nearby", get(api::nearby_alerts))
        .route("/pet/image", post(api::add_pet_image))
        .route("/api/docs", get(api::get_docs))
        .merge(api::health_routes())
        .nest_service(images::IMAGES_ROUTE, images)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
