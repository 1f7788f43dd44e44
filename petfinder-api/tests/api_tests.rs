//! Integration tests for petfinder-api endpoints
//!
//! Tests cover:
//! - Request interpretation: missing, unknown and malformed fields
//! - Alert lifecycle: create, update, get, found
//! - Sighting reports through the spoof and ranked matchers
//! - Nearby search, pet photos, sighting removal, image upload
//! - Health and documentation endpoints
//! - Concurrent requests and slow collaborators

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use petfinder_api::embedding::EmbeddingClient;
use petfinder_api::images::ImageStore;
use petfinder_api::notify::PushNotifier;
use petfinder_api::store::DocumentStore;
use petfinder_api::{build_router, AppState};
use petfinder_common::matcher::{MatchMode, RankedMatcher, SpoofMatcher, TargetMode};
use petfinder_common::spec::RecordingSink;
use petfinder_common::{AlertDocument, Matcher};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

struct TestApp {
    app: Router,
    state: AppState,
    sink: Arc<RecordingSink>,
    _images: TempDir,
}

/// Test helper: app over an in-memory store and a temporary image folder
async fn setup_app_with(matcher: Matcher, embedder: EmbeddingClient) -> TestApp {
    setup_app_full(matcher, embedder, PushNotifier::disabled()).await
}

async fn setup_app_full(matcher: Matcher, embedder: EmbeddingClient, notifier: PushNotifier) -> TestApp {
    let images_dir = tempfile::tempdir().unwrap();
    let store = DocumentStore::in_memory().await.expect("Should open in-memory store");
    let images = ImageStore::new(images_dir.path().join("images"), "http://pets.test");
    let sink = Arc::new(RecordingSink::new());

    let state = AppState::new(store, images, embedder, notifier, matcher)
        .with_warning_sink(sink.clone());

    TestApp {
        app: build_router(state.clone()),
        state,
        sink,
        _images: images_dir,
    }
}

/// Test helper: app whose matcher never matches
async fn setup_app() -> TestApp {
    let matcher = Matcher::Spoof(SpoofMatcher::seeded(MatchMode::Never, TargetMode::All, 7));
    setup_app_with(matcher, EmbeddingClient::disabled()).await
}

fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, extract_json(response.into_body()).await)
}

fn warnings(body: &Value) -> Vec<String> {
    body["warnings"]
        .as_array()
        .expect("warnings always present")
        .iter()
        .map(|w| w.as_str().unwrap().to_string())
        .collect()
}

async fn create_alert(app: &Router, body: Value) {
    let (status, body) = send(app, json_request("POST", "/pet/alert", body)).await;
    assert_eq!(status, StatusCode::OK, "alert rejected: {}", body);
}

async fn upload_image(app: &Router, bytes: &[u8]) -> String {
    let request = json_request("POST", "/image", json!({ "base64": STANDARD.encode(bytes) }));
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    body["id"].as_str().unwrap().to_string()
}

/// Test helper: embedding service answering the same vector for any image
async fn spawn_embedding_service(vector: Vec<f32>) -> String {
    let app = Router::new().route(
        "/embed",
        get(move || {
            let vector = vector.clone();
            async move { Json(json!({ "embedding": vector })) }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Test helper: push service that answers "ok" after `delay`
async fn spawn_push_service(delay: Duration) -> String {
    let app = Router::new().route(
        "/push",
        post(move || async move {
            tokio::time::sleep(delay).await;
            Json(json!({ "data": { "status": "ok", "id": "ticket-1" } }))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/push", addr)
}

// =============================================================================
// Service endpoints
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let test = setup_app().await;

    let (status, body) = send(&test.app, test_request("GET", "/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "petfinder-api");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_docs_describe_every_contract() {
    let test = setup_app().await;

    let (status, body) = send(&test.app, test_request("GET", "/api/docs")).await;

    assert_eq!(status, StatusCode::OK);
    let specs = body["specifications"].as_array().unwrap();
    assert_eq!(specs.len(), 8);

    let sighting = specs.iter().find(|s| s["endpoint"] == "/sighting").unwrap();
    assert_eq!(sighting["method"], "POST");
    let location = sighting["optional_fields"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["name"] == "specificLocation")
        .unwrap();
    assert_eq!(location["stored_as"], "location_desc");
}

// =============================================================================
// Request interpretation
// =============================================================================

#[tokio::test]
async fn test_unknown_alert_is_404_naming_id() {
    let test = setup_app().await;

    let (status, body) = send(&test.app, test_request("GET", "/pet/alert?id=ghost")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let warnings = warnings(&body);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("ghost"));
    // Declared response fields are still present
    assert_eq!(body["sightings"], json!([]));
    assert_eq!(body["assistance"], json!(false));

    assert_eq!(test.sink.warnings(), warnings);
}

#[tokio::test]
async fn test_missing_required_field() {
    let test = setup_app().await;

    let (status, body) = send(&test.app, json_request("POST", "/pet/alert", json!({"name": "Rex"}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(warnings(&body), vec!["Missing required fields: id."]);
}

#[tokio::test]
async fn test_unknown_field_rejected_in_strict_mode() {
    let test = setup_app().await;

    let request = json_request("POST", "/pet/alert", json!({"id": "rex-1", "foo": 1}));
    let (status, body) = send(&test.app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(warnings(&body), vec!["Field 'foo' is not in the specification."]);
    assert!(test.state.store.get_alert("rex-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_unknown_field_ignored_when_lenient() {
    let test = setup_app().await;
    let app = build_router(test.state.clone().with_strict(false));

    let request = json_request("POST", "/pet/alert", json!({"id": "rex-1", "foo": 1}));
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(warnings(&body).is_empty());
    assert!(test.state.store.get_alert("rex-1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_uncoercible_value_is_a_warning() {
    let test = setup_app().await;

    let request = json_request("POST", "/pet/alert", json!({"id": "rex-1", "location_lat": "north"}));
    let (status, body) = send(&test.app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let warnings = warnings(&body);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("location_lat"));
}

#[tokio::test]
async fn test_body_must_be_json_object() {
    let test = setup_app().await;

    let (status, body) = send(&test.app, json_request("POST", "/pet/found", json!(["rex-1"]))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(warnings(&body).len(), 1);
}

// =============================================================================
// Alert lifecycle
// =============================================================================

#[tokio::test]
async fn test_create_then_get_alert() {
    let test = setup_app().await;

    create_alert(
        &test.app,
        json!({
            "id": "rex-1",
            "name": "Rex",
            "animal": "dog",
            "assistance": "TRUE",
            "location_lat": "51.5",
            "location_long": -0.12
        }),
    )
    .await;

    let (status, body) = send(&test.app, test_request("GET", "/pet/alert?id=rex-1")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Rex");
    assert_eq!(body["animal"], "dog");
    assert_eq!(body["assistance"], json!(true));
    assert_eq!(body["location_lat"], json!(51.5));
    assert_eq!(body["location_long"], json!(-0.12));
    assert_eq!(body["breed"], "");
    assert_eq!(body["sightings"], json!([]));
    assert!(!body["timestamp"].as_str().unwrap().is_empty());
    assert!(body.get("embedding").is_none());
    assert!(warnings(&body).is_empty());

    // No contract drift
    assert!(test.sink.events().is_empty());
}

#[tokio::test]
async fn test_recreating_alert_keeps_sightings() {
    let test = setup_app().await;

    create_alert(&test.app, json!({"id": "rex-1", "name": "Rex"})).await;
    let (_, body) = send(&test.app, json_request("POST", "/sighting", json!({"id": "rex-1"}))).await;
    assert_eq!(body["matchN"], 1);

    create_alert(&test.app, json!({"id": "rex-1", "name": "Rex the Dog"})).await;

    let alert = test.state.store.get_alert("rex-1").await.unwrap().unwrap();
    assert_eq!(alert.name.as_deref(), Some("Rex the Dog"));
    assert_eq!(alert.sightings.len(), 1);
}

#[tokio::test]
async fn test_pet_found_closes_alert() {
    let test = setup_app().await;

    let (status, body) = send(&test.app, json_request("POST", "/pet/found", json!({"id": "rex-1"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(warnings(&body)[0].contains("rex-1"));

    create_alert(&test.app, json!({"id": "rex-1"})).await;
    let (status, _) = send(&test.app, json_request("POST", "/pet/found", json!({"id": "rex-1"}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&test.app, test_request("GET", "/pet/alert?id=rex-1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Sightings
// =============================================================================

#[tokio::test]
async fn test_sighting_attached_to_all_alerts() {
    let matcher = Matcher::Spoof(SpoofMatcher::seeded(MatchMode::Always, TargetMode::All, 7));
    let test = setup_app_with(matcher, EmbeddingClient::disabled()).await;

    create_alert(&test.app, json!({"id": "rex-1", "push_token": "ExponentPushToken[x]"})).await;
    create_alert(&test.app, json!({"id": "tom-2"})).await;

    let request = json_request(
        "POST",
        "/sighting",
        json!({
            "specificLocation": "by the canal",
            "chatID": "chat-9",
            "location_lat": 51.5,
            "location_long": -0.1
        }),
    );
    let (status, body) = send(&test.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matchN"], 2);

    for pet_id in ["rex-1", "tom-2"] {
        let alert = test.state.store.get_alert(pet_id).await.unwrap().unwrap();
        assert_eq!(alert.sightings.len(), 1);
        let sighting = &alert.sightings[0];
        assert_eq!(sighting.location_desc.as_deref(), Some("by the canal"));
        assert_eq!(sighting.chat_id.as_deref(), Some("chat-9"));
        assert!(sighting.timestamp.is_some());
    }
}

#[tokio::test]
async fn test_named_pet_counted_once() {
    let matcher = Matcher::Spoof(SpoofMatcher::seeded(MatchMode::Always, TargetMode::First, 7));
    let test = setup_app_with(matcher, EmbeddingClient::disabled()).await;

    create_alert(&test.app, json!({"id": "rex-1"})).await;
    create_alert(&test.app, json!({"id": "tom-2"})).await;

    let (_, body) = send(&test.app, json_request("POST", "/sighting", json!({"id": "rex-1"}))).await;
    assert_eq!(body["matchN"], 1);

    let (_, body) = send(&test.app, json_request("POST", "/sighting", json!({"id": "tom-2"}))).await;
    assert_eq!(body["matchN"], 2);

    let rex = test.state.store.get_alert("rex-1").await.unwrap().unwrap();
    assert_eq!(rex.sightings.len(), 2);
}

#[tokio::test]
async fn test_sighting_with_unknown_image() {
    let test = setup_app().await;

    let request = json_request("POST", "/sighting", json!({"image": "image_missing.jpg"}));
    let (status, body) = send(&test.app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(warnings(&body)[0].contains("image_missing.jpg"));
    assert_eq!(body["matchN"], 0);
}

#[tokio::test]
async fn test_ranked_matching_end_to_end() {
    let url = spawn_embedding_service(vec![1.0, 0.0]).await;
    let embedder = EmbeddingClient::remote(&url, Duration::from_secs(5)).unwrap();
    let test = setup_app_with(Matcher::Ranked(RankedMatcher::new(1, 0.03)), embedder).await;

    let mut near = AlertDocument::new("near");
    near.embedding = Some(vec![0.9, 0.19f32.sqrt()]);
    near.location_lat = Some(1.0);
    near.location_long = Some(0.0);
    let mut far = AlertDocument::new("far");
    far.embedding = Some(vec![0.95, 0.0975f32.sqrt()]);
    far.location_lat = Some(10.0);
    far.location_long = Some(0.0);
    test.state.store.set_alert(&near).await.unwrap();
    test.state.store.set_alert(&far).await.unwrap();

    let image = upload_image(&test.app, b"\xff\xd8sighting").await;
    let request = json_request(
        "POST",
        "/sighting",
        json!({"image": image, "location_lat": 0.0, "location_long": 0.0}),
    );
    let (status, body) = send(&test.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matchN"], 1);

    let near = test.state.store.get_alert("near").await.unwrap().unwrap();
    let far = test.state.store.get_alert("far").await.unwrap().unwrap();
    assert_eq!(near.sightings.len(), 1);
    assert!(far.sightings.is_empty());

    let sighting = &near.sightings[0];
    assert_eq!(sighting.embedding, Some(vec![1.0, 0.0]));
    assert_eq!(
        sighting.image_url.as_deref(),
        Some(format!("http://pets.test/images/{}", image).as_str())
    );
}

#[tokio::test]
async fn test_remove_sighting_by_index() {
    let test = setup_app().await;

    create_alert(&test.app, json!({"id": "rex-1"})).await;
    for description in ["first", "second"] {
        let request = json_request("POST", "/sighting", json!({"id": "rex-1", "description": description}));
        send(&test.app, request).await;
    }

    let (status, body) = send(&test.app, test_request("DELETE", "/pet/alert/sighting?id=rex-1&index=0")).await;
    assert_eq!(status, StatusCode::OK);
    let sightings = body["sightings"].as_array().unwrap();
    assert_eq!(sightings.len(), 1);
    assert_eq!(sightings[0]["description"], "second");

    let (status, body) = send(&test.app, test_request("DELETE", "/pet/alert/sighting?id=rex-1&index=5")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(warnings(&body)[0].contains("out of range"));

    let (status, _) = send(&test.app, test_request("DELETE", "/pet/alert/sighting?id=ghost&index=0")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Nearby search
// =============================================================================

#[tokio::test]
async fn test_nearby_alerts_by_radius() {
    let test = setup_app().await;

    create_alert(&test.app, json!({"id": "london", "location_lat": 51.5074, "location_long": -0.1278})).await;
    create_alert(&test.app, json!({"id": "paris", "location_lat": 48.8566, "location_long": 2.3522})).await;
    create_alert(&test.app, json!({"id": "nowhere"})).await;

    let uri = "/pet/nearby?location_lat=51.51&location_long=-0.13";
    let (status, body) = send(&test.app, test_request("GET", uri)).await;
    assert_eq!(status, StatusCode::OK);
    let alerts = body["alerts"].as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["pet_id"], "london");

    let uri = "/pet/nearby?location_lat=51.51&location_long=-0.13&radius=400";
    let (_, body) = send(&test.app, test_request("GET", uri)).await;
    assert_eq!(body["alerts"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_nearby_requires_location() {
    let test = setup_app().await;

    let (status, body) = send(&test.app, test_request("GET", "/pet/nearby?location_lat=51.5")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(warnings(&body), vec!["Missing required fields: location_long."]);
    assert_eq!(body["alerts"], json!([]));
}

// =============================================================================
// Images
// =============================================================================

#[tokio::test]
async fn test_uploaded_image_is_served() {
    let test = setup_app().await;

    let image = upload_image(&test.app, b"\xff\xd8jpeg").await;

    let response = test
        .app
        .clone()
        .oneshot(test_request("GET", &format!("/images/{}", image)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"\xff\xd8jpeg");
}

#[tokio::test]
async fn test_invalid_upload_is_a_warning() {
    let test = setup_app().await;

    let request = json_request("POST", "/image", json!({"base64": "@@not base64@@"}));
    let (status, body) = send(&test.app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(warnings(&body).len(), 1);
    assert_eq!(body["id"], "");
}

#[tokio::test]
async fn test_pet_photo_updates_alert_embedding() {
    let url = spawn_embedding_service(vec![0.6, 0.8]).await;
    let embedder = EmbeddingClient::remote(&url, Duration::from_secs(5)).unwrap();
    let matcher = Matcher::Spoof(SpoofMatcher::seeded(MatchMode::Never, TargetMode::All, 7));
    let test = setup_app_with(matcher, embedder).await;

    create_alert(&test.app, json!({"id": "rex-1"})).await;
    let image = upload_image(&test.app, b"\xff\xd8rex").await;

    let request = json_request("POST", "/pet/image", json!({"id": "rex-1", "image": image}));
    let (status, body) = send(&test.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["images"], json!([format!("http://pets.test/images/{}", image)]));

    let alert = test.state.store.get_alert("rex-1").await.unwrap().unwrap();
    assert_eq!(alert.embedding, Some(vec![0.6, 0.8]));
}

// =============================================================================
// Concurrency and slow collaborators
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_found_during_sighting_stays_closed() {
    let push_url = spawn_push_service(Duration::from_millis(600)).await;
    let notifier = PushNotifier::expo(push_url, Duration::from_secs(5)).unwrap();
    let matcher = Matcher::Spoof(SpoofMatcher::seeded(MatchMode::Always, TargetMode::All, 7));
    let test = setup_app_full(matcher, EmbeddingClient::disabled(), notifier).await;

    create_alert(&test.app, json!({"id": "rex-1", "push_token": "ExponentPushToken[rex]"})).await;
    create_alert(&test.app, json!({"id": "tom-2"})).await;

    let app = test.app.clone();
    let sighting = tokio::spawn(async move {
        send(&app, json_request("POST", "/sighting", json!({"description": "grey cat"}))).await
    });

    // Lands while the sighting waits on the push service
    tokio::time::sleep(Duration::from_millis(200)).await;
    let (status, _) = send(&test.app, json_request("POST", "/pet/found", json!({"id": "tom-2"}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = sighting.await.unwrap();
    assert_eq!(status, StatusCode::OK);

    assert!(test.state.store.get_alert("tom-2").await.unwrap().is_none());
    let rex = test.state.store.get_alert("rex-1").await.unwrap().unwrap();
    assert_eq!(rex.sightings.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_hung_push_service_does_not_stall_sighting() {
    let push_url = spawn_push_service(Duration::from_secs(60)).await;
    let notifier = PushNotifier::expo(push_url, Duration::from_secs(1)).unwrap();
    let matcher = Matcher::Spoof(SpoofMatcher::seeded(MatchMode::Always, TargetMode::All, 7));
    let test = setup_app_full(matcher, EmbeddingClient::disabled(), notifier).await;

    create_alert(&test.app, json!({"id": "rex-1", "push_token": "ExponentPushToken[rex]"})).await;

    let request = json_request("POST", "/sighting", json!({"description": "brown dog"}));
    let (status, body) = tokio::time::timeout(Duration::from_secs(5), send(&test.app, request))
        .await
        .expect("sighting should finish once the push times out");

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matchN"], 1);
    let rex = test.state.store.get_alert("rex-1").await.unwrap().unwrap();
    assert_eq!(rex.sightings.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sightings_alternate() {
    let matcher = Matcher::Spoof(SpoofMatcher::seeded(MatchMode::Alternating, TargetMode::All, 7));
    let test = setup_app_with(matcher, EmbeddingClient::disabled()).await;

    create_alert(&test.app, json!({"id": "rex-1"})).await;

    const SIGHTINGS: usize = 9;
    let tasks: Vec<_> = (0..SIGHTINGS)
        .map(|i| {
            let app = test.app.clone();
            tokio::spawn(async move {
                let request = json_request("POST", "/sighting", json!({"description": format!("sighting {}", i)}));
                send(&app, request).await
            })
        })
        .collect();

    let mut matched = 0;
    for task in tasks {
        let (status, body) = task.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        matched += body["matchN"].as_u64().unwrap();
    }

    // Alternation starts with a match: ceil(N / 2)
    assert_eq!(matched, 5);
    let rex = test.state.store.get_alert("rex-1").await.unwrap().unwrap();
    assert_eq!(rex.sightings.len(), 5);
}
