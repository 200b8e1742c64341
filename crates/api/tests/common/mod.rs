#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use salon_api::auth::jwt::{generate_access_token, JwtConfig};
use salon_api::config::ServerConfig;
use salon_api::router::build_app_router;
use salon_api::service::AppointmentService;
use salon_api::state::AppState;
use salon_db::{KeyValueStore, MemoryStore};
use salon_events::{
    EventBus, FlushConfig, FlushQueue, NotificationFanout, NotificationStore, PaymentLedger,
    PaymentRequester, PaymentTrigger,
};

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:8081".to_string()],
        request_timeout_secs: 30,
        data_dir: "./data".into(),
        storage_load_timeout_ms: 150,
        flush_max_retries: 3,
        reminder_interval_secs: 300,
        reminder_lead_mins: 1440,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hs256".to_string(),
            access_token_expiry_mins: 60,
        },
    }
}

/// A running app: the router plus direct handles on what sits behind it.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
}

/// Build the full application router backed by an in-memory store, with
/// the notification fan-out and payment trigger running.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let kv: Arc<dyn KeyValueStore> = store.clone();
    let (flush, _flush_handle) = FlushQueue::spawn(kv, FlushConfig::default());

    let event_bus = Arc::new(EventBus::default());
    let appointments = Arc::new(AppointmentService::new(
        Arc::clone(&event_bus),
        flush.clone(),
    ));
    let notifications = Arc::new(NotificationStore::new(flush.clone()));
    let payments = Arc::new(PaymentLedger::new(flush.clone()));

    let fanout = NotificationFanout::new(Arc::clone(&notifications), Arc::clone(&event_bus));
    tokio::spawn(fanout.run(event_bus.subscribe()));
    let requester: Arc<dyn PaymentRequester> = payments.clone();
    let trigger = PaymentTrigger::new(requester, Arc::clone(&event_bus));
    tokio::spawn(trigger.run(event_bus.subscribe()));

    let state = AppState {
        config: Arc::new(config.clone()),
        appointments,
        notifications,
        payments,
        event_bus,
        flush,
    };

    TestApp {
        router: build_app_router(state.clone(), &config),
        state,
        store,
    }
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// A valid bearer token for `user_id` acting as `role`.
pub fn token(user_id: &str, role: &str) -> String {
    generate_access_token(user_id, role, &test_config().jwt).unwrap()
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn get_auth(app: &Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

async fn json_auth(
    app: &Router,
    method: Method,
    uri: &str,
    body: Value,
    token: &str,
) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_json_auth(app: &Router, uri: &str, body: Value, token: &str) -> Response<Body> {
    json_auth(app, Method::POST, uri, body, token).await
}

pub async fn patch_json_auth(app: &Router, uri: &str, body: Value, token: &str) -> Response<Body> {
    json_auth(app, Method::PATCH, uri, body, token).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// The booking used across scenarios: 2024-09-16, 17:00-17:30 with `P1`.
pub fn booking() -> Value {
    json!({
        "providerId": "P1",
        "serviceId": "S1",
        "date": "2024-09-16",
        "startTime": "17:00",
        "endTime": "17:30",
        "duration": 30,
        "serviceAmount": 60.0,
    })
}

/// Create the standard booking as client `C1`; returns the appointment id.
pub async fn create_booking(app: &Router) -> String {
    let response = post_json_auth(app, "/api/v1/appointments", booking(), &token("C1", "client")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    json["data"]["id"].as_str().unwrap().to_string()
}

/// Drive an appointment through the named transition endpoints.
pub async fn advance(app: &Router, id: &str, steps: &[&str], staff_token: &str) {
    for step in steps {
        let response = post_json_auth(
            app,
            &format!("/api/v1/appointments/{id}/{step}"),
            json!({}),
            staff_token,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK, "step '{step}' failed");
    }
}

/// Poll until `user_id` has `expected` unread notifications.
pub async fn wait_for_unread(state: &AppState, user_id: &str, expected: usize) {
    for _ in 0..100 {
        if state.notifications.unread_count(user_id).await >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "expected {expected} unread notifications for {user_id}, found {}",
        state.notifications.unread_count(user_id).await
    );
}
