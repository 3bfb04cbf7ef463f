//! Integration tests for idrec-identify API endpoints
//!
//! Each test runs the full router against a fresh in-memory database.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot` method
use idrec_identify::{build_router, db, AppState};

/// Test helper: router over an empty in-memory store
async fn setup_app() -> axum::Router {
    let pool = db::connect_in_memory().await.expect("Should open in-memory database");
    build_router(AppState::new(pool))
}

fn identify_request(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/identify")
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

async fn identify(app: &axum::Router, body: Value) -> (StatusCode, Value) {
    let response = app.clone().oneshot(identify_request(&body)).await.unwrap();
    let status = response.status();
    (status, extract_json(response.into_body()).await)
}

// =============================================================================
// Health Endpoint
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app().await;

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "idrec-identify");
    assert!(body["version"].is_string());
}

// =============================================================================
// Identify
// =============================================================================

#[tokio::test]
async fn test_identify_new_contact() {
    let app = setup_app().await;

    let (status, body) = identify(&app, json!({"email": "lorraine@hillvalley.edu", "phone": "123456"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "contact": {
                "primaryContactId": 1,
                "emails": ["lorraine@hillvalley.edu"],
                "phoneNumbers": ["123456"],
                "secondaryContactIds": []
            }
        })
    );
}

#[tokio::test]
async fn test_identify_adds_secondary_for_new_email() {
    let app = setup_app().await;

    identify(&app, json!({"email": "lorraine@hillvalley.edu", "phone": "123456"})).await;
    let (status, body) = identify(&app, json!({"email": "mcfly@hillvalley.edu", "phone": "123456"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["contact"]["primaryContactId"], 1);
    assert_eq!(
        body["contact"]["emails"],
        json!(["lorraine@hillvalley.edu", "mcfly@hillvalley.edu"])
    );
    assert_eq!(body["contact"]["phoneNumbers"], json!(["123456"]));
    assert_eq!(body["contact"]["secondaryContactIds"], json!([2]));
}

#[tokio::test]
async fn test_identify_partial_queries_return_same_person() {
    let app = setup_app().await;

    identify(&app, json!({"email": "lorraine@hillvalley.edu", "phone": "123456"})).await;
    let (_, full) = identify(&app, json!({"email": "mcfly@hillvalley.edu", "phone": "123456"})).await;

    for body in [
        json!({"email": null, "phone": "123456"}),
        json!({"email": "lorraine@hillvalley.edu", "phone": null}),
        json!({"email": "mcfly@hillvalley.edu"}),
    ] {
        let (status, partial) = identify(&app, body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(partial, full);
    }
}

#[tokio::test]
async fn test_identify_merges_two_primaries() {
    let app = setup_app().await;

    identify(&app, json!({"email": "george@hillvalley.edu", "phone": "919191"})).await;
    identify(&app, json!({"email": "biffsucks@hillvalley.edu", "phone": "717171"})).await;

    let (status, body) = identify(&app, json!({"email": "george@hillvalley.edu", "phone": "717171"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "contact": {
                "primaryContactId": 1,
                "emails": ["george@hillvalley.edu", "biffsucks@hillvalley.edu"],
                "phoneNumbers": ["919191", "717171"],
                "secondaryContactIds": [2]
            }
        })
    );
}

#[tokio::test]
async fn test_identify_accepts_phone_number_alias_and_number() {
    let app = setup_app().await;

    identify(&app, json!({"email": "doc@hillvalley.edu", "phoneNumber": 88})).await;
    let (status, body) = identify(&app, json!({"phone": "88"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["contact"]["primaryContactId"], 1);
    assert_eq!(body["contact"]["phoneNumbers"], json!(["88"]));
}

// =============================================================================
// Errors
// =============================================================================

#[tokio::test]
async fn test_identify_rejects_empty_query() {
    let app = setup_app().await;

    for body in [
        json!({}),
        json!({"email": null, "phone": null}),
        json!({"email": "", "phone": "  "}),
    ] {
        let (status, error) = identify(&app, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"]["code"], "VALIDATION_ERROR");
    }
}

#[tokio::test]
async fn test_identify_rejects_malformed_json() {
    let app = setup_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/identify")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_identify_rejects_missing_content_type() {
    let app = setup_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/identify")
        .body(Body::from(r#"{"email": "a@x"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_identify_invariant_violation_is_server_error() {
    let pool = db::connect_in_memory().await.unwrap();
    // Secondary whose primary is missing: a corrupt group
    sqlx::query(
        "INSERT INTO contacts (id, email, link_precedence, created_at, updated_at)
         VALUES (5, 'ghost@x', 'secondary', '2023-04-01T00:00:00Z', '2023-04-01T00:00:00Z')",
    )
    .execute(&pool)
    .await
    .unwrap();
    let app = build_router(AppState::new(pool));

    let (status, body) = identify(&app, json!({"email": "ghost@x"})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "INVARIANT_VIOLATION");
}

#[tokio::test]
async fn test_identify_store_failure_is_server_error() {
    let pool = db::connect_in_memory().await.unwrap();
    let app = build_router(AppState::new(pool.clone()));
    pool.close().await;

    let (status, body) = identify(&app, json!({"email": "a@x"})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "STORE_UNAVAILABLE");
}
