// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error envelope tests: user errors carry a message, system errors only a
//! reference.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::IntoResponse,
};
use groupplan::error::AppError;
use tower::ServiceExt;

mod common;

#[test]
fn test_user_error_classes() {
    assert!(AppError::Unauthenticated.is_user_error());
    assert!(AppError::Unauthorized("no".to_string()).is_user_error());
    assert!(AppError::NotFound("gone".to_string()).is_user_error());
    assert!(AppError::BadRequest("bad".to_string()).is_user_error());
    assert!(AppError::Validation("invalid".to_string()).is_user_error());
    assert!(AppError::Conflict("overlap".to_string()).is_user_error());

    assert!(!AppError::Database("locked".to_string()).is_user_error());
    assert!(!AppError::Internal(anyhow::anyhow!("boom")).is_user_error());
}

#[tokio::test]
async fn test_unauthenticated_envelope() {
    let response = AppError::Unauthenticated.into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = common::body_json(response).await;
    assert_eq!(body, serde_json::json!({ "error": "Please log in" }));
}

#[tokio::test]
async fn test_internal_error_envelope_has_only_reference() {
    let response = AppError::Internal(anyhow::anyhow!("secret detail")).into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = common::body_json(response).await;
    let object = body.as_object().unwrap();
    assert_eq!(object.len(), 1);
    assert!(!body.to_string().contains("secret detail"));
    assert!(uuid::Uuid::parse_str(body["error_reference"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn test_malformed_json_is_validation_error() {
    let (app, state) = common::create_test_app().await;
    let (_, token) = common::login(&state, "alice@example.com", "Alice").await;

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/plans")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"title\": "))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = common::body_json(response).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_missing_field_is_validation_error() {
    let (app, state) = common::create_test_app().await;
    let (_, token) = common::login(&state, "alice@example.com", "Alice").await;

    let response = app
        .oneshot(common::json_request(
            "PUT",
            "/plans",
            &token,
            serde_json::json!({ "title": "Offsite" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
