mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;

fn get_with_auth(path: &str, header: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .header("authorization", header)
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn protected_route_requires_a_token() {
    let response = common::send(common::app(), common::get("/api/v1/users/me")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = common::body_json(response).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert!(body["message"].as_str().unwrap().contains("log in"));
}

#[tokio::test]
async fn non_bearer_authorization_is_rejected() {
    let response = common::send(
        common::app(),
        get_with_auth("/api/v1/users/me", "Basic dXNlcjpwYXNz"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn garbage_bearer_token_is_rejected() {
    let response = common::send(
        common::app(),
        get_with_auth("/api/v1/users/me", "Bearer not.a.token"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = common::body_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Invalid or expired token"));
}

#[tokio::test]
async fn token_signed_with_wrong_secret_is_rejected() {
    let token = tourkit_api::auth::sign_token(
        uuid::Uuid::new_v4(),
        "admin",
        "not-the-server-secret",
        24,
    )
    .expect("token");

    let response = common::send(
        common::app(),
        get_with_auth("/api/v1/users/me", &format!("Bearer {}", token)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_are_guarded_before_any_query_runs() {
    let response = common::send(common::app(), common::get("/api/v1/users")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_requires_both_credentials() {
    let response = common::send(
        common::app(),
        common::json_request("POST", "/api/v1/users/login", json!({ "email": "a@b.c" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = common::body_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("email and password"));
}

#[tokio::test]
async fn signup_rejects_weak_passwords() {
    let response = common::send(
        common::app(),
        common::json_request(
            "POST",
            "/api/v1/users/signup",
            json!({
                "name": "Ada",
                "email": "ada@example.com",
                "password": "weak",
                "password_confirm": "weak",
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = common::body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["field_errors"]["password"].is_string());
}

#[tokio::test]
async fn signup_rejects_mismatched_confirmation() {
    let response = common::send(
        common::app(),
        common::json_request(
            "POST",
            "/api/v1/users/signup",
            json!({
                "name": "Ada",
                "email": "ada@example.com",
                "password": "Pass123!x",
                "password_confirm": "Other123!x",
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = common::body_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("do not match"));
}

#[tokio::test]
async fn reset_password_validates_strength_before_lookup() {
    let response = common::send(
        common::app(),
        common::json_request(
            "PATCH",
            "/api/v1/users/reset-password/abc123",
            json!({ "password": "weak", "password_confirm": "weak" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
