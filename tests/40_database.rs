mod common;

use std::collections::HashMap;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Map, Value};
use sqlx::PgPool;
use uuid::Uuid;

use tourkit_api::auth::sign_token;
use tourkit_api::config::AppConfig;
use tourkit_api::database::{pool, Repository};
use tourkit_api::models::User;
use tourkit_api::query::QueryTranslator;

// These tests run against a real, migrated database named by DATABASE_URL.
// They skip themselves when the variable is not set, so the DB-free suite
// stays runnable anywhere.
async fn db() -> Result<Option<PgPool>> {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL not set, skipping database test");
        return Ok(None);
    }
    let config = AppConfig::from_env();
    Ok(Some(pool::connect(&config.database).await?))
}

fn unique_email() -> String {
    format!("{}@example.test", Uuid::new_v4())
}

fn user_payload(email: &str, role: &str) -> Map<String, Value> {
    json!({
        "name": "Fixture User",
        "email": email,
        "role": role,
        "password_hash": "not-a-real-hash",
    })
    .as_object()
    .unwrap()
    .clone()
}

fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn page_past_the_result_count_is_a_404() -> Result<()> {
    let Some(db) = db().await? else { return Ok(()) };
    let config = AppConfig::from_env();
    let repo = Repository::<User>::new(db);

    let email = unique_email();
    let user = repo.create(&user_payload(&email, "client")).await?;

    // Exactly one row matches the email filter, so page 5 is out of range
    let p = params(&[("email", email.as_str()), ("page", "5"), ("limit", "10")]);
    let spec = QueryTranslator::translate(&p, &config.query);
    let err = repo.find_all(&spec, &[]).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
    assert_eq!(err.error_code(), "PAGE_OUT_OF_RANGE");

    // The first page of the same filtered set is fine
    let p = params(&[("email", email.as_str()), ("page", "1")]);
    let spec = QueryTranslator::translate(&p, &config.query);
    let rows = repo.find_all(&spec, &[]).await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["email"], Value::String(email));

    repo.delete(user.id).await?;
    Ok(())
}

#[tokio::test]
async fn repeated_delete_is_a_404() -> Result<()> {
    let Some(db) = db().await? else { return Ok(()) };
    let repo = Repository::<User>::new(db);

    let user = repo.create(&user_payload(&unique_email(), "client")).await?;

    repo.delete(user.id).await?;
    let err = repo.delete(user.id).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
    assert_eq!(err.error_code(), "NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn duplicate_email_is_a_validation_error() -> Result<()> {
    let Some(db) = db().await? else { return Ok(()) };
    let repo = Repository::<User>::new(db);

    let email = unique_email();
    let user = repo.create(&user_payload(&email, "client")).await?;
    let err = repo.create(&user_payload(&email, "client")).await.unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert_eq!(err.error_code(), "VALIDATION_ERROR");

    repo.delete(user.id).await?;
    Ok(())
}

#[tokio::test]
async fn numeric_range_filter_selects_by_value() -> Result<()> {
    let Some(db) = db().await? else { return Ok(()) };
    let config = AppConfig::from_env();
    let repo = Repository::<User>::new(db);

    let user = repo.create(&user_payload(&unique_email(), "client")).await?;

    // revision is numeric, so the comparison binds a number instead of
    // comparing text forms; a fresh row sits at revision 0
    let p = params(&[
        ("email", user.email.as_str()),
        ("revision[lt]", "1"),
    ]);
    let spec = QueryTranslator::translate(&p, &config.query);
    let rows = repo.find_all(&spec, &[]).await?;
    assert_eq!(rows.len(), 1);

    repo.delete(user.id).await?;
    Ok(())
}

#[tokio::test]
async fn review_creation_is_client_only() -> Result<()> {
    let Some(db) = db().await? else { return Ok(()) };
    let config = AppConfig::from_env();
    let repo = Repository::<User>::new(db);

    let admin = repo.create(&user_payload(&unique_email(), "admin")).await?;
    let token = sign_token(admin.id, "admin", &config.security.jwt_secret, 1)?;

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/reviews")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "review": "Authored by staff", "rating": 5 }).to_string(),
        ))?;
    let response = common::send(common::app(), request).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = common::body_json(response).await;
    assert_eq!(body["code"], "FORBIDDEN");

    repo.delete(admin.id).await?;
    Ok(())
}
