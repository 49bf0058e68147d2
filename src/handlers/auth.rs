use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::Extension;
use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

use crate::auth::{
    generate_reset_token, hash_password, sha256_hex, sign_token, verify_password,
};
use crate::database::Repository;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::models::User;
use crate::query::Condition;
use crate::state::AppState;
use crate::validate::strong_password;

use super::{normalize_email, payload_object, to_value};

const RESET_TOKEN_TTL_MINUTES: i64 = 10;

fn repo(state: &AppState) -> Repository<User> {
    Repository::new(state.pool.clone())
}

pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let mut payload = payload_object(payload)?;
    normalize_email(&mut payload);
    let password = validated_password(&payload)?;
    let hash = hash_on_worker(password).await?;

    // Only profile fields pass through; the role is never client-assignable
    // at signup and privilege changes go through the admin routes.
    let mut doc = Map::new();
    for key in ["name", "email", "photo"] {
        if let Some(value) = payload.get(key) {
            doc.insert(key.to_string(), value.clone());
        }
    }
    doc.insert("role".to_string(), json!("client"));
    doc.insert("password_hash".to_string(), json!(hash));

    let user = repo(&state).create(&doc).await?;
    let response = token_response(&state, &user)?;
    Ok((StatusCode::CREATED, response))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let payload = payload_object(payload)?;
    let (email, password) = match (
        payload.get("email").and_then(Value::as_str),
        payload.get("password").and_then(Value::as_str),
    ) {
        (Some(email), Some(password)) => (email, password),
        _ => return Err(ApiError::bad_request("Please provide email and password")),
    };

    let user = repo(&state)
        .try_find_one(&[
            Condition::eq("email", json!(email.trim().to_lowercase())),
            Condition::eq("active", json!("true")),
        ])
        .await?
        .ok_or_else(|| ApiError::unauthorized("Incorrect email or password"))?;

    if !verify_on_worker(password.to_string(), user.password_hash.clone()).await? {
        return Err(ApiError::unauthorized("Incorrect email or password"));
    }

    token_response(&state, &user)
}

/// Stateless tokens cannot be revoked server side; this exists so clients
/// have a uniform endpoint to clear their stored credential against
pub async fn logout() -> Json<Value> {
    Json(json!({ "success": true, "token": Value::Null }))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let payload = payload_object(payload)?;
    let email = payload
        .get("email")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_request("Please provide an email address"))?;

    let user = repo(&state)
        .try_find_one(&[
            Condition::eq("email", json!(email.trim().to_lowercase())),
            Condition::eq("active", json!("true")),
        ])
        .await?
        .ok_or_else(|| ApiError::not_found("There is no user with that email address"))?;

    let (plain, hashed) = generate_reset_token();
    let expires = Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES);

    let mut patch = Map::new();
    patch.insert("password_reset_token".to_string(), json!(hashed));
    patch.insert(
        "password_reset_expires".to_string(),
        json!(expires.to_rfc3339()),
    );
    repo(&state).update(user.id, &patch).await?;

    // Without a mail transport the plain token is only ever exposed in
    // development; production deployments deliver it out of band.
    let mut response = json!({
        "success": true,
        "message": "Reset token generated. It is valid for 10 minutes",
    });
    if state.config.security.expose_reset_tokens {
        response["data"] = json!({ "reset_token": plain });
    }
    Ok(Json(response))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let payload = payload_object(payload)?;
    let password = validated_password(&payload)?;

    // Only the digest is stored, so the lookup hashes the presented token
    let hashed = sha256_hex(&token);
    let user = sqlx::query_as::<_, User>(
        "SELECT * FROM users \
         WHERE password_reset_token = $1 AND password_reset_expires > now() AND active = true",
    )
    .bind(&hashed)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::bad_request("Token is invalid or has expired"))?;

    let hash = hash_on_worker(password).await?;
    let user = apply_password_change(&state, user.id, hash).await?;
    token_response(&state, &user)
}

pub async fn update_password(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let payload = payload_object(payload)?;
    let current = payload
        .get("password_current")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_request("Please provide your current password"))?;

    if !verify_on_worker(current.to_string(), user.password_hash.clone()).await? {
        return Err(ApiError::unauthorized("Your current password is wrong"));
    }

    let password = validated_password(&payload)?;
    let hash = hash_on_worker(password).await?;
    let user = apply_password_change(&state, user.id, hash).await?;
    token_response(&state, &user)
}

/// Writes the new hash and stamps `password_changed_at` so outstanding
/// tokens stop verifying in the auth middleware
async fn apply_password_change(
    state: &AppState,
    user_id: uuid::Uuid,
    hash: String,
) -> Result<User, ApiError> {
    let mut patch = Map::new();
    patch.insert("password_hash".to_string(), json!(hash));
    patch.insert(
        "password_changed_at".to_string(),
        json!(Utc::now().to_rfc3339()),
    );
    patch.insert("password_reset_token".to_string(), Value::Null);
    patch.insert("password_reset_expires".to_string(), Value::Null);
    repo(state).update(user_id, &patch).await
}

/// Requires `password` and a matching `password_confirm`, and applies the
/// same strength policy the fixtures are seeded with
fn validated_password(payload: &Map<String, Value>) -> Result<String, ApiError> {
    let password = payload
        .get("password")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_request("Please provide a password"))?;
    let confirm = payload.get("password_confirm").and_then(Value::as_str);

    if confirm != Some(password) {
        return Err(ApiError::bad_request("Passwords do not match"));
    }
    if !strong_password(&json!(password), payload) {
        return Err(ApiError::validation_error(
            "Invalid document",
            Some(std::collections::HashMap::from([(
                "password".to_string(),
                "Must be 8 to 15 characters and mix upper case, lower case and a symbol"
                    .to_string(),
            )])),
        ));
    }
    Ok(password.to_string())
}

fn token_response(state: &AppState, user: &User) -> Result<Json<Value>, ApiError> {
    let token = sign_token(
        user.id,
        &user.role,
        &state.config.security.jwt_secret,
        state.config.security.jwt_expiry_hours as i64,
    )?;
    Ok(Json(json!({
        "success": true,
        "token": token,
        "data": to_value(user)?,
    })))
}

async fn hash_on_worker(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| {
            tracing::error!("Password hashing task failed: {}", e);
            ApiError::internal_server_error("Could not process password")
        })?
}

async fn verify_on_worker(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| {
            tracing::error!("Password verification task failed: {}", e);
            ApiError::internal_server_error("Could not process password")
        })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_pair_must_match_and_be_strong() {
        let payload = |p: &str, c: &str| {
            let mut map = Map::new();
            map.insert("password".into(), json!(p));
            map.insert("password_confirm".into(), json!(c));
            map
        };

        assert!(validated_password(&payload("Pass123!x", "Pass123!x")).is_ok());
        assert!(validated_password(&payload("Pass123!x", "other")).is_err());
        assert!(validated_password(&payload("weak", "weak")).is_err());
        assert!(validated_password(&Map::new()).is_err());
    }
}
