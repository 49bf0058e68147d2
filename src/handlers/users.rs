use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::Extension;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::database::Repository;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::models::User;
use crate::query::{Condition, QueryTranslator};
use crate::state::AppState;

use super::{normalize_email, ok, ok_list, payload_object};

fn repo(state: &AppState) -> Repository<User> {
    Repository::new(state.pool.clone())
}

/// Deactivated accounts stay in storage but never surface through the API
fn active_scope() -> Vec<Condition> {
    vec![Condition::eq("active", json!("true"))]
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let spec = QueryTranslator::translate(&params, &state.config.query);
    let rows = repo(&state).find_all(&spec, &active_scope()).await?;
    Ok(ok_list(rows))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let mut conditions = active_scope();
    conditions.push(Condition::eq("id", json!(id.to_string())));
    let user = repo(&state).find_one(&conditions).await?;
    ok(user)
}

/// Accounts are only created through signup, where passwords are set
pub async fn create() -> Result<Json<Value>, ApiError> {
    Err(ApiError::bad_request(
        "This route is not defined. Please use /signup instead",
    ))
}

/// Admin profile edit. PATCH only: a full replace would clear credential
/// columns, and passwords are never set through this route.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let mut payload = payload_object(payload)?;
    reject_password_fields(&payload)?;
    normalize_email(&mut payload);
    let user = repo(&state).update(id, &payload).await?;
    ok(user)
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    repo(&state).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    ok(user)
}

/// Profile self-service. Only name, email and photo pass through; password
/// changes have their own endpoint so they always restamp
/// `password_changed_at`.
pub async fn update_me(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let payload = payload_object(payload)?;
    reject_password_fields(&payload)?;

    let mut patch = Map::new();
    for key in ["name", "email", "photo"] {
        if let Some(value) = payload.get(key) {
            patch.insert(key.to_string(), value.clone());
        }
    }
    normalize_email(&mut patch);

    let user = repo(&state).update(user.id, &patch).await?;
    ok(user)
}

/// Soft delete: flips `active` off so the account disappears from every
/// read while bookings and reviews keep their author
pub async fn delete_me(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<StatusCode, ApiError> {
    let mut patch = Map::new();
    patch.insert("active".to_string(), json!(false));
    repo(&state).update(user.id, &patch).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn reject_password_fields(payload: &Map<String, Value>) -> Result<(), ApiError> {
    if payload.contains_key("password")
        || payload.contains_key("password_confirm")
        || payload.contains_key("password_hash")
    {
        return Err(ApiError::bad_request(
            "This route is not for password updates. Please use /update-password",
        ));
    }
    Ok(())
}
