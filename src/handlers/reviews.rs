use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::Extension;
use serde_json::{json, Map, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::Repository;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::models::{Review, Role};
use crate::query::{Condition, QueryTranslator};
use crate::state::AppState;

use super::{created, ok, ok_list, payload_object};

fn repo(state: &AppState) -> Repository<Review> {
    Repository::new(state.pool.clone())
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let spec = QueryTranslator::translate(&params, &state.config.query);
    let rows = repo(&state).find_all(&spec, &[]).await?;
    Ok(ok_list(rows))
}

/// Nested listing: only reviews belonging to the tour in the path
pub async fn list_for_tour(
    State(state): State<AppState>,
    Path(tour_id): Path<Uuid>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let spec = QueryTranslator::translate(&params, &state.config.query);
    let scope = vec![Condition::eq("tour_id", json!(tour_id.to_string()))];
    let rows = repo(&state).find_all(&spec, &scope).await?;
    Ok(ok_list(rows))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let review = repo(&state).find_by_id(id).await?;
    ok(review)
}

pub async fn create(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let payload = payload_object(payload)?;
    create_inner(&state, &user, payload, None).await
}

/// Nested creation: the tour comes from the path, the author from the token
pub async fn create_for_tour(
    State(state): State<AppState>,
    Path(tour_id): Path<Uuid>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let payload = payload_object(payload)?;
    create_inner(&state, &user, payload, Some(tour_id)).await
}

async fn create_inner(
    state: &AppState,
    user: &crate::models::User,
    mut payload: Map<String, Value>,
    tour_id: Option<Uuid>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if let Some(tour_id) = tour_id {
        payload
            .entry("tour_id".to_string())
            .or_insert_with(|| json!(tour_id.to_string()));
    }

    // Reviews are always authored as the requester
    match payload.get("user_id").and_then(Value::as_str) {
        None => {
            payload.insert("user_id".to_string(), json!(user.id.to_string()));
        }
        Some(claimed) if claimed != user.id.to_string() => {
            return Err(ApiError::forbidden(
                "You do not have permission to perform this action",
            ));
        }
        Some(_) => {}
    }

    let review = repo(state).create(&payload).await?;
    recalc_tour_ratings(&state.pool, review.tour_id).await?;
    created(review)
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let payload = payload_object(payload)?;
    let existing = repo(&state).find_by_id(id).await?;
    require_ownership(&existing, &user)?;

    let review = repo(&state).update(id, &payload).await?;
    recalc_tour_ratings(&state.pool, review.tour_id).await?;
    ok(review)
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<StatusCode, ApiError> {
    let existing = repo(&state).find_by_id(id).await?;
    require_ownership(&existing, &user)?;

    repo(&state).delete(id).await?;
    recalc_tour_ratings(&state.pool, existing.tour_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn require_ownership(review: &Review, user: &crate::models::User) -> Result<(), ApiError> {
    if user.role() == Some(Role::Admin) || review.user_id == user.id {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "You do not have permission to perform this action",
        ))
    }
}

/// Recomputes the parent tour's aggregate after any review mutation. With no
/// reviews left the tour falls back to the seeded default rating.
async fn recalc_tour_ratings(pool: &PgPool, tour_id: Uuid) -> Result<(), ApiError> {
    sqlx::query(
        "UPDATE tours SET \
             ratings_quantity = stats.num, \
             ratings_average = stats.avg \
         FROM (SELECT COUNT(*)::int AS num, \
                      coalesce(round(avg(rating)::numeric, 1)::float8, 3.5) AS avg \
               FROM reviews WHERE tour_id = $1) AS stats \
         WHERE tours.id = $1",
    )
    .bind(tour_id)
    .execute(pool)
    .await?;
    Ok(())
}
