use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use axum::Extension;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::database::Repository;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::models::{Booking, Tour};
use crate::payments::CheckoutRequest;
use crate::query::QueryTranslator;
use crate::state::AppState;

use super::{created, ok, ok_list, payload_object};

fn repo(state: &AppState) -> Repository<Booking> {
    Repository::new(state.pool.clone())
}

/// Opens a hosted checkout session for the given tour. The booking itself
/// is only written once the provider confirms payment on the webhook.
pub async fn checkout_session(
    State(state): State<AppState>,
    Path(tour_id): Path<Uuid>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    let tour = Repository::<Tour>::new(state.pool.clone())
        .find_by_id(tour_id)
        .await?;

    let payments = &state.config.payments;
    let session = state
        .payments
        .create_checkout_session(CheckoutRequest {
            tour_id: tour.id,
            user_id: user.id,
            tour_name: tour.name.clone(),
            tour_summary: tour.summary.clone(),
            amount: tour.price,
            currency: payments.currency.clone(),
            customer_email: user.email.clone(),
            success_url: payments.success_url.clone(),
            cancel_url: payments.cancel_url.clone(),
        })
        .await?;

    ok(json!({ "session": session }))
}

/// Provider webhook. Authenticated by a shared secret header rather than a
/// bearer token since the caller is the payment provider, not a user.
pub async fn checkout_completed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let presented = headers
        .get("x-checkout-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if presented.is_empty() || presented != state.config.payments.webhook_secret {
        return Err(ApiError::unauthorized("Invalid webhook token"));
    }

    let payload = payload_object(payload)?;
    let mut doc = Map::new();
    for key in ["tour_id", "user_id", "price"] {
        if let Some(value) = payload.get(key) {
            doc.insert(key.to_string(), value.clone());
        }
    }
    doc.insert("paid".to_string(), json!(true));

    let booking = repo(&state).create(&doc).await?;
    created(booking)
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let spec = QueryTranslator::translate(&params, &state.config.query);
    let rows = repo(&state).find_all(&spec, &[]).await?;
    Ok(ok_list(rows))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let booking = repo(&state).find_by_id(id).await?;
    ok(booking)
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let payload = payload_object(payload)?;
    let booking = repo(&state).create(&payload).await?;
    created(booking)
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let payload = payload_object(payload)?;
    let booking = repo(&state).update(id, &payload).await?;
    ok(booking)
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    repo(&state).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
