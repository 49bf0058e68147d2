pub mod auth;
pub mod bookings;
pub mod reviews;
pub mod tours;
pub mod users;

use axum::http::StatusCode;
use axum::response::Json;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::ApiError;

/// Success envelope shared by every handler
pub fn ok(data: impl Serialize) -> Result<Json<Value>, ApiError> {
    Ok(Json(json!({ "success": true, "data": to_value(data)? })))
}

pub fn ok_list(rows: Vec<Value>) -> Json<Value> {
    Json(json!({ "success": true, "count": rows.len(), "data": rows }))
}

pub fn created(data: impl Serialize) -> Result<(StatusCode, Json<Value>), ApiError> {
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": to_value(data)? })),
    ))
}

/// Emails are stored and looked up lowercased
pub(crate) fn normalize_email(payload: &mut Map<String, Value>) {
    if let Some(email) = payload.get("email").and_then(Value::as_str) {
        let lowered = email.trim().to_lowercase();
        payload.insert("email".to_string(), Value::String(lowered));
    }
}

/// Request bodies must be JSON objects; anything else is a 400
pub fn payload_object(payload: Value) -> Result<Map<String, Value>, ApiError> {
    match payload {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::bad_request("Request body must be a JSON object")),
    }
}

pub(crate) fn to_value(data: impl Serialize) -> Result<Value, ApiError> {
    serde_json::to_value(data).map_err(|e| {
        tracing::error!("Failed to serialize response: {}", e);
        ApiError::internal_server_error("Failed to format response")
    })
}
