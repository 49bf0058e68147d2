use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde_json::json;

use crate::auth::verify_token;
use crate::database::Repository;
use crate::error::ApiError;
use crate::models::{Role, User};
use crate::query::Condition;
use crate::state::AppState;

/// The authenticated account, loaded fresh from storage per request so role
/// changes and deactivation take effect immediately.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

/// Authentication middleware. Verifies the bearer token, reloads the
/// account, and rejects tokens minted before the last password change.
pub async fn protect(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&headers).map_err(ApiError::unauthorized)?;
    let claims = verify_token(&token, &state.config.security.jwt_secret)?;

    let users = Repository::<User>::new(state.pool.clone());
    let user = users
        .try_find_one(&[
            Condition::eq("id", json!(claims.sub.to_string())),
            Condition::eq("active", json!("true")),
        ])
        .await?
        .ok_or_else(|| {
            ApiError::unauthorized("The user belonging to this token no longer exists")
        })?;

    if let Some(changed_at) = user.password_changed_at {
        if changed_at.timestamp() > claims.iat {
            return Err(ApiError::unauthorized(
                "Password was changed after this token was issued. Please log in again",
            ));
        }
    }

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// Role gate, layered inside `protect`. Used through `from_fn` closures:
/// `from_fn(|req, next| restrict_to(&[Role::Admin], req, next))`.
pub async fn restrict_to(
    allowed: &'static [Role],
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let current = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| ApiError::unauthorized("You are not logged in"))?;

    let role = current
        .0
        .role()
        .filter(|role| allowed.contains(role))
        .ok_or_else(|| {
            ApiError::forbidden("You do not have permission to perform this action")
        })?;

    tracing::debug!(role = role.as_str(), "role gate passed");
    Ok(next.run(request).await)
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, String> {
    let header = headers
        .get("authorization")
        .ok_or_else(|| "You are not logged in. Please log in to get access".to_string())?;

    let value = header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.to_string()),
        Some(_) => Err("Empty bearer token".to_string()),
        None => Err("Authorization header must use Bearer token format".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert!(extract_bearer_token(&headers).is_err());

        headers.insert("authorization", "Token abc".parse().unwrap());
        assert!(extract_bearer_token(&headers).is_err());

        headers.insert("authorization", "Bearer ".parse().unwrap());
        assert!(extract_bearer_token(&headers).is_err());

        headers.insert("authorization", "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers).unwrap(), "abc.def.ghi");
    }
}
