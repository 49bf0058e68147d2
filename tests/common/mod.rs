use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use tourkit_api::config::AppConfig;
use tourkit_api::database::pool;
use tourkit_api::payments::{CheckoutRequest, CheckoutSession, PaymentError, PaymentProvider};
use tourkit_api::routes;
use tourkit_api::state::AppState;

/// Never talks to a real provider; echoes the tour back as a session id
pub struct StubPayments;

#[async_trait]
impl PaymentProvider for StubPayments {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        Ok(CheckoutSession {
            id: format!("sess_{}", request.tour_id),
            url: "https://checkout.test/session".to_string(),
        })
    }
}

/// Builds the full router over a lazy pool, so tests exercising routing,
/// auth guards and input validation run without a database.
pub fn app() -> Router {
    let config = AppConfig::from_env();
    let db = pool::connect_lazy(&config.database).expect("lazy pool");
    let state = AppState::new(db, config, Arc::new(StubPayments));
    routes::app(state)
}

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.expect("request")
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

pub fn get(path: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .body(Body::empty())
        .expect("request")
}

pub fn json_request(method: &str, path: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}
