use axum::http::header::HeaderValue;
use axum::http::Uri;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::Json;
use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::handlers::{auth, bookings, reviews, tours, users};
use crate::middleware::{protect, restrict_to};
use crate::models::Role;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(tour_routes(&state))
        .merge(user_routes(&state))
        .merge(review_routes(&state))
        .merge(booking_routes(&state))
        .fallback(unknown_route)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn tour_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/api/v1/tours", get(tours::list))
        .route("/api/v1/tours/top-5-cheapest", get(tours::top_five_cheapest))
        .route("/api/v1/tours/stats", get(tours::stats))
        .route(
            "/api/v1/tours/tours-within/:distance/center/:latlng/unit/:unit",
            get(tours::tours_within),
        )
        .route("/api/v1/tours/distances/:latlng/unit/:unit", get(tours::distances))
        .route("/api/v1/tours/:id", get(tours::get));

    // Planning data is for staff; the supporting guides included
    let planning = Router::new()
        .route("/api/v1/tours/monthly-plan/:year", get(tours::monthly_plan))
        .route_layer(from_fn(|req, next| {
            restrict_to(&[Role::Admin, Role::LeadGuide, Role::Guide], req, next)
        }))
        .route_layer(from_fn_with_state(state.clone(), protect));

    let editing = Router::new()
        .route("/api/v1/tours", post(tours::create))
        .route(
            "/api/v1/tours/:id",
            put(tours::replace)
                .patch(tours::update)
                .delete(tours::delete),
        )
        .route_layer(from_fn(|req, next| {
            restrict_to(&[Role::Admin, Role::LeadGuide], req, next)
        }))
        .route_layer(from_fn_with_state(state.clone(), protect));

    public.merge(planning).merge(editing)
}

fn user_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/api/v1/users/signup", post(auth::signup))
        .route("/api/v1/users/login", post(auth::login))
        .route("/api/v1/users/logout", get(auth::logout))
        .route("/api/v1/users/forgot-password", post(auth::forgot_password))
        .route(
            "/api/v1/users/reset-password/:token",
            patch(auth::reset_password),
        );

    let account = Router::new()
        .route("/api/v1/users/update-password", patch(auth::update_password))
        .route("/api/v1/users/me", get(users::me))
        .route("/api/v1/users/update-me", patch(users::update_me))
        .route("/api/v1/users/delete-me", delete(users::delete_me))
        .route_layer(from_fn_with_state(state.clone(), protect));

    let admin = Router::new()
        .route("/api/v1/users", get(users::list).post(users::create))
        .route(
            "/api/v1/users/:id",
            get(users::get).patch(users::update).delete(users::delete),
        )
        .route_layer(from_fn(|req, next| restrict_to(&[Role::Admin], req, next)))
        .route_layer(from_fn_with_state(state.clone(), protect));

    public.merge(account).merge(admin)
}

fn review_routes(state: &AppState) -> Router<AppState> {
    // Only clients write reviews; staff rate nothing they operate
    let client_write = Router::new()
        .route("/api/v1/reviews", post(reviews::create))
        .route("/api/v1/tours/:id/reviews", post(reviews::create_for_tour))
        .route_layer(from_fn(|req, next| restrict_to(&[Role::Client], req, next)));

    // Ownership of updates and deletes is enforced in the handlers, where
    // the stored review's author is known
    let rest = Router::new()
        .route("/api/v1/reviews", get(reviews::list))
        .route("/api/v1/tours/:id/reviews", get(reviews::list_for_tour))
        .route(
            "/api/v1/reviews/:id",
            get(reviews::get)
                .patch(reviews::update)
                .delete(reviews::delete),
        );

    client_write
        .merge(rest)
        .route_layer(from_fn_with_state(state.clone(), protect))
}

fn booking_routes(state: &AppState) -> Router<AppState> {
    // Shared-secret header auth, see the handler
    let webhook = Router::new().route(
        "/api/v1/bookings/checkout-completed",
        post(bookings::checkout_completed),
    );

    let session = Router::new()
        .route(
            "/api/v1/bookings/checkout-session/:id",
            get(bookings::checkout_session),
        )
        .route_layer(from_fn_with_state(state.clone(), protect));

    let admin = Router::new()
        .route("/api/v1/bookings", get(bookings::list).post(bookings::create))
        .route(
            "/api/v1/bookings/:id",
            get(bookings::get)
                .patch(bookings::update)
                .delete(bookings::delete),
        )
        .route_layer(from_fn(|req, next| {
            restrict_to(&[Role::Admin, Role::LeadGuide], req, next)
        }))
        .route_layer(from_fn_with_state(state.clone(), protect));

    webhook.merge(session).merge(admin)
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let origins = &state.config.security.cors_origins;
    if origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(parsed)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Tour booking REST API",
        }
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "success": true, "data": { "status": "ok" } }))
}

async fn unknown_route(uri: Uri) -> ApiError {
    ApiError::not_found(format!("Can't find {} on this server", uri.path()))
}
