use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde_json::{json, Value};
use sqlx::Row;
use uuid::Uuid;

use crate::database::Repository;
use crate::error::ApiError;
use crate::models::tour::{slugify, Tour, TOUR_REVIEWS};
use crate::query::{Condition, QueryTranslator};
use crate::state::AppState;

use super::{created, ok, ok_list, payload_object};

// Mean earth radius, used by the geo endpoints
const EARTH_RADIUS_MI: f64 = 3963.2;
const EARTH_RADIUS_KM: f64 = 6378.1;
const METERS_PER_RADIAN: f64 = 6_371_000.0;

fn repo(state: &AppState) -> Repository<Tour> {
    Repository::new(state.pool.clone())
}

/// Tours flagged secret never appear in list responses
fn public_scope() -> Vec<Condition> {
    vec![Condition::eq("secret", json!("false"))]
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let spec = QueryTranslator::translate(&params, &state.config.query);
    let rows = repo(&state).find_all(&spec, &public_scope()).await?;
    Ok(ok_list(rows))
}

/// Preset list: the five best-rated tours, cheapest first on ties
pub async fn top_five_cheapest(
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let params = HashMap::from([
        ("limit".to_string(), "5".to_string()),
        ("sort".to_string(), "-ratings_average,price".to_string()),
        (
            "fields".to_string(),
            "name,price,ratings_average,summary,difficulty".to_string(),
        ),
    ]);
    let spec = QueryTranslator::translate(&params, &state.config.query);
    let rows = repo(&state).find_all(&spec, &public_scope()).await?;
    Ok(ok_list(rows))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let doc = repo(&state).find_by_id_expanded(id, &TOUR_REVIEWS).await?;
    ok(doc)
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let mut payload = payload_object(payload)?;
    attach_slug(&mut payload);
    let tour = repo(&state).create(&payload).await?;
    created(tour)
}

pub async fn replace(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let mut payload = payload_object(payload)?;
    attach_slug(&mut payload);
    let tour = repo(&state).replace(id, &payload).await?;
    ok(tour)
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let mut payload = payload_object(payload)?;
    attach_slug(&mut payload);
    let tour = repo(&state).update(id, &payload).await?;
    ok(tour)
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    repo(&state).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Aggregate statistics per difficulty over well-rated tours
pub async fn stats(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let sql = "SELECT row_to_json(t) AS doc FROM ( \
               SELECT upper(difficulty) AS difficulty, \
                      COUNT(*) AS num_tours, \
                      SUM(ratings_quantity) AS num_ratings, \
                      round(avg(ratings_average)::numeric, 2)::float8 AS avg_rating, \
                      round(avg(price)::numeric, 2)::float8 AS avg_price, \
                      min(price) AS min_price, \
                      max(price) AS max_price \
               FROM tours \
               WHERE ratings_average >= 4.5 AND secret = false \
               GROUP BY difficulty \
               ORDER BY avg_price) t";

    let rows = sqlx::query(sql).fetch_all(&state.pool).await?;
    collect_docs(rows).map(ok_list)
}

/// How many tours start in each month of the given year, busiest month first
pub async fn monthly_plan(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    let sql = "SELECT row_to_json(t) AS doc FROM ( \
               SELECT extract(month FROM d)::int AS month, \
                      COUNT(*) AS num_tour_starts, \
                      array_agg(name) AS tours \
               FROM tours, unnest(start_dates) AS d \
               WHERE extract(year FROM d)::int = $1 AND secret = false \
               GROUP BY month \
               ORDER BY num_tour_starts DESC, month) t";

    let rows = sqlx::query(sql).bind(year).fetch_all(&state.pool).await?;
    collect_docs(rows).map(ok_list)
}

/// Tours whose start location falls within `distance` of a center point.
/// The central angle between the two points is compared against the search
/// radius expressed in radians.
pub async fn tours_within(
    State(state): State<AppState>,
    Path((distance, latlng, unit)): Path<(f64, String, String)>,
) -> Result<Json<Value>, ApiError> {
    let (lat, lng) = parse_latlng(&latlng)?;
    let radius = distance
        / if unit == "mi" {
            EARTH_RADIUS_MI
        } else {
            EARTH_RADIUS_KM
        };

    let sql = format!(
        "SELECT row_to_json(t) AS doc FROM ( \
         SELECT {projection} FROM tours \
         WHERE secret = false AND start_location IS NOT NULL \
           AND acos(least(1.0, {central_angle})) <= $3 \
         ORDER BY name) t",
        projection = "id, name, price, ratings_average, summary, difficulty, start_location",
        central_angle = central_angle_sql("$1", "$2"),
    );

    let rows = sqlx::query(&sql)
        .bind(lat)
        .bind(lng)
        .bind(radius)
        .fetch_all(&state.pool)
        .await?;
    collect_docs(rows).map(ok_list)
}

/// Distance from a point to every tour's start location, nearest first
pub async fn distances(
    State(state): State<AppState>,
    Path((latlng, unit)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let (lat, lng) = parse_latlng(&latlng)?;
    let multiplier = if unit == "mi" { 0.000_621_371 } else { 0.001 };

    let sql = format!(
        "SELECT row_to_json(t) AS doc FROM ( \
         SELECT id, name, \
                acos(least(1.0, {central_angle})) * $3 AS distance \
         FROM tours \
         WHERE secret = false AND start_location IS NOT NULL \
         ORDER BY distance) t",
        central_angle = central_angle_sql("$1", "$2"),
    );

    let rows = sqlx::query(&sql)
        .bind(lat)
        .bind(lng)
        .bind(METERS_PER_RADIAN * multiplier)
        .fetch_all(&state.pool)
        .await?;
    collect_docs(rows).map(ok_list)
}

/// Spherical law of cosines between ($lat, $lng) placeholders and the tour's
/// start location, whose GeoJSON coordinates are [longitude, latitude]
fn central_angle_sql(lat_param: &str, lng_param: &str) -> String {
    format!(
        "sin(radians({lat})) * sin(radians((start_location->'coordinates'->>1)::float8)) \
         + cos(radians({lat})) * cos(radians((start_location->'coordinates'->>1)::float8)) \
         * cos(radians((start_location->'coordinates'->>0)::float8) - radians({lng}))",
        lat = lat_param,
        lng = lng_param,
    )
}

fn parse_latlng(latlng: &str) -> Result<(f64, f64), ApiError> {
    let invalid = || {
        ApiError::bad_request("Please provide latitude and longitude in the format lat,lng")
    };

    let (lat, lng) = latlng.split_once(',').ok_or_else(invalid)?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(invalid());
    }
    Ok((lat, lng))
}

fn attach_slug(payload: &mut serde_json::Map<String, Value>) {
    if let Some(name) = payload.get("name").and_then(Value::as_str) {
        let slug = slugify(name);
        payload.insert("slug".to_string(), json!(slug));
    }
}

fn collect_docs(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<Value>, ApiError> {
    rows.iter()
        .map(|row| row.try_get::<Value, _>("doc").map_err(ApiError::from))
        .collect()
}
