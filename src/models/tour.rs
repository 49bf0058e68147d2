use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::{Entity, Expand};
use crate::validate::{FieldRule, Rule};

/// A bookable tour. `start_location` and `locations` carry GeoJSON-shaped
/// documents; `guides` references users.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tour {
    pub id: Uuid,
    pub name: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: String,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Vec<String>,
    pub start_dates: Vec<DateTime<Utc>>,
    pub start_location: Option<Value>,
    pub locations: Option<Value>,
    pub guides: Vec<Uuid>,
    pub slug: Option<String>,
    pub secret: bool,
    pub created_at: DateTime<Utc>,
    pub revision: i64,
}

pub const DIFFICULTIES: &[&str] = &["easy", "medium", "difficult"];

/// Related reviews embedded into a single-tour read
pub const TOUR_REVIEWS: Expand = Expand {
    table: "reviews",
    foreign_key: "tour_id",
    columns: &["id", "review", "rating", "user_id", "created_at"],
};

const RULES: &[FieldRule] = &[
    FieldRule::new("name", Rule::Required),
    FieldRule::new("name", Rule::MinLen(10)),
    FieldRule::new("name", Rule::MaxLen(40)),
    FieldRule::new("duration", Rule::Required),
    FieldRule::new("duration", Rule::Min(1.0)),
    FieldRule::new("max_group_size", Rule::Required),
    FieldRule::new("max_group_size", Rule::Min(1.0)),
    FieldRule::new("difficulty", Rule::Required),
    FieldRule::new("difficulty", Rule::OneOf(DIFFICULTIES)),
    FieldRule::new("ratings_average", Rule::Min(0.0)),
    FieldRule::new("ratings_average", Rule::Max(5.0)),
    FieldRule::new("price", Rule::Required),
    FieldRule::new("price", Rule::Min(0.0)),
    FieldRule::new(
        "price_discount",
        Rule::Custom {
            check: discount_below_price,
            message: "Price discount must be lower than the price",
        },
    ),
    FieldRule::new("summary", Rule::Required),
    FieldRule::new("start_dates", Rule::Required),
];

fn discount_below_price(value: &Value, doc: &Map<String, Value>) -> bool {
    match (value.as_f64(), doc.get("price").and_then(Value::as_f64)) {
        (Some(discount), Some(price)) => discount < price,
        _ => false,
    }
}

impl Entity for Tour {
    const TABLE: &'static str = "tours";

    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "duration",
        "max_group_size",
        "difficulty",
        "ratings_average",
        "ratings_quantity",
        "price",
        "price_discount",
        "summary",
        "description",
        "image_cover",
        "images",
        "start_dates",
        "start_location",
        "locations",
        "guides",
        "slug",
        "secret",
        "created_at",
        "revision",
    ];

    const NUMERIC: &'static [&'static str] = &[
        "duration",
        "max_group_size",
        "ratings_average",
        "ratings_quantity",
        "price",
        "price_discount",
        "revision",
    ];

    const WRITABLE: &'static [&'static str] = &[
        "name",
        "duration",
        "max_group_size",
        "difficulty",
        "ratings_average",
        "ratings_quantity",
        "price",
        "price_discount",
        "summary",
        "description",
        "image_cover",
        "images",
        "start_dates",
        "start_location",
        "locations",
        "guides",
        "slug",
        "secret",
    ];

    fn rules() -> &'static [FieldRule] {
        RULES
    }
}

/// URL-safe slug derived from the tour name
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}
