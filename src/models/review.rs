use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::Entity;
use crate::validate::{FieldRule, Rule};

/// A rating and text left on a tour. One review per user per tour, enforced
/// by a unique index on (tour_id, user_id).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub review: String,
    pub rating: f64,
    pub tour_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub revision: i64,
}

const RULES: &[FieldRule] = &[
    FieldRule::new("review", Rule::Required),
    FieldRule::new("rating", Rule::Required),
    FieldRule::new("rating", Rule::Min(1.0)),
    FieldRule::new("rating", Rule::Max(5.0)),
    FieldRule::new("tour_id", Rule::Required),
    FieldRule::new("user_id", Rule::Required),
];

impl Entity for Review {
    const TABLE: &'static str = "reviews";

    const COLUMNS: &'static [&'static str] = &[
        "id", "review", "rating", "tour_id", "user_id", "created_at", "revision",
    ];

    const NUMERIC: &'static [&'static str] = &["rating", "revision"];

    const WRITABLE: &'static [&'static str] = &["review", "rating", "tour_id", "user_id"];

    fn rules() -> &'static [FieldRule] {
        RULES
    }
}
