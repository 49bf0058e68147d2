use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::Entity;
use crate::validate::{FieldRule, Rule};

/// A purchased tour. `price` captures the amount at checkout time so later
/// price changes on the tour do not rewrite booking history.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub tour_id: Uuid,
    pub user_id: Uuid,
    pub price: f64,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
    pub revision: i64,
}

const RULES: &[FieldRule] = &[
    FieldRule::new("tour_id", Rule::Required),
    FieldRule::new("user_id", Rule::Required),
    FieldRule::new("price", Rule::Required),
    FieldRule::new("price", Rule::Min(0.0)),
];

impl Entity for Booking {
    const TABLE: &'static str = "bookings";

    const COLUMNS: &'static [&'static str] = &[
        "id", "tour_id", "user_id", "price", "paid", "created_at", "revision",
    ];

    const NUMERIC: &'static [&'static str] = &["price", "revision"];

    const WRITABLE: &'static [&'static str] = &["tour_id", "user_id", "price", "paid"];

    fn rules() -> &'static [FieldRule] {
        RULES
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate;
    use serde_json::json;

    #[test]
    fn requires_both_sides_of_the_booking() {
        let doc = json!({ "price": 497.0 });
        let err = validate(RULES, doc.as_object().unwrap()).unwrap_err();
        let body = err.to_json();
        assert_eq!(body["field_errors"]["tour_id"], "This field is required");
        assert_eq!(body["field_errors"]["user_id"], "This field is required");
    }

    #[test]
    fn rejects_negative_price() {
        let doc = json!({
            "tour_id": "2b7f2f9e-0000-0000-0000-000000000001",
            "user_id": "2b7f2f9e-0000-0000-0000-000000000002",
            "price": -1,
        });
        assert!(validate(RULES, doc.as_object().unwrap()).is_err());
    }
}
