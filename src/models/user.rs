use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::Entity;
use crate::validate::{FieldRule, Rule};

/// Authorization roles, stored as text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Admin,
    LeadGuide,
    Guide,
    Client,
}

pub const ROLES: &[&str] = &["admin", "lead-guide", "guide", "client"];

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::LeadGuide => "lead-guide",
            Role::Guide => "guide",
            Role::Client => "client",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "lead-guide" => Some(Role::LeadGuide),
            "guide" => Some(Role::Guide),
            "client" => Some(Role::Client),
            _ => None,
        }
    }
}

/// An account. Credential and soft-delete columns never serialize into API
/// responses; the `active` flag is filtered by an explicit scope condition
/// in the user handlers rather than a hidden query hook.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub role: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub password_changed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub revision: i64,
}

impl User {
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }
}

const RULES: &[FieldRule] = &[
    FieldRule::new("name", Rule::Required),
    FieldRule::new("email", Rule::Required),
    FieldRule::new("email", Rule::Email),
    FieldRule::new("role", Rule::Required),
    FieldRule::new("role", Rule::OneOf(ROLES)),
];

impl Entity for User {
    const TABLE: &'static str = "users";

    const COLUMNS: &'static [&'static str] = &[
        "id", "name", "email", "photo", "role", "active", "created_at", "revision",
    ];

    const NUMERIC: &'static [&'static str] = &["revision"];

    const WRITABLE: &'static [&'static str] = &[
        "name",
        "email",
        "photo",
        "role",
        "password_hash",
        "password_changed_at",
        "password_reset_token",
        "password_reset_expires",
        "active",
    ];

    fn rules() -> &'static [FieldRule] {
        RULES
    }

    // Lists hide the soft-delete flag as well as the revision column
    fn default_projection() -> Vec<&'static str> {
        Self::COLUMNS
            .iter()
            .filter(|c| **c != "revision" && **c != "active")
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate;
    use serde_json::json;

    #[test]
    fn role_round_trips_through_text() {
        for name in ROLES {
            let role = Role::parse(name).unwrap();
            assert_eq!(role.as_str(), *name);
        }
        assert_eq!(Role::parse("superuser"), None);
    }

    #[test]
    fn serialized_user_omits_credentials() {
        let user = User {
            id: Uuid::nil(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            photo: "default.jpg".into(),
            role: "client".into(),
            password_hash: "secret".into(),
            password_changed_at: None,
            password_reset_token: Some("token".into()),
            password_reset_expires: None,
            active: true,
            created_at: Utc::now(),
            revision: 0,
        };

        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password_hash").is_none());
        assert!(value.get("password_reset_token").is_none());
        assert!(value.get("active").is_none());
        assert_eq!(value["email"], "ada@example.com");
    }

    #[test]
    fn rejects_unknown_role_and_bad_email() {
        let payload = json!({
            "name": "Ada",
            "email": "not-an-email",
            "role": "superuser",
        });

        let err = validate(RULES, payload.as_object().unwrap()).unwrap_err();
        let body = err.to_json();
        let fields = body["field_errors"].as_object().unwrap();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("role"));
    }

    #[test]
    fn projection_excludes_soft_delete_flag() {
        let projection = User::default_projection();
        assert!(projection.contains(&"email"));
        assert!(!projection.contains(&"active"));
        assert!(!projection.contains(&"revision"));
    }
}
