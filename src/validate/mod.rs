use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::ApiError;

/// One declarative constraint on a document field. Entities expose a static
/// rule table which a single generic interpreter applies on create, replace
/// and (against the merged document) on patch.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub field: &'static str,
    pub rule: Rule,
}

#[derive(Debug, Clone)]
pub enum Rule {
    Required,
    MinLen(usize),
    MaxLen(usize),
    Min(f64),
    Max(f64),
    OneOf(&'static [&'static str]),
    Email,
    /// Cross-field or bespoke checks; receives the whole document
    Custom {
        check: fn(&Value, &Map<String, Value>) -> bool,
        message: &'static str,
    },
}

impl FieldRule {
    pub const fn new(field: &'static str, rule: Rule) -> Self {
        Self { field, rule }
    }
}

/// Applies every rule to the document. Rules other than `Required` are
/// skipped when the field is absent or null, so optional fields only get
/// checked once a value is supplied. All violations are collected into one
/// 400 response.
pub fn validate(rules: &[FieldRule], doc: &Map<String, Value>) -> Result<(), ApiError> {
    let mut field_errors: HashMap<String, String> = HashMap::new();

    for rule in rules {
        let value = doc.get(rule.field).filter(|v| !v.is_null());

        match (&rule.rule, value) {
            (Rule::Required, None) => {
                field_errors
                    .entry(rule.field.to_string())
                    .or_insert_with(|| "This field is required".to_string());
            }
            (Rule::Required, Some(Value::String(s))) if s.trim().is_empty() => {
                field_errors
                    .entry(rule.field.to_string())
                    .or_insert_with(|| "This field is required".to_string());
            }
            (_, None) => {}
            (Rule::Required, Some(_)) => {}
            (Rule::MinLen(min), Some(v)) => {
                if v.as_str().map(|s| s.chars().count() < *min).unwrap_or(true) {
                    field_errors.insert(
                        rule.field.to_string(),
                        format!("Must have at least {} characters", min),
                    );
                }
            }
            (Rule::MaxLen(max), Some(v)) => {
                if v.as_str().map(|s| s.chars().count() > *max).unwrap_or(true) {
                    field_errors.insert(
                        rule.field.to_string(),
                        format!("Must have at most {} characters", max),
                    );
                }
            }
            (Rule::Min(min), Some(v)) => {
                if v.as_f64().map(|n| n < *min).unwrap_or(true) {
                    field_errors.insert(
                        rule.field.to_string(),
                        format!("Must be at least {}", min),
                    );
                }
            }
            (Rule::Max(max), Some(v)) => {
                if v.as_f64().map(|n| n > *max).unwrap_or(true) {
                    field_errors.insert(
                        rule.field.to_string(),
                        format!("Must be at most {}", max),
                    );
                }
            }
            (Rule::OneOf(options), Some(v)) => {
                if v.as_str().map(|s| !options.contains(&s)).unwrap_or(true) {
                    field_errors.insert(
                        rule.field.to_string(),
                        format!("Must be one of: {}", options.join(", ")),
                    );
                }
            }
            (Rule::Email, Some(v)) => {
                if v.as_str().map(|s| !looks_like_email(s)).unwrap_or(true) {
                    field_errors.insert(
                        rule.field.to_string(),
                        "Please provide a valid email".to_string(),
                    );
                }
            }
            (Rule::Custom { check, message }, Some(v)) => {
                if !check(v, doc) {
                    field_errors.insert(rule.field.to_string(), message.to_string());
                }
            }
        }
    }

    if field_errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation_error(
            "Invalid document",
            Some(field_errors),
        ))
    }
}

/// Validates a payload for a partial update: the patch is merged over the
/// stored document first so range and cross-field rules see the final state,
/// and required fields already present in storage stay satisfied.
pub fn validate_patch(
    rules: &[FieldRule],
    existing: &Map<String, Value>,
    patch: &Map<String, Value>,
) -> Result<(), ApiError> {
    let mut merged = existing.clone();
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    validate(rules, &merged)
}

fn looks_like_email(s: &str) -> bool {
    let Some(at) = s.find('@') else { return false };
    let (local, domain) = s.split_at(at);
    let domain = &domain[1..];
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !s.contains(char::is_whitespace)
}

/// Password policy shared by signup and password updates: 8-15 characters
/// with at least one lowercase, one uppercase and one special character.
pub fn strong_password(value: &Value, _doc: &Map<String, Value>) -> bool {
    let Some(s) = value.as_str() else { return false };
    let len = s.chars().count();
    (8..=15).contains(&len)
        && s.chars().any(|c| c.is_ascii_lowercase())
        && s.chars().any(|c| c.is_ascii_uppercase())
        && s.chars().any(|c| !c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    const RULES: &[FieldRule] = &[
        FieldRule::new("name", Rule::Required),
        FieldRule::new("name", Rule::MinLen(3)),
        FieldRule::new("rating", Rule::Min(1.0)),
        FieldRule::new("rating", Rule::Max(5.0)),
        FieldRule::new("difficulty", Rule::OneOf(&["easy", "medium", "difficult"])),
        FieldRule::new("email", Rule::Email),
    ];

    #[test]
    fn missing_required_field_fails() {
        let err = validate(RULES, &doc(json!({ "rating": 4 }))).unwrap_err();
        let body = err.to_json();
        assert_eq!(body["field_errors"]["name"], "This field is required");
    }

    #[test]
    fn optional_rules_skip_absent_fields() {
        assert!(validate(RULES, &doc(json!({ "name": "Sea Explorer" }))).is_ok());
    }

    #[test]
    fn out_of_range_value_fails() {
        let err = validate(
            RULES,
            &doc(json!({ "name": "Sea Explorer", "rating": 7 })),
        )
        .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn enum_and_email_rules() {
        assert!(validate(
            RULES,
            &doc(json!({ "name": "Sea Explorer", "difficulty": "impossible" }))
        )
        .is_err());
        assert!(validate(
            RULES,
            &doc(json!({ "name": "Sea Explorer", "email": "not-an-email" }))
        )
        .is_err());
        assert!(validate(
            RULES,
            &doc(json!({ "name": "Sea Explorer", "email": "ada@example.com" }))
        )
        .is_ok());
    }

    #[test]
    fn patch_validates_merged_document() {
        let existing = doc(json!({ "name": "Sea Explorer", "rating": 4 }));

        // Patching an unrelated field keeps required fields satisfied
        assert!(validate_patch(RULES, &existing, &doc(json!({ "difficulty": "easy" }))).is_ok());

        // Patching rating past the maximum fails even though the patch
        // itself carries no required fields
        let err = validate_patch(RULES, &existing, &doc(json!({ "rating": 7 }))).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn password_policy() {
        let empty = Map::new();
        assert!(strong_password(&json!("Aa1!aaaa"), &empty));
        assert!(!strong_password(&json!("short"), &empty));
        assert!(!strong_password(&json!("alllowercase!"), &empty));
        assert!(!strong_password(&json!("NOLOWERCASE1!"), &empty));
        assert!(!strong_password(&json!("NoSpecials99"), &empty));
    }
}
