use serde_json::Value;

use super::error::QueryError;
use super::types::{CompareOp, Condition, QuerySpec, SortKey, SqlQuery};

/// Renders the pieces of a [`QuerySpec`] into SQL fragments with bound
/// parameters. Field names must come from the entity's public column list;
/// anything else is rejected before it reaches the database. Values are
/// always bound, never interpolated.
pub struct SqlRenderer<'a> {
    /// Columns a client may filter, sort and project on
    allowed: &'a [&'a str],
    /// Columns whose range comparisons bind numerically; anything else
    /// compares its text form
    numeric: &'a [&'a str],
    /// Projection used when the request names no fields
    default_projection: Vec<&'a str>,
}

impl<'a> SqlRenderer<'a> {
    pub fn new(
        allowed: &'a [&'a str],
        numeric: &'a [&'a str],
        default_projection: Vec<&'a str>,
    ) -> Self {
        Self {
            allowed,
            numeric,
            default_projection,
        }
    }

    /// WHERE clause for the given conditions, starting bind numbering at
    /// `$start_index + 1`. Empty conditions render as "1=1" so callers can
    /// always append the fragment.
    pub fn render_where(
        &self,
        conditions: &[Condition],
        start_index: usize,
    ) -> Result<SqlQuery, QueryError> {
        if conditions.is_empty() {
            return Ok(SqlQuery {
                sql: "1=1".to_string(),
                params: vec![],
            });
        }

        let mut parts = Vec::with_capacity(conditions.len());
        let mut params = Vec::with_capacity(conditions.len());
        let mut index = start_index;

        for condition in conditions {
            self.check_field(&condition.field)?;
            index += 1;

            let quoted = format!("\"{}\"", condition.field);
            let op = condition.op.to_sql();

            let is_range = matches!(
                condition.op,
                CompareOp::Gt | CompareOp::Gte | CompareOp::Lt | CompareOp::Lte
            );

            // Range comparisons bind numbers only against columns declared
            // numeric; a numeric-looking value against a text or timestamp
            // column would otherwise fail at prepare time. Everything else
            // compares the column's text form, which is type-agnostic and
            // lexicographically correct for ISO dates.
            let numeric_value = if is_range && self.numeric.contains(&condition.field.as_str()) {
                as_numeric(&condition.value)
            } else {
                None
            };

            match numeric_value {
                Some(value) => {
                    parts.push(format!("{} {} ${}", quoted, op, index));
                    params.push(value);
                }
                None => {
                    parts.push(format!("{}::text {} ${}", quoted, op, index));
                    params.push(Value::String(value_as_text(&condition.value)));
                }
            }
        }

        Ok(SqlQuery {
            sql: parts.join(" AND "),
            params,
        })
    }

    /// ORDER BY clause; empty sort list renders as an empty string
    pub fn render_order(&self, sort: &[SortKey]) -> Result<String, QueryError> {
        if sort.is_empty() {
            return Ok(String::new());
        }
        let mut parts = Vec::with_capacity(sort.len());
        for key in sort {
            if !self.allowed.contains(&key.field.as_str()) {
                return Err(QueryError::InvalidSortKey(key.field.clone()));
            }
            parts.push(format!("\"{}\" {}", key.field, key.direction.to_sql()));
        }
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }

    /// Column list for the SELECT. Explicit fields are validated and always
    /// joined by the identifier; the default projection is the entity's
    /// public columns minus internal bookkeeping.
    pub fn render_select(&self, fields: &Option<Vec<String>>) -> Result<String, QueryError> {
        let columns: Vec<String> = match fields {
            Some(requested) => {
                let mut cols = vec!["id".to_string()];
                for field in requested {
                    self.check_field(field)?;
                    if field != "id" {
                        cols.push(field.clone());
                    }
                }
                cols
            }
            None => self
                .default_projection
                .iter()
                .map(|c| c.to_string())
                .collect(),
        };

        Ok(columns
            .iter()
            .map(|c| format!("\"{}\"", c))
            .collect::<Vec<_>>()
            .join(", "))
    }

    pub fn render_limit(&self, spec: &QuerySpec) -> String {
        format!("LIMIT {} OFFSET {}", spec.limit, spec.offset)
    }

    fn check_field(&self, field: &str) -> Result<(), QueryError> {
        if !is_valid_identifier(field) {
            return Err(QueryError::InvalidColumn(field.to_string()));
        }
        if !self.allowed.contains(&field) {
            return Err(QueryError::UnknownField(field.to_string()));
        }
        Ok(())
    }
}

fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_numeric(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) => s
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::types::SortDirection;
    use serde_json::json;

    const ALLOWED: &[&str] = &["id", "name", "price", "duration", "created_at", "revision"];
    const NUMERIC: &[&str] = &["price", "duration", "revision"];
    const DEFAULT: &[&str] = &["id", "name", "price", "duration", "created_at"];

    fn renderer() -> SqlRenderer<'static> {
        SqlRenderer::new(ALLOWED, NUMERIC, DEFAULT.to_vec())
    }

    #[test]
    fn where_renders_numeric_comparison() {
        let conditions = vec![Condition {
            field: "price".to_string(),
            op: CompareOp::Gt,
            value: json!("500"),
        }];
        let out = renderer().render_where(&conditions, 0).unwrap();
        assert_eq!(out.sql, "\"price\" > $1");
        assert_eq!(out.params, vec![json!(500.0)]);
    }

    #[test]
    fn numeric_value_against_text_column_compares_as_text() {
        // name > 100 must not produce a float bind against a text column
        let conditions = vec![Condition {
            field: "name".to_string(),
            op: CompareOp::Gt,
            value: json!("100"),
        }];
        let out = renderer().render_where(&conditions, 0).unwrap();
        assert_eq!(out.sql, "\"name\"::text > $1");
        assert_eq!(out.params, vec![json!("100")]);
    }

    #[test]
    fn date_comparison_stays_textual() {
        let conditions = vec![Condition {
            field: "created_at".to_string(),
            op: CompareOp::Gte,
            value: json!("2026-01-01"),
        }];
        let out = renderer().render_where(&conditions, 0).unwrap();
        assert_eq!(out.sql, "\"created_at\"::text >= $1");
    }

    #[test]
    fn unparseable_value_on_numeric_column_falls_back_to_text() {
        let conditions = vec![Condition {
            field: "price".to_string(),
            op: CompareOp::Lt,
            value: json!("cheap"),
        }];
        let out = renderer().render_where(&conditions, 0).unwrap();
        assert_eq!(out.sql, "\"price\"::text < $1");
        assert_eq!(out.params, vec![json!("cheap")]);
    }

    #[test]
    fn where_renders_text_equality() {
        let conditions = vec![Condition::eq("name", "The Forest Hiker")];
        let out = renderer().render_where(&conditions, 0).unwrap();
        assert_eq!(out.sql, "\"name\"::text = $1");
        assert_eq!(out.params, vec![json!("The Forest Hiker")]);
    }

    #[test]
    fn where_rejects_unknown_field() {
        let conditions = vec![Condition::eq("price[gte2]", "5")];
        let err = renderer().render_where(&conditions, 0).unwrap_err();
        assert!(matches!(err, QueryError::InvalidColumn(_)));

        let conditions = vec![Condition::eq("secret_column", "x")];
        let err = renderer().render_where(&conditions, 0).unwrap_err();
        assert!(matches!(err, QueryError::UnknownField(_)));
    }

    #[test]
    fn where_numbering_continues_from_start_index() {
        let conditions = vec![
            Condition::eq("name", "a"),
            Condition {
                field: "duration".to_string(),
                op: CompareOp::Lte,
                value: json!(5.0),
            },
        ];
        let out = renderer().render_where(&conditions, 2).unwrap();
        assert_eq!(out.sql, "\"name\"::text = $3 AND \"duration\" <= $4");
    }

    #[test]
    fn order_renders_directions() {
        let sort = vec![
            SortKey {
                field: "price".to_string(),
                direction: SortDirection::Desc,
            },
            SortKey {
                field: "name".to_string(),
                direction: SortDirection::Asc,
            },
        ];
        let out = renderer().render_order(&sort).unwrap();
        assert_eq!(out, "ORDER BY \"price\" DESC, \"name\" ASC");
    }

    #[test]
    fn select_defaults_exclude_revision() {
        let out = renderer().render_select(&None).unwrap();
        assert!(!out.contains("revision"));
        assert!(out.contains("\"name\""));
    }

    #[test]
    fn select_explicit_fields_keep_identifier() {
        let fields = Some(vec!["name".to_string(), "price".to_string()]);
        let out = renderer().render_select(&fields).unwrap();
        assert_eq!(out, "\"id\", \"name\", \"price\"");
    }

    #[test]
    fn select_rejects_unknown_field() {
        let fields = Some(vec!["password_hash".to_string()]);
        assert!(renderer().render_select(&fields).is_err());
    }
}
