use std::collections::HashMap;

use serde_json::Value;

use super::types::{CompareOp, Condition, QuerySpec, SortDirection, SortKey};
use crate::config::QueryConfig;

/// Keys that steer the query pipeline rather than filter documents
pub const RESERVED_KEYS: &[&str] = &["page", "limit", "sort", "fields"];

const COMPARATORS: &[(&str, CompareOp)] = &[
    ("gt", CompareOp::Gt),
    ("gte", CompareOp::Gte),
    ("lt", CompareOp::Lt),
    ("lte", CompareOp::Lte),
];

/// Turns a flat query-string map into a [`QuerySpec`]. The three stages are
/// chained in a fixed order: `filter` strips control keys and builds the
/// predicate list, `sort` derives ordering and projection, `paginate`
/// computes limit/offset. Later stages assume the earlier ones ran.
pub struct QueryTranslator<'a> {
    params: &'a HashMap<String, String>,
    limits: &'a QueryConfig,
    spec: QuerySpec,
}

impl<'a> QueryTranslator<'a> {
    pub fn new(params: &'a HashMap<String, String>, limits: &'a QueryConfig) -> Self {
        Self {
            params,
            limits,
            spec: QuerySpec::default(),
        }
    }

    /// Convenience for the common full pipeline
    pub fn translate(params: &'a HashMap<String, String>, limits: &'a QueryConfig) -> QuerySpec {
        let mut translator = Self::new(params, limits);
        translator.filter().sort().paginate().finish()
    }

    /// Stage 1: every non-reserved key becomes a condition. A key shaped
    /// `field[op]` with `op` exactly one of gt/gte/lt/lte becomes a
    /// comparison; anything else, including lookalike operator names, stays
    /// an equality match on the literal key.
    pub fn filter(&mut self) -> &mut Self {
        let mut keys: Vec<&String> = self
            .params
            .keys()
            .filter(|k| !RESERVED_KEYS.contains(&k.as_str()))
            .collect();
        // Deterministic condition order regardless of map iteration
        keys.sort();

        for key in keys {
            let raw = &self.params[key];
            // Values stay as the raw text; the SQL renderer decides per
            // column whether a comparison binds numerically
            let condition = match parse_operator_key(key) {
                Some((field, op)) => Condition {
                    field: field.to_string(),
                    op,
                    value: Value::String(raw.clone()),
                },
                None => Condition {
                    field: key.clone(),
                    op: CompareOp::Eq,
                    value: Value::String(raw.clone()),
                },
            };
            self.spec.conditions.push(condition);
        }
        self
    }

    /// Stage 2: comma-separated sort keys, `-` prefix for descending.
    /// The literal value `fields` is ignored as malformed input. Also picks
    /// up the `fields` projection list.
    pub fn sort(&mut self) -> &mut Self {
        match self.params.get("sort") {
            Some(sort) if sort != "fields" => {
                for token in sort.split(',') {
                    let token = token.trim();
                    if token.is_empty() {
                        continue;
                    }
                    let (field, direction) = match token.strip_prefix('-') {
                        Some(rest) => (rest, SortDirection::Desc),
                        None => (token, SortDirection::Asc),
                    };
                    self.spec.sort.push(SortKey {
                        field: field.to_string(),
                        direction,
                    });
                }
            }
            _ => {
                // Newest first when the client does not say otherwise
                self.spec.sort.push(SortKey {
                    field: "created_at".to_string(),
                    direction: SortDirection::Desc,
                });
            }
        }

        if let Some(fields) = self.params.get("fields") {
            let list: Vec<String> = fields
                .split(',')
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect();
            if !list.is_empty() {
                self.spec.fields = Some(list);
            }
        }
        self
    }

    /// Stage 3: `limit` defaults to the configured page size and is capped
    /// by the configured maximum; `page` defaults to 1. Unparseable or
    /// non-positive values fall back to the defaults.
    pub fn paginate(&mut self) -> &mut Self {
        let limit = self
            .params
            .get("limit")
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(self.limits.default_limit)
            .min(self.limits.max_limit);

        let requested_page = self
            .params
            .get("page")
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0);

        let page = requested_page.unwrap_or(1);

        self.spec.limit = limit;
        self.spec.page = page;
        self.spec.offset = (page - 1) * limit;
        self.spec.page_requested = requested_page.is_some();
        self
    }

    pub fn finish(&mut self) -> QuerySpec {
        std::mem::take(&mut self.spec)
    }
}

/// Splits `field[op]` into its parts when `op` is a whole-word match for a
/// known comparator. `price[gte]` parses; `price[gte2]` and `pricegte` do not.
fn parse_operator_key(key: &str) -> Option<(&str, CompareOp)> {
    let open = key.find('[')?;
    let rest = &key[open + 1..];
    let close = rest.find(']')?;
    // Nothing may follow the closing bracket
    if open == 0 || close + 1 != rest.len() {
        return None;
    }
    let op_name = &rest[..close];
    let op = COMPARATORS
        .iter()
        .find(|(name, _)| *name == op_name)
        .map(|(_, op)| *op)?;
    Some((&key[..open], op))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn limits() -> QueryConfig {
        QueryConfig {
            default_limit: 10,
            max_limit: 100,
        }
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn plain_key_becomes_equality() {
        let p = params(&[("difficulty", "easy")]);
        let cfg = limits();
        let spec = QueryTranslator::translate(&p, &cfg);
        assert_eq!(spec.conditions, vec![Condition::eq("difficulty", "easy")]);
    }

    #[test]
    fn operator_key_becomes_comparison() {
        let p = params(&[("price", "500"), ("duration[gte]", "2")]);
        let cfg = limits();
        let spec = QueryTranslator::translate(&p, &cfg);

        let gte = spec
            .conditions
            .iter()
            .find(|c| c.field == "duration")
            .unwrap();
        assert_eq!(gte.op, CompareOp::Gte);
        assert_eq!(gte.value, json!("2"));

        let eq = spec.conditions.iter().find(|c| c.field == "price").unwrap();
        assert_eq!(eq.op, CompareOp::Eq);
        assert_eq!(eq.value, json!("500"));
    }

    #[test]
    fn lookalike_operator_is_not_translated() {
        // `gte2` and `lti` are not whole-word operator names
        let p = params(&[("price[gte2]", "5"), ("rating[lti]", "3")]);
        let cfg = limits();
        let spec = QueryTranslator::translate(&p, &cfg);

        for c in &spec.conditions {
            assert_eq!(c.op, CompareOp::Eq, "should stay untranslated: {:?}", c);
        }
        assert!(spec.conditions.iter().any(|c| c.field == "price[gte2]"));
    }

    #[test]
    fn reserved_keys_are_stripped_from_filter() {
        let p = params(&[
            ("page", "2"),
            ("limit", "5"),
            ("sort", "price"),
            ("fields", "name"),
            ("difficulty", "easy"),
        ]);
        let cfg = limits();
        let spec = QueryTranslator::translate(&p, &cfg);
        assert_eq!(spec.conditions.len(), 1);
        assert_eq!(spec.conditions[0].field, "difficulty");
    }

    #[test]
    fn sort_parses_direction_prefixes() {
        let p = params(&[("sort", "-price,name")]);
        let cfg = limits();
        let spec = QueryTranslator::translate(&p, &cfg);
        assert_eq!(spec.sort.len(), 2);
        assert_eq!(spec.sort[0].field, "price");
        assert_eq!(spec.sort[0].direction, SortDirection::Desc);
        assert_eq!(spec.sort[1].field, "name");
        assert_eq!(spec.sort[1].direction, SortDirection::Asc);
    }

    #[test]
    fn default_sort_is_created_at_desc() {
        let p = params(&[]);
        let cfg = limits();
        let spec = QueryTranslator::translate(&p, &cfg);
        assert_eq!(spec.sort.len(), 1);
        assert_eq!(spec.sort[0].field, "created_at");
        assert_eq!(spec.sort[0].direction, SortDirection::Desc);
    }

    #[test]
    fn sort_literal_fields_is_ignored() {
        let p = params(&[("sort", "fields")]);
        let cfg = limits();
        let spec = QueryTranslator::translate(&p, &cfg);
        assert_eq!(spec.sort[0].field, "created_at");
    }

    #[test]
    fn fields_projection_is_collected() {
        let p = params(&[("fields", "name, price")]);
        let cfg = limits();
        let spec = QueryTranslator::translate(&p, &cfg);
        assert_eq!(
            spec.fields,
            Some(vec!["name".to_string(), "price".to_string()])
        );
    }

    #[test]
    fn pagination_computes_offset() {
        let p = params(&[("page", "3"), ("limit", "20")]);
        let cfg = limits();
        let spec = QueryTranslator::translate(&p, &cfg);
        assert_eq!(spec.limit, 20);
        assert_eq!(spec.page, 3);
        assert_eq!(spec.offset, 40);
        assert!(spec.page_requested);
    }

    #[test]
    fn pagination_defaults_and_caps() {
        let p = params(&[("limit", "100000")]);
        let cfg = limits();
        let spec = QueryTranslator::translate(&p, &cfg);
        assert_eq!(spec.limit, 100);
        assert_eq!(spec.offset, 0);
        assert!(!spec.page_requested);

        let p = params(&[("page", "abc"), ("limit", "-4")]);
        let spec = QueryTranslator::translate(&p, &cfg);
        assert_eq!(spec.limit, 10);
        assert_eq!(spec.page, 1);
        assert!(!spec.page_requested);
    }
}
