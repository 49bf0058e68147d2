use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison operators accepted in query strings as `field[op]=value`.
/// Equality is implicit for plain `field=value` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    pub fn to_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }
}

/// One filter predicate: `field OP value`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: CompareOp,
    pub value: Value,
}

impl Condition {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: CompareOp::Eq,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

/// Structured query specification derived from one request's query string.
/// Built fresh per request, never persisted or shared.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub conditions: Vec<Condition>,
    pub sort: Vec<SortKey>,
    /// Explicit projection; `None` means every public column except the
    /// internal `revision` field
    pub fields: Option<Vec<String>>,
    pub limit: i64,
    pub offset: i64,
    pub page: i64,
    /// Whether the client asked for a page explicitly; drives the
    /// count-before-execute out-of-range check
    pub page_requested: bool,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            conditions: vec![],
            sort: vec![],
            fields: None,
            limit: 10,
            offset: 0,
            page: 1,
            page_requested: false,
        }
    }
}

/// A rendered SQL fragment plus its bind parameters, in order
#[derive(Debug, Clone)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<Value>,
}
