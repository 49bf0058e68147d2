use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Invalid column name: {0}")]
    InvalidColumn(String),

    #[error("Invalid sort key: {0}")]
    InvalidSortKey(String),
}
