pub mod error;
pub mod sql;
pub mod translate;
pub mod types;

pub use error::QueryError;
pub use translate::QueryTranslator;
pub use types::*;
