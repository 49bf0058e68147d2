pub mod pool;
pub mod repository;

pub use repository::{Entity, Expand, Repository};
