pub mod queries;
pub mod schema;

pub use schema::{build_schema, ContentSchema};
