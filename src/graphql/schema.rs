use async_graphql::{EmptyMutation, EmptySubscription, Schema};

use super::queries::QueryRoot;

/// Read-only schema over the content registry. Writes go through the JSON API.
pub type ContentSchema = Schema<QueryRoot, EmptyMutation, EmptySubscription>;

pub fn build_schema() -> ContentSchema {
    Schema::build(QueryRoot, EmptyMutation, EmptySubscription).finish()
}
