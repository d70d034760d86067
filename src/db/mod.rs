pub mod database;
pub mod db_pool;
pub mod schema;
pub mod value;

use crate::error::{DatabaseError, QueryExecutionError};
use crate::query::QueryResult;
use async_trait::async_trait;

pub use database::Database;

/// The database as the pipeline sees it.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Describes the tables the model may query.
    async fn get_schema(&self) -> Result<String, DatabaseError>;

    /// Executes `sql` as given. Failures carry the statement text.
    async fn run_query(&self, sql: &str) -> Result<QueryResult, QueryExecutionError>;
}
