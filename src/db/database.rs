use crate::config::{AccessMode, DatabaseConfig};
use crate::db::db_pool::DuckDBConnectionManager;
use crate::db::schema::{describe_schema, SchemaOptions};
use crate::db::value::to_cell;
use crate::db::DataSource;
use crate::error::{DatabaseError, QueryExecutionError};
use crate::query::QueryResult;
use async_trait::async_trait;
use duckdb::types::Value;
use duckdb::Connection;
use once_cell::sync::OnceCell;
use r2d2::{Pool, PooledConnection};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// DuckDB types whose values lose information on the way through Arrow.
const TEXT_ONLY_TYPES: [&str; 4] = ["BIT", "VARINT", "TIME WITH TIME ZONE", "TIMETZ"];

/// Describes a query's output as `(name, type)` pairs, or `None` when DuckDB
/// cannot describe it (DDL, DML, several statements).
fn describe_query(conn: &Connection, sql: &str) -> Option<Vec<(String, String)>> {
    let head = sql.trim_start().to_ascii_uppercase();
    if !["SELECT", "WITH", "FROM", "VALUES"]
        .iter()
        .any(|keyword| head.starts_with(keyword))
    {
        return None;
    }

    let mut stmt = conn.prepare(&format!("DESCRIBE {}", sql)).ok()?;
    let described = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .ok()?
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    Some(described)
}

/// Wraps `sql` so columns of a text-only type come back as DuckDB's own text
/// form. Returns `None` when no column needs it.
fn with_text_casts(conn: &Connection, sql: &str) -> Option<String> {
    let columns = describe_query(conn, sql)?;
    if !columns
        .iter()
        .any(|(_, ty)| TEXT_ONLY_TYPES.contains(&ty.as_str()))
    {
        return None;
    }

    let aliases: Vec<String> = (0..columns.len()).map(|i| format!("c{}", i)).collect();
    let projections: Vec<String> = columns
        .iter()
        .zip(&aliases)
        .map(|((name, ty), alias)| {
            let quoted = format!("\"{}\"", name.replace('"', "\"\""));
            if TEXT_ONLY_TYPES.contains(&ty.as_str()) {
                format!("CAST({} AS VARCHAR) AS {}", alias, quoted)
            } else {
                format!("{} AS {}", alias, quoted)
            }
        })
        .collect();
    let body = sql.trim().trim_end_matches(';');

    Some(format!(
        "SELECT {} FROM (\n{}\n) AS q({})",
        projections.join(", "),
        body,
        aliases.join(", ")
    ))
}

/// Runs `sql` verbatim and materializes every row.
///
/// Queries producing BIT, VARINT or TIMETZ columns are wrapped so those
/// columns arrive as text.
pub(crate) fn execute_sql(conn: &Connection, sql: &str) -> Result<QueryResult, duckdb::Error> {
    let mut stmt = match with_text_casts(conn, sql) {
        Some(wrapped) => match conn.prepare(&wrapped) {
            Ok(stmt) => stmt,
            Err(e) => {
                debug!("Text casts not applicable, running as written: {}", e);
                conn.prepare(sql)?
            }
        },
        None => conn.prepare(sql)?,
    };
    let mut rows = stmt.query([])?;

    let columns: Vec<String> = rows
        .as_ref()
        .map(|stmt| stmt.column_names().into_iter().map(|c| c.to_string()).collect())
        .unwrap_or_default();
    let width = columns.len();

    let mut data = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(to_cell(row.get::<_, Value>(i)?));
        }
        data.push(values);
    }

    Ok(QueryResult::new(columns, data))
}

struct DatabaseInner {
    connection_string: String,
    access_mode: AccessMode,
    pool_size: u32,
    schema_options: SchemaOptions,
    pool: OnceCell<Pool<DuckDBConnectionManager>>,
}

/// Handle to the target DuckDB database.
///
/// The connection pool is built on first use and reused for the life of the
/// process. Cloning shares the pool.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            inner: Arc::new(DatabaseInner {
                connection_string: config.connection_string.clone(),
                access_mode: config.access_mode,
                pool_size: config.pool_size.max(1) as u32,
                schema_options: SchemaOptions {
                    include_tables: config.include_tables.clone(),
                    sample_rows: config.sample_rows,
                },
                pool: OnceCell::new(),
            }),
        }
    }

    /// Convenience for an isolated in-memory database.
    pub fn in_memory() -> Self {
        Self::new(&DatabaseConfig {
            connection_string: ":memory:".to_string(),
            pool_size: 2,
            access_mode: AccessMode::ReadWrite,
            include_tables: None,
            sample_rows: 0,
            dialect: "DuckDB".to_string(),
        })
    }

    pub fn connection_string(&self) -> &str {
        &self.inner.connection_string
    }

    fn connection(&self) -> Result<PooledConnection<DuckDBConnectionManager>, r2d2::Error> {
        let pool = self.inner.pool.get_or_try_init(|| {
            info!(
                "Initializing DuckDB connection pool for '{}'",
                self.inner.connection_string
            );
            let manager = DuckDBConnectionManager::new(
                self.inner.connection_string.clone(),
                self.inner.access_mode,
            );
            Pool::builder()
                .max_size(self.inner.pool_size)
                .connection_timeout(Duration::from_secs(5))
                .build(manager)
        })?;
        pool.get()
    }

    /// Runs one or more statements that return no rows, such as setup scripts.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), DatabaseError> {
        let db = self.clone();
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), DatabaseError> {
            let conn = db.connection()?;
            conn.execute_batch(&sql)?;
            Ok(())
        })
        .await?
    }
}

#[async_trait]
impl DataSource for Database {
    async fn get_schema(&self) -> Result<String, DatabaseError> {
        let db = self.clone();
        tokio::task::spawn_blocking(move || -> Result<String, DatabaseError> {
            let conn = db.connection()?;
            Ok(describe_schema(&conn, &db.inner.schema_options)?)
        })
        .await?
    }

    async fn run_query(&self, sql: &str) -> Result<QueryResult, QueryExecutionError> {
        let db = self.clone();
        let sql_to_execute = sql.to_string();

        let task = tokio::task::spawn_blocking(move || -> Result<QueryResult, String> {
            let start_time = Instant::now();
            // The pooled connection goes back to the pool when it drops, on every path.
            let conn = db.connection().map_err(|e| e.to_string())?;
            let result = execute_sql(&conn, &sql_to_execute).map_err(|e| e.to_string())?;
            debug!(
                "Query returned {} rows in {}ms",
                result.row_count(),
                start_time.elapsed().as_millis()
            );
            Ok(result)
        });

        match task.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(message)) => {
                error!("Database query error: {}", message);
                Err(QueryExecutionError::new(sql, message))
            }
            Err(join_err) => {
                error!("Task join error: {}", join_err);
                Err(QueryExecutionError::new(sql, join_err))
            }
        }
    }
}
