use ask_sql::db::{DataSource, Database};
use ask_sql::error::{DatabaseError, QueryExecutionError};
use ask_sql::llm::generator::SqlGenerator;
use ask_sql::llm::prompt::PromptBuilder;
use ask_sql::llm::retry::{Backoff, RetryPolicy};
use ask_sql::llm::{LlmError, TextGenerationBackend};
use ask_sql::pipeline::{Outcome, Pipeline};
use ask_sql::query::{CellValue, QueryResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Replies with a fixed text and remembers the last prompt it saw.
struct MockLlm {
    reply: Result<String, fn() -> LlmError>,
    last_prompt: Mutex<Option<String>>,
    calls: AtomicU32,
}

impl MockLlm {
    fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            last_prompt: Mutex::new(None),
            calls: AtomicU32::new(0),
        })
    }

    fn failing(err: fn() -> LlmError) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(err),
            last_prompt: Mutex::new(None),
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl TextGenerationBackend for MockLlm {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(make) => Err(make()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn policy() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1), Backoff::Fixed)
}

async fn users_db() -> Database {
    let db = Database::in_memory();
    db.execute_batch(
        "CREATE TABLE users(id INT, name TEXT);
         INSERT INTO users VALUES (1, 'ada'), (2, 'grace'), (3, 'linus'), (4, 'barbara');",
    )
    .await
    .unwrap();
    db
}

fn pipeline(db: &Database, llm: Arc<MockLlm>) -> Pipeline {
    Pipeline::new(
        Arc::new(db.clone()),
        PromptBuilder::default(),
        SqlGenerator::new(llm, policy()),
    )
}

#[tokio::test]
async fn counts_users_end_to_end() {
    let db = users_db().await;
    let llm = MockLlm::replying("Here you go:\n```sql\nSELECT COUNT(*) FROM users;\n```");
    let pipeline = pipeline(&db, llm.clone());

    let outcome = pipeline.run("How many users are there?").await;

    // DuckDB labels an unaliased COUNT(*) as `count_star()`, so only the shape
    // and value are checked here. The aliased name is covered below.
    let answer = match outcome {
        Outcome::Answered(answer) => answer,
        other => panic!("expected an answer, got {:?}", other),
    };
    assert_eq!(answer.sql, "SELECT COUNT(*) FROM users;");
    assert_eq!(answer.result.columns.len(), 1);
    assert_eq!(answer.result.rows, vec![vec![CellValue::Int(4)]]);
    assert_eq!(answer.profile.chart_series, None);

    let prompt = llm.last_prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.contains("CREATE TABLE users ("));
    assert!(prompt.contains("How many users are there?"));
}

#[tokio::test]
async fn live_row_count_is_reflected() {
    let db = users_db().await;
    db.execute_batch("INSERT INTO users VALUES (5, 'ken');")
        .await
        .unwrap();
    let llm = MockLlm::replying("```sql\nSELECT COUNT(*) AS count FROM users;\n```");

    let outcome = pipeline(&db, llm).run("How many users are there?").await;

    match outcome {
        Outcome::Answered(answer) => {
            assert_eq!(answer.result.columns, vec!["count"]);
            assert_eq!(answer.result.rows, vec![vec![CellValue::Int(5)]]);
        }
        other => panic!("expected an answer, got {:?}", other),
    }
}

#[tokio::test]
async fn reply_without_fence_is_not_found_with_verbatim_text() {
    let db = users_db().await;
    let reply = "SELECT COUNT(*) FROM users;  -- no fence here\n";
    let llm = MockLlm::replying(reply);

    let outcome = pipeline(&db, llm).run("How many users are there?").await;

    assert_eq!(outcome.status(), "sql_not_found");
    assert_eq!(outcome.raw_response(), Some(reply));
    assert!(matches!(
        outcome,
        Outcome::SqlNotFound { ref raw_response } if raw_response == reply
    ));
}

#[tokio::test]
async fn generation_failure_is_distinct_from_execution_failure() {
    let db = users_db().await;
    let llm = MockLlm::failing(|| LlmError::ConnectionError("connection refused".to_string()));

    let outcome = pipeline(&db, llm.clone()).run("anything").await;

    match &outcome {
        Outcome::GenerationFailed(e) => assert_eq!(e.attempts, 3),
        other => panic!("expected a generation failure, got {:?}", other),
    }
    assert_eq!(llm.calls.load(Ordering::SeqCst), 3);
    assert!(outcome.user_message().starts_with("Error generating SQL"));
    assert_eq!(outcome.sql(), None);
}

#[tokio::test]
async fn bad_sql_keeps_statement_for_display() {
    let db = users_db().await;
    let llm = MockLlm::replying("```sql\nSELECT nme FROM users;\n```");

    let outcome = pipeline(&db, llm).run("names?").await;

    match &outcome {
        Outcome::ExecutionFailed(e) => assert_eq!(e.sql, "SELECT nme FROM users;"),
        other => panic!("expected an execution failure, got {:?}", other),
    }
    assert_eq!(outcome.sql(), Some("SELECT nme FROM users;"));
    assert!(outcome.user_message().starts_with("Error running SQL"));
}

#[tokio::test]
async fn pipeline_keeps_serving_after_failures() {
    let db = users_db().await;

    let broken = pipeline(&db, MockLlm::replying("```sql\nDROP TABLE nope;\n```"));
    assert_eq!(broken.run("break it").await.status(), "execution_failed");

    let working = pipeline(&db, MockLlm::replying("```sql\nSELECT 1 AS one;\n```"));
    assert_eq!(working.run("one?").await.status(), "answered");
}

#[tokio::test]
async fn list_columns_are_flattened_for_display() {
    let db = users_db().await;
    let llm = MockLlm::replying(
        "```sql\nSELECT name, list_value(id, id * 10) AS ids, id FROM users ORDER BY id LIMIT 2;\n```",
    );

    let outcome = pipeline(&db, llm).run("ids per user").await;

    let answer = match outcome {
        Outcome::Answered(answer) => answer,
        other => panic!("expected an answer, got {:?}", other),
    };
    assert_eq!(answer.result.rows[0][1], CellValue::Text("[1,10]".to_string()));
    assert_eq!(answer.result.rows[1][2], CellValue::Int(2));
    assert_eq!(answer.profile.numeric_columns, vec!["id"]);
    assert_eq!(answer.profile.index_column.as_deref(), Some("name"));
    assert_eq!(answer.profile.chart_series.as_deref(), Some("id"));
}

struct UnreachableDb;

#[async_trait]
impl DataSource for UnreachableDb {
    async fn get_schema(&self) -> Result<String, DatabaseError> {
        Err(DatabaseError::DuckDb(duckdb_error()))
    }

    async fn run_query(&self, sql: &str) -> Result<QueryResult, QueryExecutionError> {
        Err(QueryExecutionError::new(sql, "unreachable"))
    }
}

fn duckdb_error() -> duckdb::Error {
    duckdb::Error::QueryReturnedNoRows
}

#[tokio::test]
async fn schema_failure_skips_generation() {
    let llm = MockLlm::replying("```sql\nSELECT 1;\n```");
    let pipeline = Pipeline::new(
        Arc::new(UnreachableDb),
        PromptBuilder::default(),
        SqlGenerator::new(llm.clone(), policy()),
    );

    let outcome = pipeline.run("anything").await;

    assert_eq!(outcome.status(), "schema_unavailable");
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
}
