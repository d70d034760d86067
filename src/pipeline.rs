use crate::db::DataSource;
use crate::error::{DatabaseError, GenerationError, QueryExecutionError};
use crate::llm::extract::ExtractionOutcome;
use crate::llm::generator::SqlGenerator;
use crate::llm::prompt::PromptBuilder;
use crate::query::{normalize, QueryResult, ResultProfile};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// A successfully answered question.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub sql: String,
    pub result: QueryResult,
    pub profile: ResultProfile,
    pub execution_time_ms: u64,
}

/// How a pipeline run ended. Every variant is something to show the user.
#[derive(Debug)]
pub enum Outcome {
    Answered(Answer),
    /// The model replied without a ```sql block.
    SqlNotFound { raw_response: String },
    GenerationFailed(GenerationError),
    ExecutionFailed(QueryExecutionError),
    SchemaUnavailable(DatabaseError),
}

impl Outcome {
    pub fn status(&self) -> &'static str {
        match self {
            Outcome::Answered(_) => "answered",
            Outcome::SqlNotFound { .. } => "sql_not_found",
            Outcome::GenerationFailed(_) => "generation_failed",
            Outcome::ExecutionFailed(_) => "execution_failed",
            Outcome::SchemaUnavailable(_) => "schema_unavailable",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Outcome::Answered(answer) if answer.result.is_empty() => {
                "Query executed, but no data was returned.".to_string()
            }
            Outcome::Answered(answer) => format!("{} row(s) returned.", answer.result.row_count()),
            Outcome::SqlNotFound { .. } => {
                "Could not extract SQL query from the response. Please try rephrasing your question."
                    .to_string()
            }
            Outcome::GenerationFailed(e) => format!("Error generating SQL: {}", e),
            Outcome::ExecutionFailed(e) => format!("Error running SQL: {}", e.message),
            Outcome::SchemaUnavailable(e) => format!("Error getting table schema: {}", e),
        }
    }

    /// SQL worth showing alongside the message, if any was produced.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Outcome::Answered(answer) => Some(&answer.sql),
            Outcome::ExecutionFailed(e) => Some(&e.sql),
            _ => None,
        }
    }

    /// The model's reply when no SQL could be pulled out of it.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Outcome::SqlNotFound { raw_response } => Some(raw_response),
            _ => None,
        }
    }
}

/// Question in, [`Outcome`] out.
pub struct Pipeline {
    source: Arc<dyn DataSource>,
    prompts: PromptBuilder,
    generator: SqlGenerator,
}

impl Pipeline {
    pub fn new(source: Arc<dyn DataSource>, prompts: PromptBuilder, generator: SqlGenerator) -> Self {
        Self {
            source,
            prompts,
            generator,
        }
    }

    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    pub fn generator(&self) -> &SqlGenerator {
        &self.generator
    }

    pub async fn run(&self, question: &str) -> Outcome {
        info!("Answering question: {}", question);

        let schema = match self.source.get_schema().await {
            Ok(schema) => schema,
            Err(e) => {
                error!("Failed to read schema: {}", e);
                return Outcome::SchemaUnavailable(e);
            }
        };
        if schema.trim().is_empty() {
            warn!("Schema description is empty; the model has no tables to work with");
        }

        let prompt = self.prompts.build_prompt(&schema, question);

        let response = match self.generator.generate_sql(&prompt).await {
            Ok(response) => response,
            Err(e) => return Outcome::GenerationFailed(e),
        };

        let sql = match ExtractionOutcome::from_response(response) {
            ExtractionOutcome::Found { sql } => sql,
            ExtractionOutcome::NotFound { raw_response } => {
                error!("Could not extract SQL from LLM response");
                return Outcome::SqlNotFound { raw_response };
            }
        };
        info!("Extracted SQL: {}", sql);

        let start_time = Instant::now();
        let result = match self.source.run_query(&sql).await {
            Ok(result) => normalize(result),
            Err(e) => return Outcome::ExecutionFailed(e),
        };
        let execution_time_ms = start_time.elapsed().as_millis() as u64;

        info!(
            "Query executed successfully. Row count: {}, Execution time: {}ms",
            result.row_count(),
            execution_time_ms
        );

        let profile = ResultProfile::from_result(&result);
        Outcome::Answered(Answer {
            sql,
            result,
            profile,
            execution_time_ms,
        })
    }
}
