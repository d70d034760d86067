use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::db::DataSource;
use crate::pipeline::Outcome;
use crate::query::{normalize, QueryResult, ResultProfile};
use crate::web::state::AppState;

// Query types

#[derive(Debug, Deserialize)]
pub struct ExecuteQueryRequest {
    pub query: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NlQueryRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub sql: String,
    pub result: QueryResult,
    pub profile: ResultProfile,
    pub execution_time_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct QueryErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NlQueryResponse {
    pub status: &'static str,
    pub message: String,
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<QueryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ResultProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
}

impl NlQueryResponse {
    pub fn from_outcome(question: String, outcome: Outcome) -> Self {
        let status = outcome.status();
        let message = outcome.user_message();
        let sql = outcome.sql().map(str::to_string);
        let raw_response = outcome.raw_response().map(str::to_string);

        let mut response = Self {
            status,
            message,
            question,
            sql,
            raw_response,
            result: None,
            profile: None,
            execution_time_ms: None,
        };

        if let Outcome::Answered(answer) = outcome {
            response.result = Some(answer.result);
            response.profile = Some(answer.profile);
            response.execution_time_ms = Some(answer.execution_time_ms);
        }

        response
    }

    fn status_code(&self) -> StatusCode {
        match self.status {
            "answered" => StatusCode::OK,
            "sql_not_found" => StatusCode::UNPROCESSABLE_ENTITY,
            "generation_failed" => StatusCode::BAD_GATEWAY,
            "execution_failed" => StatusCode::BAD_REQUEST,
            _ => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

// Schema

#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub schema: String,
}

// System status

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub backend: String,
    pub model: String,
    pub database: String,
}

// API Implementations

// Natural language query
pub async fn nl_query(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<NlQueryRequest>,
) -> Result<(StatusCode, Json<NlQueryResponse>), (StatusCode, String)> {
    let question = payload.question.trim().to_string();
    if question.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Question must not be empty".to_string()));
    }

    debug!("NL-query: {}", question);
    let outcome = app_state.pipeline.run(&question).await;
    let response = NlQueryResponse::from_outcome(question, outcome);

    Ok((response.status_code(), Json(response)))
}

// Direct SQL execution
pub async fn execute_query(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<ExecuteQueryRequest>,
) -> Result<Json<QueryResponse>, (StatusCode, Json<QueryErrorResponse>)> {
    let start_time = Instant::now();
    info!("Executing SQL query: {}", payload.query);

    match app_state.pipeline.source().run_query(&payload.query).await {
        Ok(result) => {
            let result = normalize(result);
            let profile = ResultProfile::from_result(&result);
            let execution_time_ms = start_time.elapsed().as_millis() as u64;
            info!(
                "Query executed successfully. Row count: {}, Execution time: {}ms",
                result.row_count(),
                execution_time_ms
            );
            Ok(Json(QueryResponse {
                sql: payload.query,
                result,
                profile,
                execution_time_ms,
            }))
        }
        Err(e) => Err((
            StatusCode::BAD_REQUEST,
            Json(QueryErrorResponse {
                error: format!("SQL error: {}", e.message),
                sql: Some(e.sql),
            }),
        )),
    }
}

pub async fn get_schema(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<SchemaResponse>, (StatusCode, Json<QueryErrorResponse>)> {
    match app_state.pipeline.source().get_schema().await {
        Ok(schema) => Ok(Json(SchemaResponse { schema })),
        Err(e) => {
            error!("Failed to get schema: {}", e);
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(QueryErrorResponse {
                    error: e.to_string(),
                    sql: None,
                }),
            ))
        }
    }
}

pub async fn system_status(State(app_state): State<Arc<AppState>>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: (chrono::Utc::now() - app_state.startup_time).num_seconds(),
        backend: app_state.pipeline.generator().backend_name().to_string(),
        model: app_state.config.llm.model.clone(),
        database: app_state.database.connection_string().to_string(),
    })
}
