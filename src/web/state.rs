use crate::config::AppConfig;
use crate::db::Database;
use crate::pipeline::Pipeline;

/// Shared application state for the web server
pub struct AppState {
    pub config: AppConfig,
    pub database: Database,
    pub pipeline: Pipeline,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: AppConfig, database: Database, pipeline: Pipeline) -> Self {
        Self {
            config,
            database,
            pipeline,
            startup_time: chrono::Utc::now(),
        }
    }
}
