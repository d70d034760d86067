use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use ask_sql::config::{AppConfig, CliArgs};
use ask_sql::db::Database;
use ask_sql::llm::backend_from_config;
use ask_sql::llm::generator::SqlGenerator;
use ask_sql::llm::prompt::PromptBuilder;
use ask_sql::pipeline::Pipeline;
use ask_sql::util::logging::init_tracing;
use ask_sql::web;
use ask_sql::web::handlers::api::NlQueryResponse;
use ask_sql::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = CliArgs::parse();

    // Initialize logging
    init_tracing(args.log_json);

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Connections are opened on first use
    let database = Database::new(&config.database);

    info!("Initializing LLM backend: {} ({})", config.llm.backend, config.llm.model);
    let backend = match backend_from_config(&config.llm) {
        Ok(backend) => backend,
        Err(e) => {
            error!("Failed to initialize LLM backend: {}", e);
            return Err(e.into());
        }
    };

    let pipeline = Pipeline::new(
        Arc::new(database.clone()),
        PromptBuilder::new(config.database.dialect.clone()),
        SqlGenerator::from_config(backend, &config.llm),
    );

    if let Some(question) = args.question.clone() {
        let outcome = pipeline.run(&question).await;
        let response = NlQueryResponse::from_outcome(question, outcome);
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let web_config = config.web.clone();
    let app_state = Arc::new(AppState::new(config, database, pipeline));

    info!("Starting ask-sql server on {}:{}", web_config.host, web_config.port);
    match web::run_server(web_config, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
