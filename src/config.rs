use crate::error::ConfigurationError;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    ReadWrite,
    ReadOnly,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub connection_string: String,
    pub pool_size: usize,
    pub access_mode: AccessMode,
    /// Restricts the schema description to these tables when set.
    pub include_tables: Option<Vec<String>>,
    /// Sample rows appended to each table in the schema description.
    pub sample_rows: usize,
    /// SQL dialect the model is told to target.
    pub dialect: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackendKind {
    Remote,
    #[serde(alias = "local")]
    Ollama,
}

impl std::fmt::Display for LlmBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmBackendKind::Remote => write!(f, "remote"),
            LlmBackendKind::Ollama => write!(f, "ollama"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackendKind,
    pub model: String,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    /// 1 keeps the delay fixed, anything larger multiplies it per attempt.
    pub backoff_factor: u32,
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub llm: LlmConfig,
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Database connection string (DuckDB file path or :memory:)
    #[arg(long)]
    pub database: Option<String>,

    /// Answer a single question, print the outcome as JSON and exit
    #[arg(short, long)]
    pub question: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

const ENV_PREFIX: &str = "ASK_SQL";

const DEFAULT_LOCATIONS: [&str; 3] = [
    "config.toml",
    "config/config.toml",
    "/etc/ask-sql/config.toml",
];

impl AppConfig {
    /// Loads configuration from the process environment and the filesystem.
    pub fn new(args: &CliArgs) -> Result<Self, ConfigurationError> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::from_sources(args, &env)
    }

    /// Layers defaults, the config file, `ASK_SQL__*` variables, well-known
    /// variables and finally CLI flags, then validates the result.
    pub fn from_sources(
        args: &CliArgs,
        env: &HashMap<String, String>,
    ) -> Result<Self, ConfigurationError> {
        let mut config_builder = Config::builder()
            .set_default("database.connection_string", "")?
            .set_default("database.pool_size", 4)?
            .set_default("database.access_mode", "read_write")?
            .set_default("database.sample_rows", 0)?
            .set_default("database.dialect", "DuckDB")?
            .set_default("web.host", "127.0.0.1")?
            .set_default("web.port", 3000)?
            .set_default("llm.backend", "ollama")?
            .set_default("llm.model", "llama3.2")?
            .set_default("llm.temperature", 0.0)?
            .set_default("llm.timeout_secs", 120)?
            .set_default("llm.max_attempts", 3)?
            .set_default("llm.retry_delay_ms", 2000)?
            .set_default("llm.backoff_factor", 1)?;

        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else if let Some(location) = DEFAULT_LOCATIONS.iter().find(|l| Path::new(l).exists()) {
            config_builder =
                config_builder.add_source(File::new(location, config::FileFormat::Toml));
        }

        config_builder = config_builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .source(Some(env.clone().into_iter().collect())),
        );

        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        config.apply_well_known_env(env);

        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if let Some(database) = &args.database {
            config.database.connection_string = database.clone();
        }

        config.validate()?;
        Ok(config)
    }

    fn apply_well_known_env(&mut self, env: &HashMap<String, String>) {
        let lookup = |key: &str| env.get(key).filter(|v| !v.trim().is_empty()).cloned();

        if let Some(url) = lookup("DATABASE_URL") {
            self.database.connection_string = url;
        }
        if self.llm.api_key.is_none() {
            self.llm.api_key = lookup("OPENAI_API_KEY");
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = model;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.database.connection_string.trim().is_empty() {
            return Err(ConfigurationError::Missing("database.connection_string"));
        }
        if self.database.pool_size == 0 {
            return Err(ConfigurationError::Invalid {
                key: "database.pool_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigurationError::Missing("llm.model"));
        }
        if self.llm.max_attempts == 0 {
            return Err(ConfigurationError::Invalid {
                key: "llm.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.llm.backend == LlmBackendKind::Remote
            && self.llm.api_key.as_deref().is_none_or(|k| k.trim().is_empty())
        {
            return Err(ConfigurationError::Missing("llm.api_key"));
        }
        Ok(())
    }
}
