//! Natural-language questions answered from a DuckDB database.
//!
//! A question and the database's schema are turned into a prompt, a language
//! model writes SQL inside a ```sql block, the SQL is run as-is and the rows
//! are normalized for display. See [`pipeline::Pipeline`].

pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod query;
pub mod util;
pub mod web;

pub use error::{ConfigurationError, DatabaseError, GenerationError, QueryExecutionError};
pub use pipeline::{Answer, Outcome, Pipeline};
