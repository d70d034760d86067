use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static SQL_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)```sql\b(.*?)```").expect("SQL fence pattern is valid")
});

/// Returns the trimmed body of the first ```sql fenced block, if any.
///
/// The tag is matched case-insensitively and must be exactly `sql`, so a
/// ```sqlite fence does not count. Later blocks are ignored.
pub fn extract_sql(response: &str) -> Option<String> {
    SQL_FENCE
        .captures(response)
        .and_then(|captures| captures.get(1))
        .map(|body| body.as_str().trim().to_string())
}

/// Result of looking for SQL in a model reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    Found { sql: String },
    /// Nothing to run; the reply is kept so the user can see what the model said.
    NotFound { raw_response: String },
}

impl ExtractionOutcome {
    pub fn from_response(raw_response: String) -> Self {
        match extract_sql(&raw_response) {
            Some(sql) => ExtractionOutcome::Found { sql },
            None => ExtractionOutcome::NotFound { raw_response },
        }
    }
}
