/// Builds the text-to-SQL prompt sent to every backend.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    dialect: String,
}

impl PromptBuilder {
    pub fn new(dialect: impl Into<String>) -> Self {
        Self {
            dialect: dialect.into(),
        }
    }

    pub fn build_prompt(&self, schema: &str, question: &str) -> String {
        format!(
            r#"You are an expert SQL analyst.

You will be provided:
- A database schema with table names and column descriptions.
- A user's question written in natural language.

Your job is to:
1. Understand the user's intent
2. Analyze which tables and columns are needed
3. Write an accurate and optimized SQL query that answers the question

--- Schema ---
{schema}

--- Question ---
{question}

--- Instructions ---
- Return ONLY the SQL query, no explanation
- Wrap the query in a single ```sql fenced block and use no other markdown
- Use exact column and table names from the schema
- Use JOINs, GROUP BY, HAVING, and nested subqueries when necessary
- Handle edge cases like NULL values, missing relationships, or ambiguous columns
- Assume {dialect} syntax

--- SQL ---"#,
            schema = schema.trim(),
            question = question.trim(),
            dialect = self.dialect,
        )
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new("DuckDB")
    }
}
