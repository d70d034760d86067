use crate::db::database::execute_sql;
use duckdb::Connection;
use std::fmt::Write;
use tracing::debug;

/// What the schema description should contain.
#[derive(Debug, Clone, Default)]
pub struct SchemaOptions {
    /// Only these tables are described when set. Matches bare or schema-qualified names.
    pub include_tables: Option<Vec<String>>,
    pub sample_rows: usize,
}

struct ColumnInfo {
    name: String,
    data_type: String,
    nullable: bool,
}

struct TableInfo {
    schema: String,
    name: String,
    columns: Vec<ColumnInfo>,
}

impl TableInfo {
    fn display_name(&self) -> String {
        if self.schema == "main" {
            self.name.clone()
        } else {
            format!("{}.{}", self.schema, self.name)
        }
    }

    fn quoted_name(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

const COLUMNS_QUERY: &str = "
    SELECT table_schema, table_name, column_name, data_type, is_nullable
    FROM information_schema.columns
    WHERE table_catalog = current_database()
      AND table_schema NOT IN ('information_schema', 'pg_catalog')
    ORDER BY table_schema, table_name, ordinal_position
";

fn load_tables(conn: &Connection) -> Result<Vec<TableInfo>, duckdb::Error> {
    let mut stmt = conn.prepare(COLUMNS_QUERY)?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            ColumnInfo {
                name: row.get(2)?,
                data_type: row.get(3)?,
                nullable: row.get::<_, String>(4)? == "YES",
            },
        ))
    })?;

    let mut tables: Vec<TableInfo> = Vec::new();
    for row in rows {
        let (schema, name, column) = row?;
        match tables.last_mut() {
            Some(table) if table.schema == schema && table.name == name => {
                table.columns.push(column)
            }
            _ => tables.push(TableInfo {
                schema,
                name,
                columns: vec![column],
            }),
        }
    }

    Ok(tables)
}

/// Renders the database's tables as `CREATE TABLE` statements, optionally
/// followed by a few sample rows per table.
pub fn describe_schema(conn: &Connection, options: &SchemaOptions) -> Result<String, duckdb::Error> {
    let mut tables = load_tables(conn)?;

    if let Some(include) = &options.include_tables {
        tables.retain(|t| include.iter().any(|i| *i == t.name || *i == t.display_name()));
    }

    debug!("Describing {} tables", tables.len());

    let mut description = String::new();
    for table in &tables {
        if !description.is_empty() {
            description.push_str("\n\n");
        }

        let _ = writeln!(description, "CREATE TABLE {} (", table.display_name());
        let definitions: Vec<String> = table
            .columns
            .iter()
            .map(|c| {
                let null_str = if c.nullable { "" } else { " NOT NULL" };
                format!("    {} {}{}", c.name, c.data_type, null_str)
            })
            .collect();
        description.push_str(&definitions.join(",\n"));
        description.push_str("\n);");

        if options.sample_rows > 0 {
            let sample_sql = format!(
                "SELECT * FROM {} LIMIT {}",
                table.quoted_name(),
                options.sample_rows
            );
            let sample = execute_sql(conn, &sample_sql)?;
            let _ = write!(
                description,
                "\n\n/*\n{} rows from {} table:\n{}",
                options.sample_rows,
                table.display_name(),
                sample.columns.join("\t")
            );
            for row in &sample.rows {
                let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                let _ = write!(description, "\n{}", cells.join("\t"));
            }
            description.push_str("\n*/");
        }
    }

    Ok(description)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE users(id INTEGER NOT NULL, name VARCHAR);
             CREATE TABLE orders(id INTEGER, user_id INTEGER, total DOUBLE);
             CREATE SCHEMA sales;
             CREATE TABLE sales.targets(region VARCHAR);
             INSERT INTO users VALUES (1, 'ada'), (2, 'grace');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn describes_every_table_as_ddl() {
        let description = describe_schema(&seeded(), &SchemaOptions::default()).unwrap();

        assert!(description.contains("CREATE TABLE users (\n    id INTEGER NOT NULL,\n    name VARCHAR\n);"));
        assert!(description.contains("CREATE TABLE orders ("));
        assert!(description.contains("CREATE TABLE sales.targets ("));
        assert!(!description.contains("rows from"));
    }

    #[test]
    fn include_tables_limits_description() {
        let options = SchemaOptions {
            include_tables: Some(vec!["users".to_string(), "sales.targets".to_string()]),
            sample_rows: 0,
        };

        let description = describe_schema(&seeded(), &options).unwrap();

        assert!(description.contains("CREATE TABLE users ("));
        assert!(description.contains("CREATE TABLE sales.targets ("));
        assert!(!description.contains("orders"));
    }

    #[test]
    fn sample_rows_are_appended() {
        let options = SchemaOptions {
            include_tables: Some(vec!["users".to_string()]),
            sample_rows: 1,
        };

        let description = describe_schema(&seeded(), &options).unwrap();

        assert!(description.contains("/*\n1 rows from users table:\nid\tname\n"));
        assert!(description.ends_with("*/"));
    }

    #[test]
    fn empty_database_describes_nothing() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(describe_schema(&conn, &SchemaOptions::default()).unwrap(), "");
    }
}
