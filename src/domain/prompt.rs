//! Prompt template for sqlcoder-style models and extraction of the SQL answer.

use crate::domain::schema::SchemaText;

pub const SCHEMA_HEADER: &str = "### Postgres SQL tables, with their properties:";
pub const TASK_HEADER: &str = "### Task";
/// Separates the instructions from the generated answer.
pub const SQL_MARKER: &str = "### SQL query";

/// Builds the full prompt sent to the model.
pub fn build_prompt(schema: &SchemaText, question: &str) -> String {
    format!("{SCHEMA_HEADER}\n{schema}\n\n{TASK_HEADER}\n{question}\n\n{SQL_MARKER}\n")
}

/// Keeps the text after the last [`SQL_MARKER`], trimmed.
///
/// Output without the marker is taken as a whole. Returns `None` when nothing but whitespace
/// is left.
pub fn extract_sql(generated: &str) -> Option<&str> {
    let tail = generated.rsplit(SQL_MARKER).next().unwrap_or(generated);
    let sql = tail.trim();
    (!sql.is_empty()).then_some(sql)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt_matches_template() {
        let schema = SchemaText::new("CREATE TABLE film (film_id int);\n");
        let prompt = build_prompt(&schema, "How many films are there?");
        assert_eq!(
            prompt,
            "### Postgres SQL tables, with their properties:\n\
             CREATE TABLE film (film_id int);\n\n\n\
             ### Task\n\
             How many films are there?\n\n\
             ### SQL query\n"
        );
    }

    #[test]
    fn test_build_prompt_with_empty_schema() {
        let prompt = build_prompt(&SchemaText::default(), "q");
        assert_eq!(
            prompt,
            "### Postgres SQL tables, with their properties:\n\n\n### Task\nq\n\n### SQL query\n"
        );
    }

    #[test]
    fn test_extract_sql_after_marker() {
        let out = "noise ### SQL query   SELECT * FROM film;  ";
        assert_eq!(extract_sql(out), Some("SELECT * FROM film;"));
    }

    #[test]
    fn test_extract_sql_uses_last_marker() {
        let out = "### SQL query\nSELECT 1;\n### SQL query\nSELECT 2;\n";
        assert_eq!(extract_sql(out), Some("SELECT 2;"));
    }

    #[test]
    fn test_extract_sql_without_marker_keeps_everything() {
        assert_eq!(
            extract_sql("  SELECT count(*) FROM actor;\n"),
            Some("SELECT count(*) FROM actor;")
        );
    }

    #[test]
    fn test_extract_sql_empty() {
        assert_eq!(extract_sql("   \n"), None);
        assert_eq!(extract_sql("SELECT 1; ### SQL query  \n"), None);
    }
}
