//! Database schema text used to condition the model.

mod loader;

pub use loader::{extract_table_definitions, load_schema, SchemaError};

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static TABLE_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^CREATE TABLE\s+(?:IF NOT EXISTS\s+)?([A-Za-z0-9_."]+)"#).unwrap()
});

/// Concatenated `CREATE TABLE` statements, in the order they appear in the source file.
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaText(String);

impl SchemaText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Table names declared by the extracted statements (schema-qualified if the DDL qualifies them).
    pub fn table_names(&self) -> Vec<String> {
        self.0
            .lines()
            .filter_map(|line| TABLE_NAME_REGEX.captures(line))
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim_matches('"').to_string())
            .collect()
    }
}

impl fmt::Display for SchemaText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names_in_order() {
        let schema = SchemaText::new(
            "CREATE TABLE public.actor (\n    actor_id integer NOT NULL\n);\n\n\
             CREATE TABLE IF NOT EXISTS film (\n    film_id integer\n);\n",
        );
        assert_eq!(schema.table_names(), vec!["public.actor", "film"]);
    }

    #[test]
    fn test_empty_schema_has_no_tables() {
        let schema = SchemaText::default();
        assert!(schema.is_empty());
        assert!(schema.table_names().is_empty());
    }
}
