use super::SchemaText;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

// Statement ends at the first `;` immediately followed by a newline.
static CREATE_TABLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)CREATE TABLE .*?;\n").unwrap());

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("schema file is empty: {}", path.display())]
    EmptyInput { path: PathBuf },

    #[error("failed to read schema file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Reads a DDL file and keeps only its `CREATE TABLE` statements.
///
/// A file without any `CREATE TABLE` statement is not an error: a warning is logged and the
/// returned schema is empty.
pub fn load_schema(path: impl AsRef<Path>) -> Result<SchemaText, SchemaError> {
    let path = path.as_ref();

    let contents = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => SchemaError::NotFound {
            path: path.to_path_buf(),
        },
        _ => SchemaError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    if contents.trim().is_empty() {
        return Err(SchemaError::EmptyInput {
            path: path.to_path_buf(),
        });
    }

    let schema = extract_table_definitions(&contents);
    if schema.is_empty() {
        tracing::warn!(
            path = %path.display(),
            "no CREATE TABLE statements found; prompts will carry an empty schema section"
        );
    } else {
        tracing::debug!(path = %path.display(), bytes = schema.as_str().len(), "schema extracted");
    }

    Ok(schema)
}

/// Extracts every `CREATE TABLE ... ;\n` block from `ddl` and joins them with newlines.
pub fn extract_table_definitions(ddl: &str) -> SchemaText {
    let blocks: Vec<&str> = CREATE_TABLE_REGEX
        .find_iter(ddl)
        .map(|m| m.as_str())
        .collect();
    SchemaText::new(blocks.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn write_temp(contents: &str) -> PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "sqlcoder-schema-{}-{}.sql",
            std::process::id(),
            n
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    const DDL: &str = "\
-- pagila excerpt
SET statement_timeout = 0;

CREATE TABLE public.actor (
    actor_id integer NOT NULL,
    first_name text NOT NULL
);

CREATE INDEX idx_actor_last_name ON public.actor USING btree (last_name);

INSERT INTO public.actor VALUES (1, 'PENELOPE');

CREATE TABLE public.film (
    film_id integer NOT NULL,
    title text NOT NULL
);

GRANT ALL ON TABLE public.film TO postgres;
";

    #[test]
    fn test_extracts_blocks_in_file_order() {
        let schema = extract_table_definitions(DDL);
        let expected = "CREATE TABLE public.actor (\n    actor_id integer NOT NULL,\n    first_name text NOT NULL\n);\n\
                        \nCREATE TABLE public.film (\n    film_id integer NOT NULL,\n    title text NOT NULL\n);\n";
        assert_eq!(schema.as_str(), expected);
    }

    #[test]
    fn test_excludes_non_table_statements() {
        let schema = extract_table_definitions(DDL);
        assert!(!schema.as_str().contains("INSERT"));
        assert!(!schema.as_str().contains("CREATE INDEX"));
        assert!(!schema.as_str().contains("GRANT"));
        assert!(!schema.as_str().contains("--"));
    }

    #[test]
    fn test_semicolon_without_newline_does_not_terminate() {
        // `DEFAULT ';'` keeps going until a `;` that ends a line.
        let ddl = "CREATE TABLE t (a text DEFAULT ';' NOT NULL\n);\n";
        let schema = extract_table_definitions(ddl);
        assert_eq!(schema.as_str(), ddl);
    }

    #[test]
    fn test_trailing_comment_after_semicolon_is_not_matched() {
        let ddl = "CREATE TABLE t (a int); -- note\n";
        assert!(extract_table_definitions(ddl).is_empty());
    }

    #[test]
    fn test_load_schema_from_file() {
        let path = write_temp(DDL);
        let schema = load_schema(&path).unwrap();
        assert_eq!(schema.table_names(), vec!["public.actor", "public.film"]);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_schema_without_tables_returns_empty() {
        let path = write_temp("INSERT INTO actor VALUES (1);\n");
        let schema = load_schema(&path).unwrap();
        assert!(schema.is_empty());
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_schema_missing_file() {
        let err = load_schema("/definitely/not/here/schema.sql").unwrap_err();
        assert!(matches!(err, SchemaError::NotFound { .. }));
    }

    #[test]
    fn test_load_schema_whitespace_only_is_empty_input() {
        let path = write_temp("  \n\t\n");
        let err = load_schema(&path).unwrap_err();
        assert!(matches!(err, SchemaError::EmptyInput { .. }));
        std::fs::remove_file(path).ok();
    }
}
