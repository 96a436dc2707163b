//! Table introspection: primary key and column types, cached per table until dropped with `forget`.

use crate::cache::SharedCache;
use crate::db::{display_value, value_as_i64, Database, Dialect, Record};
use crate::error::SchemaError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

const MYSQL_COLUMNS: &str = "SELECT COLUMN_NAME AS column_name, DATA_TYPE AS data_type, \
     (COLUMN_KEY = 'PRI') AS is_primary \
     FROM INFORMATION_SCHEMA.COLUMNS \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
     ORDER BY ORDINAL_POSITION";

// The relation is resolved like any other statement would (search_path, "schema.table").
const POSTGRES_COLUMNS: &str = "SELECT a.attname::text AS column_name, \
     format_type(a.atttypid, a.atttypmod) AS data_type, \
     (i.indisprimary IS TRUE) AS is_primary \
     FROM pg_attribute a \
     LEFT JOIN pg_index i ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey) AND i.indisprimary \
     WHERE a.attrelid = to_regclass($1) AND a.attnum > 0 AND NOT a.attisdropped \
     ORDER BY a.attnum";

const NUMERIC_PREFIXES: &[&str] = &[
    "int", "bigint", "smallint", "tinyint", "mediumint", "serial", "float", "double", "real", "numeric", "decimal",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    /// Lower-cased type name as reported by the database (e.g. "varchar(500)", "character varying(64)", "integer").
    pub type_tag: String,
    pub is_primary_key: bool,
}

#[derive(Clone, Debug, Default)]
pub struct TableSchema {
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn primary_key(&self) -> Option<&str> {
        self.columns.iter().find(|c| c.is_primary_key).map(|c| c.name.as_str())
    }

    pub fn column_types(&self) -> HashMap<String, String> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.type_tag.clone()))
            .collect()
    }
}

/// Introspects tables through the generic query interface. Results are kept until the entity
/// declaration using the table changes (see [`SchemaIntrospector::forget`]).
pub struct SchemaIntrospector {
    db: Arc<dyn Database>,
    cache: SharedCache<String, Arc<TableSchema>>,
}

impl SchemaIntrospector {
    pub fn new(db: Arc<dyn Database>) -> Self {
        SchemaIntrospector {
            db,
            cache: SharedCache::new(),
        }
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.db
    }

    pub async fn table(&self, table: &str) -> Result<Arc<TableSchema>, SchemaError> {
        let key = table.to_string();
        self.cache
            .get_or_try_insert_with(&key, || async {
                let schema = self.introspect(table).await.map_err(|e| {
                    tracing::warn!(table = %table, error = %e, "schema introspection failed");
                    e
                })?;
                Ok::<_, SchemaError>(Arc::new(schema))
            })
            .await
    }

    /// Drop the cached schema of `table` so the next lookup queries the database again.
    pub fn forget(&self, table: &str) {
        if self.cache.remove(&table.to_string()).is_some() {
            tracing::debug!(table = %table, "schema cache entry dropped");
        }
    }

    pub async fn primary_key_of(&self, table: &str) -> Result<String, SchemaError> {
        let schema = self.table(table).await?;
        schema
            .primary_key()
            .map(str::to_string)
            .ok_or_else(|| SchemaError::NoPrimaryKey(table.to_string()))
    }

    pub async fn column_types_of(&self, table: &str) -> Result<HashMap<String, String>, SchemaError> {
        Ok(self.table(table).await?.column_types())
    }

    async fn introspect(&self, table: &str) -> Result<TableSchema, SchemaError> {
        let dialect = self.db.dialect();
        let rows = match dialect {
            Dialect::MySql => self.db.fetch_all(MYSQL_COLUMNS, &[Value::String(table.to_string())]).await,
            Dialect::Postgres => self.db.fetch_all(POSTGRES_COLUMNS, &[Value::String(postgres_relation(table))]).await,
            Dialect::Sqlite => {
                let sql = format!("PRAGMA table_info(\"{}\")", table.replace('"', "\"\""));
                self.db.fetch_all(&sql, &[]).await
            }
        }
        .map_err(|source| SchemaError::Db {
            table: table.to_string(),
            source,
        })?;
        if rows.is_empty() {
            return Err(SchemaError::TableNotFound(table.to_string()));
        }
        let columns = rows.iter().map(|r| column_from_row(dialect, r)).collect();
        tracing::debug!(table = %table, dialect = dialect.name(), "introspected table");
        Ok(TableSchema { columns })
    }
}

/// Argument of `to_regclass`: the table name quoted per dotted part.
fn postgres_relation(table: &str) -> String {
    crate::sql::quoted(Dialect::Postgres, table)
}

fn truthy(v: Option<&Value>) -> bool {
    match v {
        Some(Value::Bool(b)) => *b,
        Some(other) => value_as_i64(other) != 0,
        None => false,
    }
}

fn column_from_row(dialect: Dialect, row: &Record) -> ColumnSchema {
    let text = |k: &str| row.get(k).map(display_value).unwrap_or_default();
    match dialect {
        Dialect::Sqlite => ColumnSchema {
            name: text("name"),
            type_tag: text("type").to_lowercase(),
            is_primary_key: truthy(row.get("pk")),
        },
        Dialect::Postgres | Dialect::MySql => ColumnSchema {
            name: text("column_name"),
            type_tag: text("data_type").to_lowercase(),
            is_primary_key: truthy(row.get("is_primary")),
        },
    }
}

/// True for integer and decimal column types (prefix match on the type tag).
pub fn is_numeric_type(type_tag: &str) -> bool {
    let t = type_tag.trim().to_lowercase();
    NUMERIC_PREFIXES.iter().any(|p| t.starts_with(p))
}

/// True for native boolean columns ("boolean", "bool"). MySQL's tinyint(1) stays numeric.
pub fn is_boolean_type(type_tag: &str) -> bool {
    matches!(type_tag.trim().to_lowercase().as_str(), "boolean" | "bool")
}

/// Text-like columns that get a textarea editor: any "text" type, json, or a bounded string longer than 255.
pub fn is_long_text_type(type_tag: &str) -> bool {
    let t = type_tag.trim().to_lowercase();
    if t.contains("text") || t == "json" {
        return true;
    }
    let bounded = t.starts_with("varchar(") || t.starts_with("character varying(");
    bounded && extract_type_length(&t) > 255
}

/// Declared length of a type such as "varchar(500)"; 0 when absent or unparsable.
pub fn extract_type_length(type_tag: &str) -> usize {
    let (Some(start), Some(end)) = (type_tag.find('('), type_tag.find(')')) else {
        return 0;
    };
    if start > end {
        return 0;
    }
    type_tag[start + 1..end].trim().parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_lookup_is_one_relation() {
        assert_eq!(postgres_relation("orders"), "\"orders\"");
        assert_eq!(postgres_relation("audit.Orders"), "\"audit\".\"Orders\"");
        assert!(POSTGRES_COLUMNS.contains("a.attrelid = to_regclass($1)"));
        assert!(!POSTGRES_COLUMNS.contains("relname"));
    }

    #[test]
    fn numeric_classification() {
        for t in ["int", "integer", "bigint", "smallint(6)", "tinyint(1)", "serial", "numeric(10,2)", "double precision", "real", "decimal"] {
            assert!(is_numeric_type(t), "{t}");
        }
        for t in ["varchar(20)", "text", "date", "timestamp without time zone", "boolean"] {
            assert!(!is_numeric_type(t), "{t}");
        }
    }

    #[test]
    fn boolean_classification() {
        assert!(is_boolean_type("boolean"));
        assert!(is_boolean_type("BOOL"));
        assert!(!is_boolean_type("tinyint(1)"));
        assert!(!is_boolean_type("integer"));
    }

    #[test]
    fn long_text_classification() {
        assert!(is_long_text_type("text"));
        assert!(is_long_text_type("mediumtext"));
        assert!(is_long_text_type("json"));
        assert!(is_long_text_type("varchar(500)"));
        assert!(is_long_text_type("character varying(1024)"));
        assert!(!is_long_text_type("varchar(255)"));
        assert!(!is_long_text_type("varchar"));
        assert!(!is_long_text_type("jsonb"));
        assert!(!is_long_text_type("integer"));
    }

    #[test]
    fn type_length() {
        assert_eq!(extract_type_length("varchar(500)"), 500);
        assert_eq!(extract_type_length("varchar"), 0);
        assert_eq!(extract_type_length("numeric(10,2)"), 0);
    }
}
