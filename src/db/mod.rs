//! Generic query interface the core talks to, plus sqlx-backed implementations.

mod postgres;
mod sqlite;

pub use postgres::PgDatabase;
pub use sqlite::SqliteDatabase;

use async_trait::async_trait;
use serde_json::Value;

/// One fetched row, keyed by column name.
pub type Record = serde_json::Map<String, Value>;

/// SQL dialect: decides placeholder style, identifier quoting and introspection queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }
}

#[async_trait]
pub trait Database: Send + Sync {
    fn dialect(&self) -> Dialect;

    async fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>, sqlx::Error>;

    async fn fetch_optional(&self, sql: &str, params: &[Value]) -> Result<Option<Record>, sqlx::Error> {
        Ok(self.fetch_all(sql, params).await?.into_iter().next())
    }

    /// Statement without result rows. Returns rows affected.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, sqlx::Error>;

    /// Run an INSERT built with `RETURNING <pk>` and return the new key.
    async fn insert_returning(&self, sql: &str, params: &[Value], pk: &str) -> Result<Value, sqlx::Error> {
        let row = self.fetch_optional(sql, params).await?.ok_or(sqlx::Error::RowNotFound)?;
        Ok(row.get(pk).cloned().unwrap_or(Value::Null))
    }
}

/// Text form of a cell or payload value, as used for display and change detection.
pub fn display_value(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Integer view of a value: numbers are truncated, numeric strings parsed, everything else is 0.
pub fn value_as_i64(v: &Value) -> i64 {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}

/// Path/payload id as a bind value: integers when the text is an integer, strings otherwise.
pub fn id_value(id: &str) -> Value {
    match id.trim().parse::<i64>() {
        Ok(n) => Value::Number(n.into()),
        Err(_) => Value::String(id.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_view_of_values() {
        assert_eq!(value_as_i64(&json!(3)), 3);
        assert_eq!(value_as_i64(&json!(3.9)), 3);
        assert_eq!(value_as_i64(&json!("12")), 12);
        assert_eq!(value_as_i64(&json!("abc")), 0);
        assert_eq!(value_as_i64(&Value::Null), 0);
    }

    #[test]
    fn display_of_values() {
        assert_eq!(display_value(&Value::Null), "");
        assert_eq!(display_value(&json!("x")), "x");
        assert_eq!(display_value(&json!(42)), "42");
        assert_eq!(display_value(&json!(42.5)), "42.5");
    }

    #[test]
    fn ids_bind_as_integers_when_possible() {
        assert_eq!(id_value("7"), json!(7));
        assert_eq!(id_value("a-7"), json!("a-7"));
    }
}
