//! Builds parameterized statements for entity tables. Identifiers come from configuration only
//! and are quoted; values are always bound. Filter and ordering fragments are trusted config text.

use crate::db::Dialect;
use serde_json::Value;
use std::collections::HashMap;

/// Quote identifier for the dialect. Dotted names ("schema.table") are quoted per part.
pub fn quoted(dialect: Dialect, s: &str) -> String {
    s.split('.')
        .map(|part| match dialect {
            Dialect::MySql => format!("`{}`", part.replace('`', "``")),
            Dialect::Postgres | Dialect::Sqlite => format!("\"{}\"", part.replace('"', "\"\"")),
        })
        .collect::<Vec<_>>()
        .join(".")
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
    dialect: Dialect,
}

impl QueryBuf {
    fn new(dialect: Dialect) -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
            dialect,
        }
    }

    /// Add a parameter and return its placeholder. PostgreSQL placeholders are cast to `cast` when given.
    fn push_param(&mut self, v: Value, cast: Option<&str>) -> String {
        self.params.push(v);
        match self.dialect {
            Dialect::Postgres => {
                let n = self.params.len();
                match cast {
                    Some(t) if !t.is_empty() => format!("${}::{}", n, t),
                    _ => format!("${}", n),
                }
            }
            Dialect::MySql | Dialect::Sqlite => "?".to_string(),
        }
    }

    fn q(&self, ident: &str) -> String {
        quoted(self.dialect, ident)
    }
}

fn where_suffix(where_clause: &str) -> String {
    if where_clause.trim().is_empty() {
        String::new()
    } else {
        format!(" WHERE ({})", where_clause.trim())
    }
}

/// SELECT COUNT(*) AS cnt with the entity filter.
pub fn count_rows(dialect: Dialect, table: &str, where_clause: &str) -> QueryBuf {
    let mut q = QueryBuf::new(dialect);
    q.sql = format!("SELECT COUNT(*) AS cnt FROM {}{}", q.q(table), where_suffix(where_clause));
    q
}

/// One page of rows with the entity filter and ordering.
pub fn select_page(
    dialect: Dialect,
    table: &str,
    where_clause: &str,
    order_by: &str,
    limit: u32,
    offset: u64,
) -> QueryBuf {
    let mut q = QueryBuf::new(dialect);
    let order_clause = if order_by.trim().is_empty() {
        String::new()
    } else {
        format!(" ORDER BY {}", order_by.trim())
    };
    q.sql = format!(
        "SELECT * FROM {}{}{} LIMIT {} OFFSET {}",
        q.q(table),
        where_suffix(where_clause),
        order_clause,
        limit,
        offset
    );
    q
}

fn and_filter(where_clause: &str) -> String {
    if where_clause.trim().is_empty() {
        String::new()
    } else {
        format!(" AND ({})", where_clause.trim())
    }
}

/// SELECT * by primary key, additionally constrained by the entity filter.
pub fn select_by_key(dialect: Dialect, table: &str, pk: &str, id: &Value, where_clause: &str) -> QueryBuf {
    let mut q = QueryBuf::new(dialect);
    let ph = q.push_param(id.clone(), None);
    q.sql = format!("SELECT * FROM {} WHERE {} = {}{}", q.q(table), q.q(pk), ph, and_filter(where_clause));
    q
}

/// Selected columns of one row by primary key, within the entity filter (original values before an update).
pub fn select_columns_by_key(
    dialect: Dialect,
    table: &str,
    columns: &[String],
    pk: &str,
    id: &Value,
    where_clause: &str,
) -> QueryBuf {
    let mut q = QueryBuf::new(dialect);
    let ph = q.push_param(id.clone(), None);
    let cols = columns.iter().map(|c| q.q(c)).collect::<Vec<_>>().join(", ");
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}{}",
        cols,
        q.q(table),
        q.q(pk),
        ph,
        and_filter(where_clause)
    );
    q
}

/// Display value of a related row.
pub fn select_related_value(dialect: Dialect, table: &str, value_col: &str, key_col: &str, key: &Value) -> QueryBuf {
    let mut q = QueryBuf::new(dialect);
    let ph = q.push_param(key.clone(), None);
    q.sql = format!(
        "SELECT {} AS value FROM {} WHERE {} = {}",
        q.q(value_col),
        q.q(table),
        q.q(key_col),
        ph
    );
    q
}

/// Key/value pairs for a select editor.
pub fn select_related_options(
    dialect: Dialect,
    table: &str,
    key_col: &str,
    value_col: &str,
    where_clause: Option<&str>,
    order_by: Option<&str>,
) -> QueryBuf {
    let mut q = QueryBuf::new(dialect);
    let order = match order_by.map(str::trim).filter(|o| !o.is_empty()) {
        Some(o) => format!(" ORDER BY {}", o),
        None => String::new(),
    };
    q.sql = format!(
        "SELECT {} AS option_key, {} AS option_value FROM {}{}{}",
        q.q(key_col),
        q.q(value_col),
        q.q(table),
        where_suffix(where_clause.unwrap_or("")),
        order
    );
    q
}

/// COUNT of rows in `table` whose `target_field` equals `value`.
pub fn count_related(dialect: Dialect, table: &str, target_field: &str, value: &Value) -> QueryBuf {
    let mut q = QueryBuf::new(dialect);
    let ph = q.push_param(value.clone(), None);
    q.sql = format!(
        "SELECT COUNT(*) AS cnt FROM {} WHERE {} = {}",
        q.q(table),
        q.q(target_field),
        ph
    );
    q
}

/// INSERT of the given columns, returning the primary key. Placeholders are cast to the
/// introspected column type on PostgreSQL so text payload values bind to typed columns.
pub fn insert(
    dialect: Dialect,
    table: &str,
    data: &[(String, Value)],
    column_types: &HashMap<String, String>,
    pk: &str,
) -> QueryBuf {
    let mut q = QueryBuf::new(dialect);
    let mut cols = Vec::with_capacity(data.len());
    let mut placeholders = Vec::with_capacity(data.len());
    for (col, val) in data {
        let cast = column_types.get(col).map(String::as_str);
        placeholders.push(q.push_param(val.clone(), cast));
        cols.push(q.q(col));
    }
    let returning = match dialect {
        Dialect::Postgres | Dialect::Sqlite => format!(" RETURNING {}", q.q(pk)),
        Dialect::MySql => String::new(),
    };
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}){}",
        q.q(table),
        cols.join(", "),
        placeholders.join(", "),
        returning
    );
    q
}

/// UPDATE the given columns of one row by primary key.
pub fn update(
    dialect: Dialect,
    table: &str,
    data: &[(String, Value)],
    column_types: &HashMap<String, String>,
    pk: &str,
    id: &Value,
    where_clause: &str,
) -> QueryBuf {
    let mut q = QueryBuf::new(dialect);
    let mut sets = Vec::with_capacity(data.len());
    for (col, val) in data {
        let cast = column_types.get(col).map(String::as_str);
        let ph = q.push_param(val.clone(), cast);
        sets.push(format!("{} = {}", q.q(col), ph));
    }
    let id_ph = q.push_param(id.clone(), None);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {}{}",
        q.q(table),
        sets.join(", "),
        q.q(pk),
        id_ph,
        and_filter(where_clause)
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quotes_per_dialect() {
        assert_eq!(quoted(Dialect::Postgres, "public.users"), "\"public\".\"users\"");
        assert_eq!(quoted(Dialect::MySql, "users"), "`users`");
        assert_eq!(quoted(Dialect::Sqlite, "we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn page_query_includes_filter_order_and_window() {
        let q = select_page(Dialect::Sqlite, "orders", "status = 'open'", "id DESC", 100, 200);
        assert_eq!(
            q.sql,
            "SELECT * FROM \"orders\" WHERE (status = 'open') ORDER BY id DESC LIMIT 100 OFFSET 200"
        );
        assert!(q.params.is_empty());
    }

    #[test]
    fn postgres_insert_casts_to_column_types() {
        let types = HashMap::from([("qty".to_string(), "integer".to_string())]);
        let data = vec![("qty".to_string(), json!("3")), ("note".to_string(), json!("x"))];
        let q = insert(Dialect::Postgres, "orders", &data, &types, "id");
        assert_eq!(
            q.sql,
            "INSERT INTO \"orders\" (\"qty\", \"note\") VALUES ($1::integer, $2) RETURNING \"id\""
        );
        assert_eq!(q.params, vec![json!("3"), json!("x")]);
    }

    #[test]
    fn update_binds_id_last() {
        let data = vec![("status".to_string(), json!("closed"))];
        let q = update(Dialect::Sqlite, "orders", &data, &HashMap::new(), "id", &json!(7), "");
        assert_eq!(q.sql, "UPDATE \"orders\" SET \"status\" = ? WHERE \"id\" = ?");
        assert_eq!(q.params, vec![json!("closed"), json!(7)]);
    }

    #[test]
    fn update_stays_within_entity_filter() {
        let data = vec![("is_active".to_string(), json!(true))];
        let types = HashMap::from([("is_active".to_string(), "boolean".to_string())]);
        let q = update(Dialect::Postgres, "orders", &data, &types, "id", &json!(7), "tenant_id = 4");
        assert_eq!(
            q.sql,
            "UPDATE \"orders\" SET \"is_active\" = $1::boolean WHERE \"id\" = $2 AND (tenant_id = 4)"
        );
        assert_eq!(q.params, vec![json!(true), json!(7)]);

        let cols = vec!["status".to_string()];
        let q = select_columns_by_key(Dialect::Sqlite, "orders", &cols, "id", &json!(7), "tenant_id = 4");
        assert_eq!(q.sql, "SELECT \"status\" FROM \"orders\" WHERE \"id\" = ? AND (tenant_id = 4)");
    }

    #[test]
    fn key_lookup_with_entity_filter() {
        let q = select_by_key(Dialect::Postgres, "orders", "id", &json!(7), "customer_id = 3");
        assert_eq!(q.sql, "SELECT * FROM \"orders\" WHERE \"id\" = $1 AND (customer_id = 3)");
    }
}
