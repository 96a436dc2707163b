//! Parse the raw `SELECT key, value FROM table [WHERE ...] [ORDER BY ...]` form of a related-data binding.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedSelect {
    pub fields: Vec<String>,
    pub table: String,
    pub where_clause: Option<String>,
    pub order_by: Option<String>,
}

fn select_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)^\s*select\s+(.+?)\s+from\s+([^\s;]+)(?:\s+where\s+(.+?))?(?:\s+order\s+by\s+(.+?))?\s*;?\s*$",
        )
        .expect("select pattern is valid")
    })
}

/// Parse a two-column SELECT. Returns None unless exactly two columns and a FROM table are present.
pub fn parse_select(raw: &str) -> Option<ParsedSelect> {
    let caps = select_regex().captures(raw)?;
    let fields: Vec<String> = caps[1].split(',').map(|f| f.trim().to_string()).collect();
    if fields.len() != 2 || fields.iter().any(String::is_empty) {
        return None;
    }
    let table = caps[2].trim().to_string();
    if table.is_empty() {
        return None;
    }
    Some(ParsedSelect {
        fields,
        table,
        where_clause: caps.get(3).map(|m| m.as_str().trim().to_string()),
        order_by: caps.get(4).map(|m| m.as_str().trim().to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_statement() {
        let raw = "SELECT id, name FROM users WHERE active = 1 ORDER BY name;";
        let p = parse_select(raw).unwrap();
        assert_eq!(p.fields, vec!["id", "name"]);
        assert_eq!(p.table, "users");
        assert_eq!(p.where_clause.as_deref(), Some("active = 1"));
        assert_eq!(p.order_by.as_deref(), Some("name"));
    }

    #[test]
    fn parses_without_where() {
        let p = parse_select("SELECT user_id, username FROM web_users ORDER BY username").unwrap();
        assert_eq!(p.table, "web_users");
        assert_eq!(p.where_clause, None);
        assert_eq!(p.order_by.as_deref(), Some("username"));
    }

    #[test]
    fn parses_minimal_statement() {
        let p = parse_select("select a, b from table;").unwrap();
        assert_eq!(p.fields, vec!["a", "b"]);
        assert_eq!(p.table, "table");
        assert_eq!(p.where_clause, None);
        assert_eq!(p.order_by, None);
    }

    #[test]
    fn rejects_wrong_shapes() {
        assert!(parse_select("SELECT onlyone FROM test;").is_none());
        assert!(parse_select("SELECT a, b, c FROM test").is_none());
        assert!(parse_select("invalid syntax").is_none());
        assert!(parse_select("SELECT a, b").is_none());
    }
}
