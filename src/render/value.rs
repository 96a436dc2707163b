//! Value rendering pipeline: raw cell value to display markup plus cell attributes.
//! Never fails; every problem degrades to a marker, a fallback value or a log line.

use crate::case::{invert_case_style, to_snake_case};
use crate::config::{ColumnFunc, EditorKind, FieldPolicy, LoadedEntity};
use crate::context::RequestContext;
use crate::db::{display_value, value_as_i64, Database, Record};
use crate::hooks::Hooks;
use crate::render::datetime::format_datetime;
use crate::render::html::{escape, escape_attr, toggle_switch};
use crate::settings::Settings;
use crate::sql;
use serde_json::Value;
use std::collections::HashMap;

/// Related-value lookups of one render call, keyed by "table.value_field" and raw value.
#[derive(Debug, Default)]
pub struct RenderCache {
    related: HashMap<String, String>,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.related.get(key)
    }

    pub fn len(&self) -> usize {
        self.related.len()
    }

    pub fn is_empty(&self) -> bool {
        self.related.is_empty()
    }

    fn insert(&mut self, key: String, value: String) {
        self.related.insert(key, value);
    }
}

/// Cache key of a related lookup, e.g. "customers.name_3".
pub fn related_cache_key(table_and_field: &str, raw: &str) -> String {
    format!("{}_{}", table_and_field, raw)
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderedValue {
    /// Cell content, safe to embed.
    pub html: String,
    /// Attribute string for the enclosing cell (leading space, or empty).
    pub attrs: String,
}

/// Collaborators needed while rendering.
pub struct RenderEnv<'a> {
    pub db: &'a dyn Database,
    pub ctx: &'a RequestContext,
    pub hooks: &'a Hooks,
    pub settings: &'a Settings,
}

enum Cell {
    Text(String),
    Html(String),
}

impl Cell {
    fn into_html(self) -> String {
        match self {
            Cell::Text(t) => escape(&t),
            Cell::Html(h) => h,
        }
    }
}

/// Value of `field` in `record`: exact name, then case-inverted name; null and absent are empty.
pub fn field_value<'r>(record: &'r Record, field: &str) -> Option<&'r Value> {
    match record.get(field) {
        Some(v) if !v.is_null() => Some(v),
        _ => record.get(&invert_case_style(field)).filter(|v| !v.is_null()),
    }
}

fn int_of(text: &str) -> i64 {
    let t = text.trim();
    t.parse::<i64>()
        .ok()
        .or_else(|| t.parse::<f64>().ok().map(|f| f as i64))
        .unwrap_or(0)
}

fn cell_attrs(entity: &LoadedEntity, field: &str, policy: Option<&FieldPolicy>) -> String {
    let mut classes: Vec<String> = Vec::new();
    if field == "id" || field == "ID" || entity.config.primary_key.as_deref() == Some(field) {
        classes.push("rec_id".into());
    }
    let mut extra = String::new();
    if let Some(p) = policy {
        if !p.classes.is_empty() {
            classes.push(p.classes.clone());
        }
        if p.editable {
            classes.push(format!("editable editable-{}", p.editor.as_str()));
            extra = format!(" data-field=\"{}\"", escape_attr(&to_snake_case(field)));
        }
    }
    if classes.is_empty() {
        return extra;
    }
    format!(" class=\"{}\"{}", escape_attr(&classes.join(" ")), extra)
}

fn primary_key_text(entity: &LoadedEntity, record: &Record) -> Option<String> {
    let pk = entity.config.primary_key.as_deref()?;
    record.get(pk).filter(|v| !v.is_null()).map(display_value)
}

fn substitute_link(template: &str, record: &Record, parent_query: &str) -> String {
    let mut link = template.to_string();
    for (key, val) in record {
        let placeholder = format!("${}$", key);
        if link.contains(&placeholder) {
            link = link.replace(&placeholder, &urlencoding::encode(&display_value(val)));
        }
    }
    if parent_query.is_empty() {
        link
    } else if link.contains('?') {
        format!("{}&{}", link, &parent_query[1..])
    } else {
        format!("{}{}", link, parent_query)
    }
}

async fn related_lookup(env: &RenderEnv<'_>, entity: &LoadedEntity, field: &str, p: &FieldPolicy, text: String, cache: &mut RenderCache) -> String {
    let Some(binding) = &p.related else {
        return text;
    };
    let key = related_cache_key(&binding.table_and_field(), &text);
    if let Some(hit) = cache.get(&key) {
        return hit.clone();
    }
    let num = int_of(&text);
    if num == 0 {
        return text;
    }
    let q = sql::select_related_value(
        env.db.dialect(),
        &binding.table,
        &binding.value_field,
        &binding.key_field,
        &Value::from(num),
    );
    let resolved = match env.ctx.bounded(env.db.fetch_optional(&q.sql, &q.params)).await {
        Ok(Some(row)) => row.get("value").map(display_value).unwrap_or_default(),
        Ok(None) => {
            tracing::warn!(entity = entity.name(), field, table = %binding.table, key = num, "related row not found");
            format!("#{}", text)
        }
        Err(e) => {
            tracing::warn!(entity = entity.name(), field, table = %binding.table, key = num, error = %e, "related lookup failed");
            format!("#{}", text)
        }
    };
    cache.insert(key, resolved.clone());
    resolved
}

async fn count_related(env: &RenderEnv<'_>, entity: &LoadedEntity, field: &str, p: &FieldPolicy, record: &Record) -> i64 {
    let Some(count) = &p.count else {
        return 0;
    };
    let Some(fk) = record.get(&count.local_field).filter(|v| !v.is_null()) else {
        return 0;
    };
    let q = sql::count_related(env.db.dialect(), &count.table, &count.target_field, fk);
    match env.ctx.bounded(env.db.fetch_optional(&q.sql, &q.params)).await {
        Ok(row) => row.and_then(|r| r.get("cnt").map(value_as_i64)).unwrap_or(0),
        Err(e) => {
            tracing::warn!(entity = entity.name(), field, table = %count.table, error = %e, "count failed");
            0
        }
    }
}

/// Render one field of one record.
pub async fn render_value(
    env: &RenderEnv<'_>,
    entity: &LoadedEntity,
    field: &str,
    record: &Record,
    cache: &mut RenderCache,
) -> RenderedValue {
    let raw = field_value(record, field).cloned().unwrap_or_else(|| Value::String(String::new()));
    let policy = entity.config.policy(field);
    let attrs = cell_attrs(entity, field, policy);
    let Some(p) = policy else {
        return RenderedValue {
            html: escape(&display_value(&raw)),
            attrs,
        };
    };

    let mut cell = Cell::Text(display_value(&raw));

    if let Some(func) = &p.column_func {
        cell = match func {
            ColumnFunc::RecordControls => {
                let id = primary_key_text(entity, record).unwrap_or_default();
                let url = format!(
                    "{}/update{}",
                    env.settings.record_url(entity.name(), &id),
                    entity.parent_query
                );
                Cell::Html(format!(
                    "<a href=\"{}\"><i class=\"bi-pen record-control-update\"></i></a>",
                    escape_attr(&url)
                ))
            }
            ColumnFunc::Dynamic => match &env.hooks.dynamic_column {
                Some(producer) => Cell::Html(
                    producer
                        .render(env.ctx, env.db, &entity.config.table, field, record)
                        .await,
                ),
                None => Cell::Text("!Dynamic column callback not set".into()),
            },
            ColumnFunc::Unknown(name) => Cell::Text(format!("!Unknown columnDataFunc: {}", name)),
        };
    }

    if p.related.is_some() {
        if let Cell::Text(text) = cell {
            cell = Cell::Text(related_lookup(env, entity, field, p, text, cache).await);
        }
    }

    if p.count.is_some() {
        cell = Cell::Text(count_related(env, entity, field, p, record).await.to_string());
    }

    let link = p
        .link
        .as_deref()
        .map(|t| substitute_link(t, record, &entity.parent_query));

    if let Some(format) = &p.date_format {
        cell = Cell::Text(format_datetime(&raw, format));
    }

    if p.editor == EditorKind::ToggleSwitch {
        let id = primary_key_text(entity, record);
        return RenderedValue {
            html: toggle_switch(field, &display_value(&raw), id.as_deref(), !p.editable),
            attrs,
        };
    }

    let inner = cell.into_html();
    let html = match link {
        Some(href) => format!("<a href=\"{}\">{}</a>", escape_attr(&href), inner),
        None => inner,
    };
    RenderedValue { html, attrs }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn falls_back_to_inverted_name() {
        let mut r = Record::new();
        r.insert("customer_id".into(), json!(3));
        r.insert("note".into(), Value::Null);
        assert_eq!(field_value(&r, "customerId"), Some(&json!(3)));
        assert_eq!(field_value(&r, "note"), None);
        assert_eq!(field_value(&r, "missing"), None);
    }

    #[test]
    fn link_substitution_uses_whole_record() {
        let mut r = Record::new();
        r.insert("id".into(), json!(7));
        r.insert("slug".into(), json!("a b"));
        assert_eq!(substitute_link("/x/$id$/$slug$", &r, ""), "/x/7/a%20b");
        assert_eq!(substitute_link("/x/$id$", &r, "?order_id=3"), "/x/7?order_id=3");
        assert_eq!(substitute_link("/x?id=$id$", &r, "?order_id=3"), "/x?id=7&order_id=3");
    }

    #[test]
    fn integer_extraction() {
        assert_eq!(int_of("3"), 3);
        assert_eq!(int_of(" 3 "), 3);
        assert_eq!(int_of("3.0"), 3);
        assert_eq!(int_of("abc"), 0);
        assert_eq!(int_of(""), 0);
    }

    #[test]
    fn cache_key_format() {
        assert_eq!(related_cache_key("customers.name", "3"), "customers.name_3");
    }
}
