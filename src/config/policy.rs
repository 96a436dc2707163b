//! Field policy resolution: declarative rules merged with introspected column types.
//! Pure function of its inputs; related-table primary keys are looked up by the caller.

use crate::case::{invert_case_style, to_snake_case};
use crate::config::resolved::{
    ColumnFunc, CountBinding, DisplayModes, EditorKind, FieldPolicy, RelatedDataBinding,
};
use crate::config::types::{EntityDeclaration, RelatedDataDecl};
use crate::error::ConfigError;
use crate::schema::is_long_text_type;
use crate::sql::parse_select;
use std::collections::HashMap;

/// Field names that get a toggle-switch editor unless something else was declared.
const TOGGLE_FIELDS: &[&str] = &["is_active", "isActive"];

pub struct PolicyInput<'a> {
    pub entity: &'a str,
    pub decl: &'a EntityDeclaration,
    pub primary_key: Option<&'a str>,
    pub column_types: &'a HashMap<String, String>,
    /// Primary keys of tables referenced by related-data bindings without an explicit key field.
    pub related_keys: &'a HashMap<String, String>,
    /// URL prefix for the "self" link preset.
    pub base_path: &'a str,
}

#[derive(Debug, Default)]
pub struct ResolvedPolicies {
    pub policies: HashMap<String, FieldPolicy>,
    /// Auxiliary presentation directives (editor initialisation), in field-name order.
    pub directives: Vec<String>,
}

fn entry<'m>(policies: &'m mut HashMap<String, FieldPolicy>, field: &str) -> &'m mut FieldPolicy {
    policies
        .entry(field.to_string())
        .or_insert_with(|| FieldPolicy::new(field))
}

/// Look up a per-field declaration by exact name, then by the case-inverted name.
fn lookup<'m>(map: &'m HashMap<String, String>, field: &str) -> Option<&'m String> {
    map.get(field).or_else(|| map.get(&invert_case_style(field)))
}

fn column_type<'m>(types: &'m HashMap<String, String>, field: &str) -> &'m str {
    types
        .get(field)
        .or_else(|| types.get(&to_snake_case(field)))
        .map(String::as_str)
        .unwrap_or("")
}

fn apply_labels(p: &mut FieldPolicy, decl: &EntityDeclaration) {
    let field = p.field.clone();
    p.header = lookup(&decl.headers, &field).cloned().unwrap_or(field.clone());
    p.title = lookup(&decl.titles, &field).cloned();
    p.display = DisplayModes::parse(lookup(&decl.display_mode, &field).map(String::as_str).unwrap_or(""));
}

fn related_binding(
    entity: &str,
    field: &str,
    decl: &RelatedDataDecl,
    related_keys: &HashMap<String, String>,
) -> Option<RelatedDataBinding> {
    match decl {
        RelatedDataDecl::Columns {
            table,
            value_field,
            key_field,
            order_by,
        } => {
            let key = match key_field.clone().or_else(|| related_keys.get(table).cloned()) {
                Some(k) => k,
                None => {
                    tracing::warn!(entity, field, table = %table, "related table has no known primary key, binding dropped");
                    return None;
                }
            };
            Some(RelatedDataBinding {
                table: table.clone(),
                key_field: key,
                value_field: value_field.clone(),
                order_by: order_by.clone(),
                where_clause: None,
            })
        }
        RelatedDataDecl::RawSql(raw) => match parse_select(raw) {
            Some(parsed) => Some(RelatedDataBinding {
                table: parsed.table,
                key_field: parsed.fields[0].clone(),
                value_field: parsed.fields[1].clone(),
                order_by: parsed.order_by,
                where_clause: parsed.where_clause,
            }),
            None => {
                tracing::warn!(entity, field, sql = %raw, "related data statement must select two columns from one table, binding dropped");
                None
            }
        },
    }
}

fn editor_directive(field: &str, editor: EditorKind, options: &serde_json::Map<String, serde_json::Value>) -> String {
    let mut opts = options.clone();
    opts.remove("type");
    format!(
        "<script>window.tabulaEditors = window.tabulaEditors || {{}}; window.tabulaEditors[{}] = {{\"type\": \"{}\", \"options\": {}}};</script>",
        serde_json::Value::String(field.to_string()),
        editor.as_str(),
        serde_json::Value::Object(opts)
    )
}

/// Resolve the policy of every referenced field. Later steps may overwrite earlier ones.
pub fn resolve_policies(input: &PolicyInput<'_>) -> Result<ResolvedPolicies, ConfigError> {
    let decl = input.decl;
    let mut policies: HashMap<String, FieldPolicy> = HashMap::new();
    let mut directives = Vec::new();

    // 1. related data
    for (field, rd) in &decl.related_data {
        let binding = related_binding(input.entity, field, rd, input.related_keys);
        let p = entry(&mut policies, field);
        if binding.is_some() {
            p.editor = EditorKind::Select;
        }
        p.related = binding;
    }

    // 2. displayed fields
    for field in &decl.fields {
        let p = entry(&mut policies, field);
        apply_labels(p, decl);
        if p.related.is_some() {
            p.editor = EditorKind::Select;
        }
    }

    // 3. explicit editors
    let mut editor_fields: Vec<&String> = decl.fields_editor.keys().collect();
    editor_fields.sort();
    for field in editor_fields {
        let options = &decl.fields_editor[field];
        let name = options.get("type").and_then(|t| t.as_str()).unwrap_or("");
        let editor = EditorKind::parse(name).ok_or_else(|| ConfigError::InvalidEditor {
            entity: input.entity.to_string(),
            field: field.clone(),
            editor: name.to_string(),
        })?;
        let p = entry(&mut policies, field);
        p.editor = editor;
        p.explicit_editor = true;
        if editor == EditorKind::RichText || options.len() > 1 {
            directives.push(editor_directive(field, editor, options));
        }
    }

    // 4. addable / editable
    for (list, is_addable) in [(&decl.addable_fields, true), (&decl.editable_fields, false)] {
        for field in list {
            let p = entry(&mut policies, field);
            if is_addable {
                p.addable = true;
            } else {
                p.editable = true;
            }
            if p.editor == EditorKind::None && !p.explicit_editor {
                p.editor = if is_long_text_type(column_type(input.column_types, field)) {
                    EditorKind::Textarea
                } else {
                    EditorKind::Input
                };
            }
        }
    }

    // 5. required, classes, links
    for field in &decl.required_fields {
        entry(&mut policies, field).required = true;
    }
    for (field, classes) in &decl.classes {
        entry(&mut policies, field).classes = classes.clone();
    }
    for (field, link) in &decl.links {
        let template = match link.preset.as_deref().map(str::trim) {
            Some("self") => match input.primary_key {
                Some(pk) => Some(format!("{}/{}/${}$", input.base_path, input.entity, pk)),
                None => {
                    tracing::warn!(entity = input.entity, field = %field, "self link preset needs a primary key, link dropped");
                    None
                }
            },
            Some(other) if !other.is_empty() => {
                tracing::warn!(entity = input.entity, field = %field, preset = other, "unknown link preset");
                link.template.clone()
            }
            _ => link.template.clone(),
        };
        if let Some(t) = template.filter(|t| !t.is_empty()) {
            entry(&mut policies, field).link = Some(t);
        }
    }
    for (field, format) in &decl.date_time_fields {
        entry(&mut policies, field).date_format = Some(format.clone());
    }
    for (field, count) in &decl.count_related_data {
        entry(&mut policies, field).count = Some(CountBinding {
            table: count.table.clone(),
            local_field: count.local_field_id.clone(),
            target_field: count.target_field_id.clone(),
        });
    }
    for (field, func) in &decl.column_data_func {
        entry(&mut policies, field).column_func = Some(ColumnFunc::parse(func));
    }
    for field in &decl.password_fields {
        entry(&mut policies, field).password = true;
    }
    for field in &decl.no_zero_value_fields {
        entry(&mut policies, field).no_zero = true;
    }

    // 6. boolean convention
    for field in TOGGLE_FIELDS {
        if let Some(p) = policies.get_mut(*field) {
            if !p.explicit_editor && p.editor != EditorKind::Select {
                p.editor = EditorKind::ToggleSwitch;
            }
        }
    }

    for p in policies.values_mut() {
        if !decl.fields.contains(&p.field) {
            apply_labels(p, decl);
        }
    }

    Ok(ResolvedPolicies { policies, directives })
}
