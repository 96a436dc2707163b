//! `{{name}}` placeholder expansion in row filters. Runs on every request.

use crate::context::RequestContext;
use crate::hooks::VariableResolver;
use regex::Regex;
use std::sync::OnceLock;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{(.*?)\}\}").expect("placeholder pattern is valid"))
}

pub fn has_placeholders(text: &str) -> bool {
    text.contains("{{")
}

/// Distinct placeholder names in order of first appearance.
pub fn placeholder_names(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in placeholder_regex().captures_iter(text) {
        let name = caps[1].to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// SQL text for an untrusted value: integers pass as they are, anything else becomes a
/// single-quoted string literal with quotes and backslashes doubled.
pub fn sql_literal(value: &str) -> String {
    let digits = value.strip_prefix('-').unwrap_or(value);
    if !digits.is_empty() && digits.len() <= 18 && digits.bytes().all(|b| b.is_ascii_digit()) {
        return value.to_string();
    }
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// Substitute every resolvable placeholder. Unresolved ones stay literal and are logged.
/// Without a resolver the text is returned unchanged; the loader rejects that case earlier.
pub fn resolve_variables(
    text: &str,
    entity: &str,
    ctx: &RequestContext,
    resolver: Option<&dyn VariableResolver>,
) -> String {
    if !has_placeholders(text) {
        return text.to_string();
    }
    let Some(resolver) = resolver else {
        return text.to_string();
    };
    let mut out = text.to_string();
    for name in placeholder_names(text) {
        match resolver.resolve(ctx, entity, &name).filter(|v| !v.is_empty()) {
            Some(value) => {
                out = out.replace(&format!("{{{{{}}}}}", name), &value);
            }
            None => {
                tracing::warn!(entity, variable = %name, "cannot resolve variable");
            }
        }
    }
    out
}
