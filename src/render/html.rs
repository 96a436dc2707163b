//! Markup fragments: form controls, breadcrumbs, pagination, accordion.

use crate::config::{EditorKind, FieldPolicy};
use crate::settings::Settings;
use std::fmt::Write;

pub fn escape(s: &str) -> String {
    html_escape::encode_text(s).into_owned()
}

pub fn escape_attr(s: &str) -> String {
    html_escape::encode_double_quoted_attribute(s).into_owned()
}

/// One option of a select editor: key and display text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectOption {
    pub key: String,
    pub text: String,
}

pub fn select_tag(name: &str, options: &[SelectOption], selected: &str, required: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "<select class=\"form-select\" id=\"{0}\" name=\"{0}\"{1}>",
        escape_attr(name),
        if required { " required" } else { "" }
    );
    out.push_str("<option value=\"\"></option>\n");
    for opt in options {
        let _ = writeln!(
            out,
            "<option value=\"{}\"{}>{}</option>",
            escape_attr(&opt.key),
            if opt.key == selected { " selected" } else { "" },
            escape(&opt.text)
        );
    }
    out.push_str("</select>");
    out
}

fn is_on(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "on")
}

/// Interactive switch; `record_id` ties the control to a row for inline updates.
pub fn toggle_switch(field: &str, value: &str, record_id: Option<&str>, disabled: bool) -> String {
    let mut out = String::from("<div class=\"form-check form-switch\">");
    let _ = write!(
        out,
        "<input class=\"form-check-input\" type=\"checkbox\" role=\"switch\" name=\"{}\"",
        escape_attr(field)
    );
    if let Some(id) = record_id {
        let _ = write!(out, " data-record-id=\"{}\"", escape_attr(id));
    }
    if is_on(value) {
        out.push_str(" checked");
    }
    if disabled {
        out.push_str(" disabled");
    }
    out.push_str("></div>");
    out
}

/// Label and control for a create or update form. `options` is used by select editors.
pub fn form_input_tag(policy: &FieldPolicy, value: &str, options: Option<&[SelectOption]>) -> (String, String) {
    let field = escape_attr(&policy.field);
    let title = policy
        .title
        .as_deref()
        .map(|t| format!(" title=\"{}\"", escape_attr(t)))
        .unwrap_or_default();
    let required = if policy.required { " required" } else { "" };
    let label = format!(
        "<label{} for=\"{}\" class=\"form-label\" id=\"header_of_{}\">{}{}</label>",
        title,
        field,
        field,
        escape(&policy.header),
        if policy.required { " *" } else { "" }
    );
    let input_type = if policy.password { "password" } else { "text" };
    let control = match policy.editor {
        EditorKind::Textarea => format!(
            "<textarea class=\"form-control\" id=\"{0}\" name=\"{0}\"{1}>{2}</textarea>",
            field,
            required,
            escape(value)
        ),
        EditorKind::RichText => format!(
            "<textarea class=\"form-control tabula-richtext\" id=\"{0}\" name=\"{0}\"{1}>{2}</textarea>",
            field,
            required,
            escape(value)
        ),
        EditorKind::Select => match options {
            Some(opts) => select_tag(&policy.field, opts, value, policy.required),
            None => format!(
                "<input class=\"form-control\" type=\"text\" id=\"{0}\" name=\"{0}\" value=\"{1}\"{2}>",
                field,
                escape_attr(value),
                required
            ),
        },
        EditorKind::ToggleSwitch => toggle_switch(&policy.field, value, None, false),
        EditorKind::Input | EditorKind::None => format!(
            "<input class=\"form-control\" type=\"{3}\" id=\"{0}\" name=\"{0}\" value=\"{1}\"{2}>",
            field,
            if policy.password { String::new() } else { escape_attr(value) },
            required,
            input_type
        ),
    };
    (label, control)
}

pub fn hidden_input(name: &str, value: &str) -> String {
    format!(
        "<input type=\"hidden\" name=\"{}\" value=\"{}\">",
        escape_attr(name),
        escape_attr(value)
    )
}

/// One breadcrumb step.
#[derive(Clone, Debug)]
pub struct Crumb {
    pub title: String,
    pub url: String,
}

/// Root, ancestors, current entity and optionally the record id.
pub fn breadcrumbs(settings: &Settings, trail: &[Crumb], current: &Crumb, record_id: Option<&str>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "<nav style=\"--bs-breadcrumb-divider: '{}';\" aria-label=\"breadcrumb\">",
        escape_attr(&settings.breadcrumbs_divider)
    );
    out.push_str("  <ol class=\"breadcrumb\">\n");
    let _ = writeln!(
        out,
        "    <li class=\"breadcrumb-item\"><a href=\"{}\">{}</a></li>",
        escape_attr(&settings.breadcrumbs_root_url),
        escape(&settings.breadcrumbs_root_name)
    );
    for crumb in trail {
        let _ = writeln!(
            out,
            "    <li class=\"breadcrumb-item\"><a href=\"{}\">{}</a></li>",
            escape_attr(&crumb.url),
            escape(&crumb.title)
        );
    }
    let _ = write!(
        out,
        "    <li class=\"breadcrumb-item active\" aria-current=\"page\"><a href=\"{}\">{}</a>",
        escape_attr(&current.url),
        escape(&current.title)
    );
    if let Some(id) = record_id {
        let _ = write!(
            out,
            "</li>\n    <li class=\"breadcrumb-item active\" aria-current=\"page\"> #{}",
            escape(id)
        );
    }
    out.push_str("</li>\n  </ol>\n</nav>\n");
    out
}

fn page_url(url: &str, query: &str, page: u64) -> String {
    if page <= 1 {
        return format!("{}{}", url, query);
    }
    let sep = if query.is_empty() { '?' } else { '&' };
    format!("{}{}{}page={}", url, query, sep, page)
}

/// Page links around the current page; empty when there are fewer than two pages.
/// `query` is an already encoded `?k=v&...` string kept on every link.
pub fn pagination(total: u64, page_size: u32, page: u32, url: &str, query: &str) -> String {
    const DELTA: u64 = 5;
    let page_size = u64::from(page_size.max(1));
    let page_count = total.div_ceil(page_size);
    if page_count < 2 {
        return String::new();
    }
    let page = u64::from(page);
    let start = page.saturating_sub(DELTA).max(1);
    let end = (page + DELTA).min(page_count);

    let mut out = String::from("<nav aria-label=\"Page navigation\">\n<ul class=\"pagination justify-content-center\">\n");
    if start > 1 {
        let _ = writeln!(
            out,
            "<li class=\"page-item\"><a class=\"page-link\" href=\"{}\">1</a></li>",
            escape_attr(&page_url(url, query, 1))
        );
        if start > 2 {
            out.push_str("<li class=\"page-item disabled\"><span class=\"page-link\">...</span></li>\n");
        }
    }
    for i in start..=end {
        let _ = writeln!(
            out,
            "<li class=\"page-item{}\"><a class=\"page-link\" href=\"{}\">{}</a></li>",
            if i == page { " active" } else { "" },
            escape_attr(&page_url(url, query, i)),
            i
        );
    }
    if end < page_count {
        if end + 1 < page_count {
            out.push_str("<li class=\"page-item disabled\"><span class=\"page-link\">...</span></li>\n");
        }
        let _ = writeln!(
            out,
            "<li class=\"page-item\"><a class=\"page-link\" href=\"{}\">{}</a></li>",
            escape_attr(&page_url(url, query, page_count)),
            page_count
        );
    }
    out.push_str("</ul>\n</nav>\n");
    out
}

/// Collapsible panel around `content` (used for the create form on table pages).
pub fn accordion(content: &str, id_prefix: &str, header: &str, headers_tag: &str) -> String {
    if content.is_empty() {
        return String::new();
    }
    let id = escape_attr(id_prefix);
    let mut out = String::new();
    let _ = write!(
        out,
        "<div class=\"accordion\" id=\"{id}Accordion\">\n<div class=\"accordion-item\">\n\
         <{tag} class=\"accordion-header\" id=\"{id}Heading\">\n\
         <button class=\"accordion-button collapsed\" type=\"button\" data-bs-toggle=\"collapse\" \
         data-bs-target=\"#{id}Collapse\" aria-expanded=\"false\" aria-controls=\"{id}Collapse\">\
         <i class=\"bi-plus-square\"></i> &nbsp; {header}</button>\n</{tag}>\n\
         <div id=\"{id}Collapse\" class=\"accordion-collapse collapse\" aria-labelledby=\"{id}Heading\" data-bs-parent=\"#{id}Accordion\">\n\
         <div class=\"accordion-body\">\n",
        id = id,
        tag = headers_tag,
        header = escape(header)
    );
    out.push_str(content);
    out.push_str("</div>\n</div>\n</div>\n</div>\n");
    out
}
