//! Table, record and create views.

use super::AdminService;
use crate::config::{ColumnFunc, EditorKind, EntityConfig, FieldPolicy, LoadedEntity, RelatedDataBinding};
use crate::context::{Action, RequestContext};
use crate::db::{display_value, id_value, value_as_i64, Record};
use crate::error::AppError;
use crate::render::html::{
    accordion, breadcrumbs, escape, escape_attr, form_input_tag, hidden_input, pagination, Crumb, SelectOption,
};
use crate::render::{client_script, field_value, render_value, Page, RenderCache};
use crate::sql;
use std::fmt::Write;

/// Single-record view flavour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewMode {
    Read,
    Update,
}

impl ViewMode {
    fn action(self) -> Action {
        match self {
            ViewMode::Read => Action::Read,
            ViewMode::Update => Action::Update,
        }
    }
}

fn title_attr(policy: Option<&FieldPolicy>) -> String {
    policy
        .and_then(|p| p.title.as_deref())
        .map(|t| format!(" title=\"{}\"", escape_attr(t)))
        .unwrap_or_default()
}

fn header_of<'a>(policy: Option<&'a FieldPolicy>, field: &'a str) -> &'a str {
    policy.map(|p| p.header.as_str()).unwrap_or(field)
}

fn heading(tag: &str, title: &str) -> String {
    format!("<{tag}>{}</{tag}>\n", escape(title), tag = tag)
}

impl AdminService {
    /// Paginated table of an entity, with breadcrumbs and the create form when anything is addable.
    pub async fn render_table(&self, entity: &str, ctx: &RequestContext) -> Result<Page, AppError> {
        let loaded = self.load_checked(entity, ctx, Action::Read, None).await?;
        let cfg = &loaded.config;
        let db = self.db.as_ref();
        let dialect = db.dialect();

        let count_q = sql::count_rows(dialect, &cfg.table, &loaded.sql_where);
        let total = ctx
            .bounded(db.fetch_optional(&count_q.sql, &count_q.params))
            .await?
            .and_then(|row| row.get("cnt").map(value_as_i64))
            .unwrap_or(0)
            .max(0) as u64;

        let page = ctx.page();
        let page_size = self.settings.page_size;
        let offset = u64::from(page - 1) * u64::from(page_size);
        let q = sql::select_page(dialect, &cfg.table, &loaded.sql_where, &cfg.order_by, page_size, offset);
        let rows = ctx.bounded(db.fetch_all(&q.sql, &q.params)).await?;

        let columns: Vec<&str> = cfg
            .fields
            .iter()
            .map(String::as_str)
            .filter(|f| cfg.policy(f).map_or(true, |p| p.display.table))
            .collect();

        let mut out = heading(&self.settings.headers_tag, &cfg.title);
        out.push_str(&self.breadcrumbs(&loaded, ctx, None).await);
        let form = self.create_form(&loaded, ctx).await;
        out.push_str(&accordion(&form, "create", "Add New Record", &self.settings.headers_tag));

        let _ = writeln!(
            out,
            "<table class=\"table table-striped mt-3\" data-model=\"{}\">\n<thead>\n<tr>",
            escape_attr(&cfg.name)
        );
        for field in &columns {
            let policy = cfg.policy(field);
            let _ = writeln!(
                out,
                "<th{} id=\"header_of_{}\">{}</th>",
                title_attr(policy),
                escape_attr(field),
                escape(header_of(policy, field))
            );
        }
        out.push_str("</tr>\n</thead>\n<tbody>\n");

        let env = self.render_env(ctx);
        let mut cache = RenderCache::new();
        for row in &rows {
            let disabled = row.get("is_disabled").map(display_value).as_deref() == Some("1");
            let record_id = cfg
                .primary_key
                .as_deref()
                .and_then(|pk| row.get(pk))
                .filter(|v| !v.is_null())
                .map(|v| format!(" data-id=\"{}\"", escape_attr(&display_value(v))))
                .unwrap_or_default();
            let _ = writeln!(out, "<tr{}{}>", record_id, if disabled { " class=\"disabled\"" } else { "" });
            for field in &columns {
                let cell = render_value(&env, &loaded, field, row, &mut cache).await;
                let _ = writeln!(out, "\t<td{}>{}</td>", cell.attrs, cell.html);
            }
            out.push_str("</tr>\n");
        }
        out.push_str("</tbody>\n</table>\n");
        out.push_str(&pagination(
            total,
            page_size,
            page,
            &self.settings.entity_url(&cfg.name),
            &loaded.parent_query,
        ));

        tracing::debug!(entity, page, rows = rows.len(), total, lookups = cache.len(), "table rendered");
        Ok(Page {
            title: cfg.title.clone(),
            header_tags: self.header_tags(cfg),
            content: out,
        })
    }

    /// One record by primary key. In update mode editable fields become form inputs.
    pub async fn render_record(
        &self,
        entity: &str,
        id: &str,
        mode: ViewMode,
        ctx: &RequestContext,
    ) -> Result<Page, AppError> {
        let loaded = self.load_checked(entity, ctx, mode.action(), None).await?;
        let cfg = &loaded.config;
        let pk = cfg.require_primary_key()?;
        let db = self.db.as_ref();

        let q = sql::select_by_key(db.dialect(), &cfg.table, pk, &id_value(id), &loaded.sql_where);
        let record = ctx
            .bounded(db.fetch_optional(&q.sql, &q.params))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} #{}", cfg.name, id)))?;
        let pk_value = record.get(pk).map(display_value).unwrap_or_else(|| id.to_string());

        let mut out = heading(&self.settings.headers_tag, &cfg.title);
        out.push_str(&self.breadcrumbs(&loaded, ctx, Some(&pk_value)).await);

        let update = mode == ViewMode::Update;
        if update {
            out.push_str("<form id=\"editForm\">\n");
            out.push_str(&hidden_input("modelName", &cfg.name));
            out.push('\n');
            out.push_str(&hidden_input("id", &pk_value));
            out.push('\n');
            if let (Some(var), Some(value)) = (
                cfg.parent.as_ref().and_then(|p| p.query_variable.as_deref()),
                loaded.parent_value.as_deref(),
            ) {
                out.push_str(&hidden_input(var, value));
                out.push('\n');
            }
        }
        let _ = writeln!(
            out,
            "<table class=\"table table-striped mt-3\" data-model=\"{}\" data-id=\"{}\">\n<tbody>",
            escape_attr(&cfg.name),
            escape_attr(&pk_value)
        );

        let env = self.render_env(ctx);
        let mut cache = RenderCache::new();
        for field in &cfg.fields {
            let policy = cfg.policy(field);
            let shown = match (mode, policy) {
                (_, None) => true,
                (ViewMode::Read, Some(p)) => p.display.record,
                (ViewMode::Update, Some(p)) => {
                    p.display.update && p.column_func != Some(ColumnFunc::RecordControls)
                }
            };
            if !shown {
                continue;
            }

            let editable_here = update
                && policy.is_some_and(|p| p.editable)
                && self.hooks.permits(ctx, &cfg.name, field, Action::Update);
            match policy {
                Some(p) if editable_here => {
                    let current = field_value(&record, field).map(display_value).unwrap_or_default();
                    let options = self.select_options(ctx, p).await;
                    let (label, control) = form_input_tag(p, &current, options.as_deref());
                    let _ = writeln!(out, "<tr>\n <td colspan=\"2\">{}<br>\n{}</td>\n</tr>", label, control);
                }
                _ => {
                    let cell = render_value(&env, &loaded, field, &record, &mut cache).await;
                    let _ = writeln!(
                        out,
                        "<tr>\n <th{} id=\"header_of_{}\">{}:</th>\n <td{}>{}</td>\n</tr>",
                        title_attr(policy),
                        escape_attr(field),
                        escape(header_of(policy, field)),
                        cell.attrs,
                        cell.html
                    );
                }
            }
        }
        out.push_str("</tbody>\n</table>\n");
        if update {
            out.push_str("<button type=\"button\" class=\"btn btn-primary\" id=\"saveButton\">Save</button>\n</form>\n");
        }

        Ok(Page {
            title: cfg.title.clone(),
            header_tags: self.header_tags(cfg),
            content: out,
        })
    }

    /// Editor directives of the entity followed by the client script.
    fn header_tags(&self, cfg: &EntityConfig) -> Vec<String> {
        let mut tags = cfg.header_tags.clone();
        tags.push(client_script(&self.settings.base_path));
        tags
    }

    /// Standalone create view.
    pub async fn render_create(&self, entity: &str, ctx: &RequestContext) -> Result<Page, AppError> {
        let loaded = self.load_checked(entity, ctx, Action::Create, None).await?;
        let cfg = &loaded.config;
        let mut out = heading(&self.settings.headers_tag, &cfg.title);
        out.push_str(&self.breadcrumbs(&loaded, ctx, None).await);
        let form = self.create_form(&loaded, ctx).await;
        if form.is_empty() {
            out.push_str("<p class=\"text-muted\">Nothing to add.</p>\n");
        } else {
            out.push_str(&form);
        }
        Ok(Page {
            title: cfg.title.clone(),
            header_tags: self.header_tags(cfg),
            content: out,
        })
    }

    /// Create form over addable fields the caller may create; empty when none remain.
    async fn create_form(&self, loaded: &LoadedEntity, ctx: &RequestContext) -> String {
        let cfg = &loaded.config;
        if cfg.addable_fields.is_empty() {
            return String::new();
        }

        let mut inputs = String::new();
        for field in &cfg.addable_fields {
            let Some(policy) = cfg.policy(field) else {
                continue;
            };
            if !policy.display.create || !self.hooks.permits(ctx, &cfg.name, field, Action::Create) {
                continue;
            }
            let prefill = ctx.query_param(field).unwrap_or_default();
            let options = self.select_options(ctx, policy).await;
            let (label, control) = form_input_tag(policy, prefill, options.as_deref());
            let _ = writeln!(inputs, "<div class=\"mb-3\">\n{}\n{}\n</div>", label, control);
        }
        if inputs.is_empty() {
            return String::new();
        }

        let mut out = String::from("<form id=\"addForm\">\n");
        out.push_str(&hidden_input("modelName", &cfg.name));
        out.push('\n');
        if let (Some(var), Some(value)) = (
            cfg.parent.as_ref().and_then(|p| p.query_variable.as_deref()),
            loaded.parent_value.as_deref(),
        ) {
            if !cfg.addable_fields.iter().any(|f| f == var) {
                out.push_str(&hidden_input(var, value));
                out.push('\n');
            }
        }
        out.push_str(&hidden_input("successfullyCreatedDestination", "show_record"));
        out.push('\n');
        out.push_str(&inputs);
        out.push_str("<button type=\"submit\" class=\"btn btn-primary\">Add</button>\n</form>\n");
        out
    }

    /// Options of a select editor; `None` when the field has no binding or the query fails.
    async fn select_options(&self, ctx: &RequestContext, policy: &FieldPolicy) -> Option<Vec<SelectOption>> {
        if policy.editor != EditorKind::Select {
            return None;
        }
        let binding: &RelatedDataBinding = policy.related.as_ref()?;
        let q = sql::select_related_options(
            self.db.dialect(),
            &binding.table,
            &binding.key_field,
            &binding.value_field,
            binding.where_clause.as_deref(),
            binding.order_by.as_deref(),
        );
        match ctx.bounded(self.db.fetch_all(&q.sql, &q.params)).await {
            Ok(rows) => Some(
                rows.iter()
                    .map(|r| SelectOption {
                        key: r.get("option_key").map(display_value).unwrap_or_default(),
                        text: r.get("option_value").map(display_value).unwrap_or_default(),
                    })
                    .collect(),
            ),
            Err(e) => {
                tracing::warn!(field = %policy.field, table = %binding.table, error = %e, "cannot load select options");
                None
            }
        }
    }

    /// Root, ancestors (each with the label of the selected ancestor record when declared), current entity.
    async fn breadcrumbs(&self, loaded: &LoadedEntity, ctx: &RequestContext, record_id: Option<&str>) -> String {
        let ancestors = loaded.ancestors();
        let mut trail = Vec::with_capacity(ancestors.len());
        for (i, ancestor) in ancestors.iter().enumerate() {
            let child = ancestors.get(i + 1).copied().unwrap_or(loaded);
            let mut title = ancestor.config.title.clone();
            if let Some(label) = self.ancestor_label(ancestor, child.parent_value.as_deref(), ctx).await {
                let _ = write!(title, ": {}", label);
            }
            trail.push(Crumb {
                title,
                url: format!("{}{}", self.settings.entity_url(ancestor.name()), ancestor.parent_query),
            });
        }
        let current = Crumb {
            title: loaded.config.title.clone(),
            url: format!("{}{}", self.settings.entity_url(loaded.name()), loaded.parent_query),
        };
        breadcrumbs(&self.settings, &trail, &current, record_id)
    }

    async fn ancestor_label(&self, ancestor: &LoadedEntity, selected: Option<&str>, ctx: &RequestContext) -> Option<String> {
        let cfg = &ancestor.config;
        let label_field = cfg.breadcrumb_label_field.as_ref()?;
        let pk = cfg.primary_key.as_deref()?;
        let selected = selected?;
        let q = sql::select_columns_by_key(
            self.db.dialect(),
            &cfg.table,
            std::slice::from_ref(label_field),
            pk,
            &id_value(selected),
            &ancestor.sql_where,
        );
        match ctx.bounded(self.db.fetch_optional(&q.sql, &q.params)).await {
            Ok(row) => row
                .as_ref()
                .and_then(|r: &Record| r.get(label_field.as_str()))
                .map(display_value)
                .filter(|l| !l.is_empty()),
            Err(e) => {
                tracing::warn!(entity = %cfg.name, field = %label_field, error = %e, "breadcrumb label lookup failed");
                None
            }
        }
    }
}
