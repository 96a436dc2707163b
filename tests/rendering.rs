mod common;

use async_trait::async_trait;
use common::{fixture, fixture_with, ORDER};
use std::collections::HashMap;
use tabula::db::display_value;
use tabula::{Action, AppError, Database, DynamicColumn, Hooks, Record, RequestContext, Settings, ViewMode};

const RELATED_NAME_QUERY: &str = "SELECT \"name\" AS value FROM \"customers\"";

fn query(pairs: &[(&str, &str)]) -> RequestContext {
    RequestContext::with_query(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>(),
    )
}

#[tokio::test]
async fn table_resolves_related_values_once_per_key() {
    let fx = fixture(Hooks::default()).await;
    let page = fx.service.render_table("Order", &RequestContext::new()).await.unwrap();

    assert_eq!(page.title, "Orders");
    assert!(page.content.starts_with("<h2>Orders</h2>"));
    assert_eq!(page.content.matches("<td>Acme</td>").count(), 2);
    assert!(page.content.contains("<td>#99</td>"));
    assert!(page.content.contains("<td>0</td>"), "zero keys are shown raw");
    // keys 3 and 99; the second row with key 3 is served from the render cache, 0 is never looked up
    assert_eq!(fx.db.count(RELATED_NAME_QUERY), 2);
}

#[tokio::test]
async fn table_cells_apply_formats_links_counts_and_controls() {
    let fx = fixture(Hooks::default()).await;
    let html = fx.service.render_table("Order", &RequestContext::new()).await.unwrap().content;

    assert!(html.contains("<td>15.03.2024</td>"));
    assert!(html.contains("<a href=\"/tabula/Order/1\">1</a>"));
    assert!(html.contains("<a href=\"/tabula/Order/1/update\"><i class=\"bi-pen record-control-update\"></i></a>"));
    assert!(html.contains("<tr data-id=\"1\">"));
    assert!(html.contains("<th id=\"header_of_customerId\">Customer</th>"));
    assert!(html.contains("name=\"isActive\" data-record-id=\"1\" checked"));
    assert!(html.contains("name=\"isActive\" data-record-id=\"2\"></div>"));
    assert_eq!(fx.db.count("FROM \"order_items\" WHERE \"order_id\""), 4);
    assert!(html.contains("<td>2</td>"));
}

#[tokio::test]
async fn table_embeds_create_form() {
    let fx = fixture(Hooks::default()).await;
    let html = fx.service.render_table("Order", &RequestContext::new()).await.unwrap().content;

    assert!(html.contains("Add New Record"));
    assert!(html.contains("<form id=\"addForm\">"));
    assert!(html.contains("<input type=\"hidden\" name=\"modelName\" value=\"Order\">"));
    assert!(html.contains("<input type=\"hidden\" name=\"successfullyCreatedDestination\" value=\"show_record\">"));
    assert!(html.contains("<select class=\"form-select\" id=\"customerId\" name=\"customerId\">"));
    assert!(html.contains("<option value=\"3\">Acme</option>"));
    assert!(html.contains("<textarea class=\"form-control\" id=\"notes\" name=\"notes\"></textarea>"));
    assert!(html.contains("id=\"email\" name=\"email\" value=\"\" required"));
}

#[tokio::test]
async fn table_paginates() {
    let settings = Settings {
        page_size: 2,
        ..Settings::default()
    };
    let fx = fixture_with(Hooks::default(), settings).await;

    let first = fx.service.render_table("Order", &RequestContext::new()).await.unwrap().content;
    assert!(first.contains("<tr data-id=\"1\">"));
    assert!(!first.contains("<tr data-id=\"3\">"));
    assert!(first.contains("href=\"/tabula/Order?page=2\""));

    let second = fx.service.render_table("Order", &query(&[("page", "2")])).await.unwrap().content;
    assert!(second.contains("<tr data-id=\"3\">"));
    assert!(second.contains("<li class=\"page-item active\"><a class=\"page-link\" href=\"/tabula/Order?page=2\">2</a></li>"));
}

#[tokio::test]
async fn record_read_view_lists_fields() {
    let fx = fixture(Hooks::default()).await;
    let html = fx
        .service
        .render_record("Order", "1", ViewMode::Read, &RequestContext::new())
        .await
        .unwrap()
        .content;

    assert!(html.contains("<th id=\"header_of_customerId\">Customer:</th>"));
    assert!(html.contains("<td>Acme</td>"));
    assert!(html.contains("aria-current=\"page\"> #1"));
    assert!(!html.contains("editForm"));
}

#[tokio::test]
async fn record_update_view_builds_form() {
    let fx = fixture(Hooks::default()).await;
    let html = fx
        .service
        .render_record("Order", "1", ViewMode::Update, &RequestContext::new())
        .await
        .unwrap()
        .content;

    assert!(html.contains("<form id=\"editForm\">"));
    assert!(html.contains("<input type=\"hidden\" name=\"id\" value=\"1\">"));
    assert!(html.contains("<textarea class=\"form-control\" id=\"notes\" name=\"notes\">first</textarea>"));
    assert!(html.contains("<input class=\"form-control\" type=\"text\" id=\"status\" name=\"status\" value=\"open\">"));
    assert!(html.contains("id=\"saveButton\""));
    assert!(!html.contains("record-control-update"));
}

#[tokio::test]
async fn record_update_view_respects_field_access() {
    let hooks = Hooks::default().with_access(|_: &RequestContext, _: &str, field: &str, action: Action| {
        !(field == "notes" && action == Action::Update)
    });
    let fx = fixture(hooks).await;
    let html = fx
        .service
        .render_record("Order", "1", ViewMode::Update, &RequestContext::new())
        .await
        .unwrap()
        .content;

    assert!(!html.contains("<textarea"));
    assert!(html.contains("<th id=\"header_of_notes\">notes:</th>") || html.contains("id=\"header_of_notes\">"));
    assert!(html.contains("name=\"status\""));
}

#[tokio::test]
async fn missing_record_is_not_found() {
    let fx = fixture(Hooks::default()).await;
    let err = fx
        .service
        .render_record("Order", "42", ViewMode::Read, &RequestContext::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn denied_entity_never_touches_the_database() {
    let hooks = Hooks::default()
        .with_access(|_: &RequestContext, entity: &str, _: &str, _: Action| entity != "Order");
    let fx = fixture(hooks).await;
    let err = fx.service.render_table("Order", &RequestContext::new()).await.unwrap_err();

    assert!(matches!(err, AppError::AccessDenied { .. }));
    assert!(fx.db.statements().is_empty());
}

#[tokio::test]
async fn child_table_is_filtered_and_linked_to_parent() {
    let fx = fixture(Hooks::default()).await;
    fx.declare(
        "Order",
        &ORDER.replace("\"orderBy\": \"id\",", "\"orderBy\": \"id\", \"breadcrumb\": {\"labelField\": \"email\"},"),
        1,
    );
    let html = fx
        .service
        .render_table("OrderItem", &query(&[("order_id", "1")]))
        .await
        .unwrap()
        .content;

    assert!(html.contains("A-1"));
    assert!(html.contains("A-2"));
    assert!(!html.contains("B-1"));
    assert!(html.contains("<a href=\"/tabula/Order\">Orders: a@example.com</a>"));
    assert!(html.contains("<a href=\"/tabula/OrderItem?order_id=1\">Order items</a>"));
    assert!(html.contains("<input type=\"hidden\" name=\"order_id\" value=\"1\">"));
}

#[tokio::test]
async fn create_view_without_addable_fields() {
    let fx = fixture(Hooks::default()).await;
    fx.declare("Customer", r#"{"dbTable": "customers", "fields": ["id", "name"]}"#, 0);
    let html = fx
        .service
        .render_create("Customer", &RequestContext::new())
        .await
        .unwrap()
        .content;

    assert!(html.contains("Nothing to add."));
    assert!(!html.contains("<form"));
}

#[tokio::test]
async fn create_view_prefills_from_query_and_hides_denied_fields() {
    let hooks = Hooks::default().with_access(|_: &RequestContext, _: &str, field: &str, action: Action| {
        !(field == "notes" && action == Action::Create)
    });
    let fx = fixture(hooks).await;
    let html = fx
        .service
        .render_create("Order", &query(&[("status", "draft")]))
        .await
        .unwrap()
        .content;

    assert!(html.contains("id=\"status\" name=\"status\" value=\"draft\""));
    assert!(!html.contains("name=\"notes\""));
}

fn with_computed_columns() -> String {
    ORDER
        .replace("\"edit\"]", "\"edit\", \"summary\", \"mystery\"]")
        .replace(
            "{\"edit\": \"stdRecordControls\"}",
            "{\"edit\": \"stdRecordControls\", \"summary\": \"dynamicColumnDataFunc\", \"mystery\": \"sparkline\"}",
        )
}

struct StatusBadge;

#[async_trait]
impl DynamicColumn for StatusBadge {
    async fn render(&self, _ctx: &RequestContext, _db: &dyn Database, table: &str, field: &str, record: &Record) -> String {
        let status = record.get("status").map(display_value).unwrap_or_default();
        format!("<b>{}.{}:{}</b>", table, field, status)
    }
}

#[tokio::test]
async fn computed_columns_without_producer_show_markers() {
    let fx = fixture(Hooks::default()).await;
    fx.declare("Order", &with_computed_columns(), 1);
    let html = fx.service.render_table("Order", &RequestContext::new()).await.unwrap().content;

    assert!(html.contains("<td>!Dynamic column callback not set</td>"));
    assert!(html.contains("<td>!Unknown columnDataFunc: sparkline</td>"));
}

#[tokio::test]
async fn dynamic_column_producer_renders_cells() {
    let fx = fixture(Hooks::default().with_dynamic_column(StatusBadge)).await;
    fx.declare("Order", &with_computed_columns(), 1);
    let html = fx.service.render_table("Order", &RequestContext::new()).await.unwrap().content;

    assert!(html.contains("<td><b>orders.summary:open</b></td>"));
    assert!(html.contains("<td><b>orders.summary:closed</b></td>"));
    assert!(!html.contains("callback not set"));
}

#[tokio::test]
async fn filter_values_from_the_query_cannot_widen_the_filter() {
    let fx = fixture(Hooks::default()).await;
    let html = fx
        .service
        .render_table("OrderItem", &query(&[("order_id", "1 OR 1=1")]))
        .await
        .unwrap()
        .content;

    assert!(!html.contains("B-1"));
    assert!(!html.contains("A-1"));
    assert_eq!(fx.db.count("WHERE (order_id = '1 OR 1=1')"), 2);
}

#[tokio::test]
async fn views_load_the_client_script_after_editor_directives() {
    let fx = fixture(Hooks::default()).await;
    fx.declare(
        "Order",
        &ORDER.replace("\"orderBy\": \"id\",", "\"orderBy\": \"id\", \"fieldsEditor\": {\"notes\": {\"type\": \"summernote\", \"height\": 200}},"),
        1,
    );
    let ctx = RequestContext::new();

    let table = fx.service.render_table("Order", &ctx).await.unwrap();
    assert_eq!(table.header_tags.len(), 2);
    assert!(table.header_tags[0].contains("window.tabulaEditors[\"notes\"]"));
    assert!(table.header_tags[1].starts_with("<script>window.tabulaBase = \"/tabula\";</script>"));
    assert!(table.content.contains("class=\"form-control tabula-richtext\" id=\"notes\""));

    let update = fx.service.render_record("Order", "1", ViewMode::Update, &ctx).await.unwrap();
    assert!(update.header_tags.last().unwrap().contains("getElementById(\"saveButton\")"));
    let create = fx.service.render_create("Order", &ctx).await.unwrap();
    assert!(create.header_tags.last().unwrap().contains("getElementById(\"addForm\")"));
}
