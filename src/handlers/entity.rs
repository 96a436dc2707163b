//! Entity handlers: table, record, update and create views; create and update submissions.

use crate::context::RequestContext;
use crate::db::Record;
use crate::error::AppError;
use crate::response::{error_body, success_one, success_one_ok, HtmlError, HtmlPage};
use crate::service::{UpdateOutcome, ViewMode};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

fn body_to_record(value: Value) -> Result<Record, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

pub async fn table_view(
    State(state): State<AppState>,
    Path(model): Path<String>,
    ctx: RequestContext,
) -> Result<HtmlPage, HtmlError> {
    let page = state.service.render_table(&model, &ctx).await?;
    Ok(HtmlPage(page))
}

pub async fn create_view(
    State(state): State<AppState>,
    Path(model): Path<String>,
    ctx: RequestContext,
) -> Result<HtmlPage, HtmlError> {
    let page = state.service.render_create(&model, &ctx).await?;
    Ok(HtmlPage(page))
}

pub async fn record_view(
    State(state): State<AppState>,
    Path((model, id)): Path<(String, String)>,
    ctx: RequestContext,
) -> Result<HtmlPage, HtmlError> {
    let page = state.service.render_record(&model, &id, ViewMode::Read, &ctx).await?;
    Ok(HtmlPage(page))
}

/// `/:model/:id/:action`; only `update` is known.
pub async fn record_action_view(
    State(state): State<AppState>,
    Path((model, id, action)): Path<(String, String, String)>,
    ctx: RequestContext,
) -> Result<HtmlPage, HtmlError> {
    if action != "update" {
        return Err(AppError::NotFound(format!("action '{}'", action)).into());
    }
    let page = state.service.render_record(&model, &id, ViewMode::Update, &ctx).await?;
    Ok(HtmlPage(page))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let payload = body_to_record(body)?;
    let outcome = state.service.create(&ctx, payload).await?;
    Ok(success_one(outcome))
}

pub async fn update(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let payload = body_to_record(body)?;
    let res = match state.service.update(&ctx, payload).await? {
        UpdateOutcome::Updated { changed } => success_one_ok(serde_json::json!({ "changed": changed })).into_response(),
        UpdateOutcome::NoChanges => (
            StatusCode::BAD_REQUEST,
            Json(error_body("no_changes", "No new data for update".into())),
        )
            .into_response(),
    };
    Ok(res)
}
