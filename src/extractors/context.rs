//! Build the per-request context from the query string, an upstream context and the request deadline.

use crate::context::RequestContext;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use std::collections::HashMap;
use tokio::time::Instant;

/// Header carrying a caller identity set by a trusted proxy. Read only when
/// `Settings::trust_caller_header` is on, and ignored when an upstream layer already placed a
/// [`RequestContext`] with a user in the request extensions.
pub const CALLER_HEADER: &str = "X-Tabula-User";

#[async_trait]
impl FromRequestParts<AppState> for RequestContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let mut ctx = parts.extensions.get::<RequestContext>().cloned().unwrap_or_default();
        if let Ok(Query(query)) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri) {
            ctx.query.extend(query);
        }
        let settings = state.service.settings();
        if ctx.user.is_none() && settings.trust_caller_header {
            ctx.user = parts
                .headers
                .get(CALLER_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
        }
        if ctx.deadline.is_none() {
            ctx.deadline = settings.request_timeout.map(|t| Instant::now() + t);
        }
        Ok(ctx)
    }
}
