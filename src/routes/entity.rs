//! Entity routes under the configured base path.
//! Views take the entity name from the path; submissions carry it in the JSON body as `modelName`.

use crate::handlers::entity::{create, create_view, record_action_view, record_view, table_view, update};
use crate::state::AppState;
use axum::{routing::get, routing::post, Router};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

pub fn admin_routes(state: AppState) -> Router {
    let settings = state.service.settings();
    let body_limit = settings.body_limit;
    let base = settings.base_path.clone();

    let mutations = Router::new()
        .route("/add", post(create))
        .route("/update", post(update))
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(body_limit)));

    let routes = Router::new()
        .route("/:model", get(table_view))
        .route("/:model/create", get(create_view))
        .route("/:model/:id", get(record_view))
        .route("/:model/:id/:action", get(record_action_view))
        .merge(mutations)
        .with_state(state);

    if base.is_empty() {
        routes
    } else {
        Router::new().nest(&base, routes)
    }
}
