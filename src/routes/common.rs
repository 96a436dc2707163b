//! Probe routes: liveness, readiness (database round trip) and build info.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

#[derive(Serialize)]
struct ReadyBody {
    status: &'static str,
    dialect: &'static str,
    database: &'static str,
    /// Entity configurations currently cached.
    entities: usize,
}

#[derive(Serialize)]
struct InfoBody {
    name: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyBody>) {
    let db = state.service.database();
    let dialect = db.dialect().name();
    let entities = state.service.loader().cached();
    match db.fetch_optional("SELECT 1", &[]).await {
        Ok(_) => (
            StatusCode::OK,
            Json(ReadyBody {
                status: "ok",
                dialect,
                database: "ok",
                entities,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, dialect, "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyBody {
                    status: "degraded",
                    dialect,
                    database: "unavailable",
                    entities,
                }),
            )
        }
    }
}

async fn info() -> Json<InfoBody> {
    Json(InfoBody {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /health and GET /info; no state needed.
pub fn common_routes() -> Router {
    Router::new().route("/health", get(health)).route("/info", get(info))
}

/// [`common_routes`] plus GET /ready, which queries the database.
pub fn common_routes_with_ready(state: AppState) -> Router {
    common_routes().merge(Router::new().route("/ready", get(ready)).with_state(state))
}
