//! Example consumer: serves the admin views of the entities declared in `TABULA_CONFIG_DIR`.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! `DATABASE_URL` selects the backend: `postgres://...` or `sqlite://...` (default `sqlite::memory:`).

use std::sync::Arc;
use tabula::config::sql_literal;
use tabula::{
    admin_routes, common_routes_with_ready, AdminService, AppState, Database, Hooks, PgDatabase, Settings,
    SqliteDatabase,
};
use tokio::net::TcpListener;

async fn connect(database_url: &str) -> Result<Arc<dyn Database>, sqlx::Error> {
    if database_url.starts_with("postgres") {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Arc::new(PgDatabase::new(pool)))
    } else {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Arc::new(SqliteDatabase::new(pool)))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tabula=info")),
        )
        .init();

    let settings = Settings::from_env();
    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".into());
    let db = connect(&database_url).await?;

    // Attributes are set by the host; query values are client input and get quoted.
    let hooks = Hooks::default().with_variables(|ctx: &tabula::RequestContext, _entity: &str, name: &str| {
        ctx.attribute(name)
            .map(str::to_string)
            .or_else(|| ctx.query_param(name).map(sql_literal))
    });
    let state = AppState::new(AdminService::new(db, settings, hooks));

    let app = admin_routes(state.clone()).merge(common_routes_with_ready(state));
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Example consumer listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
