//! Tabula: configuration-driven admin tables.
//!
//! Each entity is declared in a JSON document (fields, related data, editors, parent link, ...).
//! The declaration is merged with the live table schema into a cached [`EntityConfig`], and
//! [`AdminService`] renders table, record and create views from it and handles create/update
//! submissions. [`admin_routes`] exposes those over axum.

pub mod cache;
pub mod case;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod hooks;
pub mod render;
pub mod response;
pub mod routes;
pub mod schema;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;

pub use config::{ConfigLoader, ConfigSource, EntityConfig, FsConfigSource, LoadedEntity, MemoryConfigSource};
pub use context::{Action, RequestContext};
pub use db::{Database, Dialect, PgDatabase, Record, SqliteDatabase};
pub use error::{AppError, ConfigError, SchemaError};
pub use extractors::CALLER_HEADER;
pub use hooks::{AccessCheck, DynamicColumn, HookDecision, Hooks, LifecycleHooks, PasswordEncryptor, VariableResolver};
pub use render::Page;
pub use routes::{admin_routes, common_routes, common_routes_with_ready};
pub use schema::SchemaIntrospector;
pub use service::{AdminService, CreateOutcome, UpdateOutcome, ViewMode};
pub use settings::Settings;
pub use state::AppState;
