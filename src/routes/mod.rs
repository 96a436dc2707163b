//! Routers: entity views and submissions, plus health/readiness/version.

pub mod common;
pub mod entity;

pub use common::{common_routes, common_routes_with_ready};
pub use entity::admin_routes;
