//! HTTP handlers for entity views and mutations.

pub mod entity;
pub use entity::*;
