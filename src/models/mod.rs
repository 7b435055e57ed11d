//! Core data models for the storefront.
//!
//! These entities map to SQLite tables via `sqlx::FromRow` and serialize as
//! JSON via `serde` for the REST API.

pub mod admin;
pub mod order;
pub mod product;
