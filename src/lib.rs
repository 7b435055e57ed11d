//! Storefront backend: product catalogue with image assets, admin accounts
//! and customer orders, served over axum.

pub mod assets;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod upload;
