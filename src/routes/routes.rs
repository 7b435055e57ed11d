//! Route table.
//!
//! ## Structure
//! - **Probes and assets** (mounted at root)
//!   - `GET /healthz`, `GET /readyz`
//!   - `GET /uploads/{*key}` streams a stored asset
//!
//! - **API** (nested under `/api/v1`)
//!   - `POST /admin/register`, `POST /admin/login`
//!   - `POST /product`, `GET /product`, `GET|PUT|DELETE /product/{id}`, `GET /products`
//!   - `POST /order`, `GET /orders`, `PATCH /order/{id}`
//!
//! Anything else falls through to a JSON 404.

use crate::{
    handlers::{
        admin_handlers, health_handlers, log_requests, not_found, order_handlers,
        product_handlers,
    },
    state::AppState,
    upload::MAX_FORM_BYTES,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
};

/// Build the full router; the caller supplies the state.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(health_handlers::healthz))
        .route("/readyz", get(health_handlers::readyz))
        .route("/uploads/{*key}", get(health_handlers::get_upload))
        .nest("/api/v1", api_routes())
        .fallback(not_found)
        .layer(middleware::from_fn(log_requests))
}

fn api_routes() -> Router<AppState> {
    let products = Router::new()
        .route(
            "/product",
            post(product_handlers::create_product).get(product_handlers::list_active_products),
        )
        .route(
            "/product/{id}",
            get(product_handlers::get_product)
                .put(product_handlers::update_product)
                .delete(product_handlers::delete_product),
        )
        .route("/products", get(product_handlers::list_products))
        .layer(DefaultBodyLimit::max(MAX_FORM_BYTES));

    Router::new()
        .route("/admin/register", post(admin_handlers::register))
        .route("/admin/login", post(admin_handlers::login))
        .route("/order", post(order_handlers::create_order))
        .route("/orders", get(order_handlers::list_orders))
        .route("/order/{id}", patch(order_handlers::update_order))
        .merge(products)
}
