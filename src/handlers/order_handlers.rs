//! Order endpoints. Customers place orders without an account; admins list
//! and progress them.

use super::{ApiResponse, parse_id};
use crate::{
    auth::AuthAdmin,
    errors::AppError,
    services::order_service::{NewOrder, OrderUpdate},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

/// `POST /api/v1/order`
pub async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<NewOrder>,
) -> Result<impl IntoResponse, AppError> {
    let order = state.orders.create_order(req).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("Order created successfully", order),
    ))
}

/// `GET /api/v1/orders`
pub async fn list_orders(
    State(state): State<AppState>,
    AuthAdmin(_): AuthAdmin,
) -> Result<impl IntoResponse, AppError> {
    let orders = state.orders.list_orders().await?;
    Ok(ApiResponse::ok("Orders retrieved successfully", orders))
}

/// `PATCH /api/v1/order/{id}`
pub async fn update_order(
    State(state): State<AppState>,
    AuthAdmin(_): AuthAdmin,
    Path(id): Path<String>,
    Json(update): Json<OrderUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "Order")?;
    let order = state.orders.update_order(id, update).await?;
    Ok(ApiResponse::ok("Order updated successfully", order))
}
