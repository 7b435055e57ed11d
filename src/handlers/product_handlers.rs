//! Catalogue endpoints. Writes take a multipart form (text fields plus
//! `images` files) and require an admin token.

use super::{ApiResponse, parse_id};
use crate::{auth::AuthAdmin, errors::AppError, state::AppState, upload::ProductForm};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};

/// `POST /api/v1/product`
pub async fn create_product(
    State(state): State<AppState>,
    AuthAdmin(admin): AuthAdmin,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = ProductForm::from_multipart(multipart).await?;
    let product = state
        .products
        .create_product(form.fields, form.images)
        .await?;

    tracing::debug!(admin_id = %admin.id, product_id = %product.id, "product created by admin");
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("Product created successfully", product),
    ))
}

/// `PUT /api/v1/product/{id}`
///
/// Uploading any image replaces the whole image set.
pub async fn update_product(
    State(state): State<AppState>,
    AuthAdmin(_): AuthAdmin,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "Product")?;
    let form = ProductForm::from_multipart(multipart).await?;
    let product = state
        .products
        .update_product(id, form.fields, form.images)
        .await?;
    Ok(ApiResponse::ok("Product updated successfully", product))
}

/// `DELETE /api/v1/product/{id}`
pub async fn delete_product(
    State(state): State<AppState>,
    AuthAdmin(_): AuthAdmin,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "Product")?;
    state.products.delete_product(id).await?;
    Ok(ApiResponse::message("Product deleted successfully"))
}

/// `GET /api/v1/products`: the full catalogue, inactive entries included.
pub async fn list_products(
    State(state): State<AppState>,
    AuthAdmin(_): AuthAdmin,
) -> Result<impl IntoResponse, AppError> {
    let products = state.products.list_products().await?;
    Ok(ApiResponse::ok("Products retrieved successfully", products))
}

/// `GET /api/v1/product`
pub async fn list_active_products(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let products = state.products.list_active_products().await?;
    Ok(ApiResponse::ok("Products retrieved successfully", products))
}

/// `GET /api/v1/product/{id}`
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "Product")?;
    let product = state.products.get_product(id).await?;
    Ok(ApiResponse::ok("Product retrieved successfully", product))
}
