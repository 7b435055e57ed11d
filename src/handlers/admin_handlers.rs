//! Admin account endpoints.

use super::ApiResponse;
use crate::{
    auth::authenticate,
    errors::AppError,
    models::admin::Admin,
    services::admin_service::{LoginAdmin, RegisterAdmin},
    state::AppState,
};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct AdminSession {
    #[serde(flatten)]
    pub admin: Admin,
    pub token: String,
}

fn session(state: &AppState, admin: Admin) -> Result<AdminSession, AppError> {
    let token = state
        .tokens
        .issue(admin.id)
        .map_err(|err| AppError::internal(err.to_string()))?;
    Ok(AdminSession { admin, token })
}

/// `POST /api/v1/admin/register`
///
/// Open while no admin exists; afterwards only an authenticated admin may
/// add another.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterAdmin>,
) -> Result<impl IntoResponse, AppError> {
    let admin = if state.admins.count().await? == 0 {
        state.admins.register_first(req).await?
    } else {
        authenticate(&state, &headers).await?;
        state.admins.register(req).await?
    };
    let session = session(&state, admin)?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("Admin registered successfully", session),
    ))
}

/// `POST /api/v1/admin/login`
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginAdmin>,
) -> Result<impl IntoResponse, AppError> {
    let admin = state.admins.login(req).await?;
    tracing::info!(admin_id = %admin.id, "admin logged in");
    Ok(ApiResponse::ok("Login successful", session(&state, admin)?))
}
