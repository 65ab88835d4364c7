//! Account endpoints: registration and login

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::user::{LoginRequest, RegisterUser, UserSummary},
};

use super::ApiJson;

/// Login response
#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    /// Status message
    pub message: String,
    /// Authenticated account
    pub user: UserSummary,
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/register",
    tag = "users",
    request_body = RegisterUser,
    responses(
        (status = 201, description = "Account created", body = UserSummary),
        (status = 400, description = "Missing or invalid fields", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<crate::AppState>,
    ApiJson(request): ApiJson<RegisterUser>,
) -> AppResult<(StatusCode, Json<UserSummary>)> {
    let user = state.services.users.register(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/login",
    tag = "users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials accepted", body = LoginResponse),
        (status = 400, description = "Missing fields", body = crate::error::ErrorResponse),
        (status = 401, description = "Invalid email or password", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<crate::AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let user = state.services.users.authenticate(request).await?;

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        user,
    }))
}
