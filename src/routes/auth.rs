use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::{self, AuthError, AuthUser};
use crate::response::{json_error, AppError};
use crate::state::AppState;

#[derive(Serialize)]
struct SuccessResponse<T> {
    success: bool,
    data: T,
}

#[derive(Serialize)]
struct LogoutResponse {
    success: bool,
    message: &'static str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterRequest {
    email: String,
    password: String,
    username: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct AuthData {
    user: AuthUser,
    token: String,
}

pub(super) async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.email.trim().is_empty()
        || payload.password.is_empty()
        || payload.username.trim().is_empty()
    {
        return Err(AppError::validation(
            "email, password and username are required",
        ));
    }

    let store = state
        .store()
        .ok_or_else(|| AppError::service_unavailable("storage unavailable"))?;

    let (user, token) = auth::register_user(
        store.as_ref(),
        &payload.email,
        &payload.password,
        &payload.username,
    )
    .await
    .map_err(map_auth_error)?;

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse {
            success: true,
            data: AuthData { user, token },
        }),
    ))
}

pub(super) async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let store = state
        .store()
        .ok_or_else(|| AppError::service_unavailable("storage unavailable"))?;

    let (user, token) = auth::login_user(store.as_ref(), &payload.email, &payload.password)
        .await
        .map_err(map_auth_error)?;

    Ok(Json(SuccessResponse {
        success: true,
        data: AuthData { user, token },
    }))
}

pub(super) async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let (_, user) = super::require_user(&state, &headers).await?;
    Ok(Json(SuccessResponse {
        success: true,
        data: user,
    }))
}

pub(super) async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let token = auth::extract_token(&headers).ok_or_else(|| {
        json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "missing auth token")
    })?;
    let store = state
        .store()
        .ok_or_else(|| AppError::service_unavailable("storage unavailable"))?;

    auth::close_session(store.as_ref(), &token)
        .await
        .map_err(map_auth_error)?;

    Ok(Json(LogoutResponse {
        success: true,
        message: "signed out",
    }))
}

fn map_auth_error(err: AuthError) -> AppError {
    match err {
        AuthError::EmailTaken => AppError::conflict("email already registered"),
        AuthError::InvalidCredentials => AppError::unauthorized("invalid email or password"),
        AuthError::MissingToken | AuthError::InvalidToken => {
            AppError::unauthorized("authentication failed, please sign in again")
        }
        AuthError::MissingSecret | AuthError::InvalidExpiresIn | AuthError::Database(_) => {
            tracing::error!(error = %err, "auth failure");
            AppError::internal(err.to_string())
        }
    }
}
