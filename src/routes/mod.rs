mod auth;
mod events;
mod generate;
mod health;
mod sets;
mod study;

use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::Router;

use crate::auth::AuthUser;
use crate::response::{json_error, AppError};
use crate::state::AppState;
use crate::store::SetStore;

pub fn router(state: AppState) -> Router {
    let app = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/verify", get(auth::verify))
        .route("/api/generate", post(generate::generate))
        .route("/api/sets", get(sets::list).post(sets::create))
        .route("/api/sets/:setId", get(sets::get_one))
        .route(
            "/api/sets/:setId/cards/:cardId/mastery",
            put(sets::update_mastery),
        )
        .route("/api/study/sessions", post(study::create))
        .route("/api/study/sessions/:sessionId", get(study::view))
        .route("/api/study/sessions/:sessionId/load", post(study::load_set))
        .route("/api/study/sessions/:sessionId/flip", post(study::flip))
        .route("/api/study/sessions/:sessionId/next", post(study::next))
        .route(
            "/api/study/sessions/:sessionId/previous",
            post(study::previous),
        )
        .route(
            "/api/study/sessions/:sessionId/mastery",
            post(study::record_mastery),
        )
        .route("/api/events", get(events::stream))
        .nest("/health", health::router())
        .nest("/api/health", health::router());

    app.fallback(fallback_handler).with_state(state)
}

/// Resolve the request's bearer token (or auth cookie) to a user, handing
/// back the store alongside so handlers get both in one call.
pub(crate) async fn require_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(Arc<SetStore>, AuthUser), AppError> {
    let token = crate::auth::extract_token(headers).ok_or_else(|| {
        json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "missing auth token")
    })?;

    let store = state
        .store()
        .ok_or_else(|| AppError::service_unavailable("storage unavailable"))?;

    let user = crate::auth::verify_request_token(store.as_ref(), &token)
        .await
        .map_err(|_| {
            json_error(
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "authentication failed, please sign in again",
            )
        })?;

    Ok((store, user))
}

async fn fallback_handler() -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "no such endpoint").into_response()
}
