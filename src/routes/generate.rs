use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::generate::{generate_cards, GenerateError};
use crate::state::AppState;

/// Wire shape for generation failures: `{error, details?}` with a non-2xx
/// status, matching what the study view expects from this endpoint.
#[derive(Debug, Serialize)]
struct GenerateErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// Turn raw study text into candidate cards. The body is plain text; the
/// response is the bare `[{front, back}]` array. Nothing is persisted and
/// no account is required — saving is a separate, authenticated step.
pub(super) async fn generate(State(state): State<AppState>, body: String) -> impl IntoResponse {
    let generator = state.generator();

    match generate_cards(generator.as_ref(), &body).await {
        Ok(cards) => (StatusCode::OK, Json(cards)).into_response(),
        Err(GenerateError::EmptyInput) => (
            StatusCode::BAD_REQUEST,
            Json(GenerateErrorBody {
                error: "please enter some text to generate flashcards".to_string(),
                details: None,
            }),
        )
            .into_response(),
        Err(GenerateError::Service { reason, details }) => {
            tracing::warn!(strategy = generator.name(), reason, "generation failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(GenerateErrorBody {
                    error: "failed to generate flashcards".to_string(),
                    details: Some(match details {
                        Some(details) => format!("{reason}: {details}"),
                        None => reason,
                    }),
                }),
            )
                .into_response()
        }
    }
}
