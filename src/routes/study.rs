use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::events::{CardMasteredPayload, StudyEvent};
use crate::mastery::{tier, MasteryTier};
use crate::model::{Card, CardDraft};
use crate::response::AppError;
use crate::session::{MasteryRecorded, StudySession};
use crate::state::AppState;
use crate::study::{spawn_mastery_persist, SessionAccessError};

use super::sets::map_store_error;

#[derive(Serialize)]
struct SuccessResponse<T> {
    success: bool,
    data: T,
}

/// Open a session either from a saved set (resuming stored mastery) or
/// from a not-yet-saved card list (all-zero mastery).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateSessionRequest {
    set_id: Option<String>,
    cards: Option<Vec<CardDraft>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoadSetRequest {
    set_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecordMasteryRequest {
    value: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CurrentCardDto {
    front: String,
    /// Only revealed once the card is flipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    back: Option<String>,
    mastery: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionViewDto {
    session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    set_id: Option<String>,
    card_count: usize,
    cursor: usize,
    flipped: bool,
    progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    card: Option<CurrentCardDto>,
    set_mastery: u8,
    tier: MasteryTier,
}

fn session_view(session_id: &str, session: &StudySession) -> SessionViewDto {
    let set_mastery = session.set_mastery();
    let card = session.current_card().map(|card| CurrentCardDto {
        front: card.front.clone(),
        back: session.flipped().then(|| card.back.clone()),
        mastery: session
            .mastery_at(session.cursor())
            .unwrap_or_default()
            .percent(),
    });

    SessionViewDto {
        session_id: session_id.to_string(),
        set_id: session.set_id().map(|id| id.to_string()),
        card_count: session.cards().len(),
        cursor: session.cursor(),
        flipped: session.flipped(),
        progress: session.progress_fraction(),
        card,
        set_mastery,
        tier: tier(set_mastery),
    }
}

pub(super) async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (store, user) = super::require_user(&state, &headers).await?;
    let registry = state.sessions();

    let (set_id, cards) = match (payload.set_id, payload.cards) {
        (Some(set_id), None) => {
            let set = store
                .get_set(&user.id, &set_id)
                .await
                .map_err(map_store_error)?;
            (Some(set.id), set.cards)
        }
        (None, Some(drafts)) => {
            if drafts.is_empty() {
                return Err(AppError::validation("cards must not be empty"));
            }
            for (index, draft) in drafts.iter().enumerate() {
                if draft.front.trim().is_empty() || draft.back.trim().is_empty() {
                    return Err(AppError::validation(format!(
                        "card {} has an empty front or back",
                        index + 1
                    )));
                }
            }
            (None, drafts.into_iter().map(Card::from_draft).collect())
        }
        _ => {
            return Err(AppError::validation(
                "provide either setId or cards, not both",
            ));
        }
    };

    let session_id = registry.create(&user.id);
    registry
        .with_session_mut(&session_id, &user.id, |session| {
            session.load(set_id, cards);
            session_view(&session_id, session)
        })
        .map(|data| {
            (
                StatusCode::CREATED,
                Json(SuccessResponse {
                    success: true,
                    data,
                }),
            )
        })
        .map_err(map_access_error)
}

async fn mutate_and_view(
    state: &AppState,
    headers: &HeaderMap,
    session_id: &str,
    mutate: impl FnOnce(&mut StudySession),
) -> Result<Json<SuccessResponse<SessionViewDto>>, AppError> {
    let (_, user) = super::require_user(state, headers).await?;
    state
        .sessions()
        .with_session_mut(session_id, &user.id, |session| {
            mutate(session);
            session_view(session_id, session)
        })
        .map(|data| {
            Json(SuccessResponse {
                success: true,
                data,
            })
        })
        .map_err(map_access_error)
}

pub(super) async fn view(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    mutate_and_view(&state, &headers, &session_id, |_| {}).await
}

pub(super) async fn flip(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    mutate_and_view(&state, &headers, &session_id, |session| session.flip()).await
}

pub(super) async fn next(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    mutate_and_view(&state, &headers, &session_id, |session| {
        session.next();
    })
    .await
}

pub(super) async fn previous(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    mutate_and_view(&state, &headers, &session_id, |session| {
        session.previous();
    })
    .await
}

/// Re-load an open session with a different saved set. The fetch runs
/// outside the registry lock; if another load lands first, this response
/// is stale and gets discarded instead of clobbering the newer state.
pub(super) async fn load_set(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
    Json(payload): Json<LoadSetRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (store, user) = super::require_user(&state, &headers).await?;
    let registry = state.sessions();

    let observed_epoch = registry
        .with_session(&session_id, &user.id, |session| session.epoch())
        .map_err(map_access_error)?;

    let set = store
        .get_set(&user.id, &payload.set_id)
        .await
        .map_err(map_store_error)?;

    registry
        .with_session_mut(&session_id, &user.id, |session| {
            if session.load_if_current(observed_epoch, Some(set.id), set.cards) {
                Ok(session_view(&session_id, session))
            } else {
                Err(AppError::conflict(
                    "session was reloaded while fetching, response discarded",
                ))
            }
        })
        .map_err(map_access_error)?
        .map(|data| {
            Json(SuccessResponse {
                success: true,
                data,
            })
        })
}

pub(super) async fn record_mastery(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
    Json(payload): Json<RecordMasteryRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (_, user) = super::require_user(&state, &headers).await?;
    let registry = state.sessions();

    let (outcome, set_id, data) = registry
        .with_session_mut(&session_id, &user.id, |session| {
            let outcome = session.record_mastery(payload.value);
            let set_id = session.set_id().map(|id| id.to_string());
            (outcome, set_id, session_view(&session_id, session))
        })
        .map_err(map_access_error)?;

    let outcome = outcome.map_err(|err| {
        // A value outside the five levels means a broken client build.
        tracing::error!(error = %err, "rejected mastery rating");
        AppError::internal(err.to_string())
    })?;

    if let Some(recorded) = outcome {
        publish_and_persist(&state, &user.id, &session_id, set_id, &recorded);
    }

    Ok(Json(SuccessResponse {
        success: true,
        data,
    }))
}

/// The synchronous part is done: announce the celebration and detach the
/// store write so the response never waits on it.
fn publish_and_persist(
    state: &AppState,
    owner_id: &str,
    session_id: &str,
    set_id: Option<String>,
    recorded: &MasteryRecorded,
) {
    if recorded.maxed {
        state
            .events()
            .publish(StudyEvent::CardMastered(CardMasteredPayload {
                owner_id: owner_id.to_string(),
                session_id: session_id.to_string(),
                set_id: set_id.clone(),
                card_index: recorded.index,
                timestamp: Utc::now(),
            }));
    }

    if let (Some(store), Some(set_id), Some(card_id)) =
        (state.store(), set_id, recorded.card_id.clone())
    {
        spawn_mastery_persist(
            store,
            state.events(),
            owner_id.to_string(),
            session_id.to_string(),
            set_id,
            card_id,
            recorded.level,
        );
    }
}

fn map_access_error(err: SessionAccessError) -> AppError {
    match err {
        SessionAccessError::NotFound => AppError::not_found("study session not found"),
        SessionAccessError::Forbidden => AppError::forbidden("study session belongs to another user"),
    }
}
