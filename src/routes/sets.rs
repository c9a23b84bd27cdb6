use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mastery::{aggregate, tier, MasteryTier};
use crate::model::{MasteryLevel, Set};
use crate::response::AppError;
use crate::state::AppState;
use crate::store::{NewCard, StoreError};

#[derive(Serialize)]
struct SuccessResponse<T> {
    success: bool,
    data: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateSetRequest {
    title: String,
    cards: Vec<CreateCardRequest>,
}

#[derive(Debug, Deserialize)]
struct CreateCardRequest {
    front: String,
    back: String,
    /// Mastery accumulated while studying the unsaved list, if any.
    #[serde(default)]
    mastery: Option<MasteryLevel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateMasteryRequest {
    value: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SetSummaryDto {
    id: String,
    title: String,
    card_count: usize,
    mastery: u8,
    tier: MasteryTier,
    created_at: DateTime<Utc>,
}

impl SetSummaryDto {
    fn from_set(set: &Set) -> Self {
        let mastery = aggregate(&set.cards);
        Self {
            id: set.id.clone(),
            title: set.title.clone(),
            card_count: set.cards.len(),
            mastery,
            tier: tier(mastery),
            created_at: set.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SetDetailDto {
    #[serde(flatten)]
    summary: SetSummaryDto,
    cards: Vec<crate::model::Card>,
}

pub(super) async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let (store, user) = super::require_user(&state, &headers).await?;

    let sets = store
        .list_sets(&user.id)
        .await
        .map_err(map_store_error)?;

    let summaries: Vec<SetSummaryDto> = sets.iter().map(SetSummaryDto::from_set).collect();
    Ok(Json(SuccessResponse {
        success: true,
        data: summaries,
    }))
}

pub(super) async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateSetRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (store, user) = super::require_user(&state, &headers).await?;

    let cards: Vec<NewCard> = payload
        .cards
        .into_iter()
        .map(|card| NewCard {
            front: card.front,
            back: card.back,
            mastery: card.mastery.unwrap_or_default(),
        })
        .collect();

    let set = store
        .create_set(&user.id, &payload.title, &cards)
        .await
        .map_err(map_store_error)?;

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse {
            success: true,
            data: SetDetailDto {
                summary: SetSummaryDto::from_set(&set),
                cards: set.cards,
            },
        }),
    ))
}

pub(super) async fn get_one(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(set_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (store, user) = super::require_user(&state, &headers).await?;

    let set = store
        .get_set(&user.id, &set_id)
        .await
        .map_err(map_store_error)?;

    Ok(Json(SuccessResponse {
        success: true,
        data: SetDetailDto {
            summary: SetSummaryDto::from_set(&set),
            cards: set.cards,
        },
    }))
}

/// Direct store write for a card's mastery, for callers reviewing without a
/// live session open.
pub(super) async fn update_mastery(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((set_id, card_id)): Path<(String, String)>,
    Json(payload): Json<UpdateMasteryRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (store, user) = super::require_user(&state, &headers).await?;

    let level = MasteryLevel::from_percent(payload.value).map_err(|err| {
        // Out-of-range levels come from a broken client build, not the user.
        tracing::error!(error = %err, "rejected mastery write");
        AppError::internal(err.to_string())
    })?;

    store
        .update_card_mastery(&user.id, &set_id, &card_id, level)
        .await
        .map_err(map_store_error)?;

    Ok(Json(SuccessResponse {
        success: true,
        data: serde_json::json!({ "mastery": level.percent() }),
    }))
}

pub(super) fn map_store_error(err: StoreError) -> AppError {
    match err {
        StoreError::Validation(message) => AppError::validation(message),
        StoreError::SetNotFound => AppError::not_found("flashcard set not found"),
        StoreError::CardNotFound => AppError::not_found("card not found"),
        StoreError::Corrupt(message) => {
            tracing::error!(error = %message, "corrupt document rejected");
            AppError::internal(message)
        }
        StoreError::Sql(err) => {
            tracing::error!(error = %err, "database failure");
            AppError::internal(err.to_string())
        }
    }
}
