use std::convert::Infallible;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;

use crate::response::AppError;
use crate::state::AppState;

/// Server-sent stream of the authenticated user's study events: the
/// celebration hook and persistence-failure notices. Events for other
/// users are filtered out, not delivered.
pub(super) async fn stream(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (_, user) = super::require_user(&state, &headers).await?;

    let receiver = state.events().subscribe();
    let owner_id = user.id;

    let stream = BroadcastStream::new(receiver).filter_map(move |result| {
        let owner_id = owner_id.clone();
        async move {
            let envelope = match result {
                Ok(envelope) => envelope,
                // Lagged receivers skip missed events rather than erroring.
                Err(_) => return None,
            };
            if envelope.event.owner_id() != owner_id {
                return None;
            }
            let data = serde_json::to_string(&envelope.event).ok()?;
            Some(Ok(Event::default()
                .id(envelope.id)
                .event(envelope.event.event_type())
                .data(data)))
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
