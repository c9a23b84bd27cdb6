pub mod auth;
pub mod config;
pub mod events;
pub mod generate;
pub mod llm;
pub mod logging;
pub mod mastery;
pub mod model;
pub mod response;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
pub mod study;

use std::sync::Arc;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

pub async fn create_app() -> axum::Router {
    let store = match store::SetStore::from_env().await {
        Ok(store) => Some(Arc::new(store)),
        Err(err) => {
            tracing::warn!(error = %err, "set store not initialized");
            None
        }
    };

    let generator = generate::generator_from_env();
    let state = AppState::new(store, generator);

    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
