pub mod assign;
pub mod characters;
pub mod roster;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, put},
};
use tracing::error;

use reliquary_db::Database;
use reliquary_gateway::dispatcher::Dispatcher;
use reliquary_types::api::HealthResponse;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub dispatcher: Dispatcher,
}

/// REST routes of the record service. The gateway route is mounted by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/characters", get(characters::list_characters))
        .route("/characters/{id}", get(characters::get_character))
        .route("/characters/by-name/{name}", get(characters::get_character_by_name))
        .route("/characters/{id}/pin", put(characters::set_pin))
        .route(
            "/characters/{id}/gifts",
            get(roster::gift_roster).post(assign::create_gift_and_link),
        )
        .route(
            "/characters/{id}/items",
            get(roster::item_roster).post(assign::create_item_and_link),
        )
        .route("/gifts/{id}", get(roster::get_gift))
        .route("/items/{id}", get(roster::get_item))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        listeners: state.dispatcher.listener_count(),
    })
}

/// Run blocking DB work off the async runtime.
pub(crate) async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, StatusCode>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("DB error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}
