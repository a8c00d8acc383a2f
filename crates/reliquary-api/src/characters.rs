use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, info};
use uuid::Uuid;

use reliquary_types::api::SetPinRequest;
use reliquary_types::models::Character;

use crate::{AppState, run_db};

pub async fn list_characters(State(state): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    let rows = run_db(&state, |db| db.list_characters()).await?;

    let characters = rows
        .into_iter()
        .map(|row| row.into_model())
        .collect::<anyhow::Result<Vec<Character>>>()
        .map_err(|e| {
            error!("Corrupt character row: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(characters))
}

pub async fn get_character(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    let row = run_db(&state, move |db| db.get_character(&id.to_string()))
        .await?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(to_model(row)?))
}

pub async fn get_character_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let row = run_db(&state, move |db| db.get_character_by_name(&name))
        .await?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(to_model(row)?))
}

/// PUT /characters/{id}/pin: stores a hash computed by the client.
/// The service never sees the PIN itself.
pub async fn set_pin(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetPinRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.pin_hash.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let updated = run_db(&state, move |db| db.set_pin_hash(&id.to_string(), &req.pin_hash)).await?;
    if !updated {
        return Err(StatusCode::NOT_FOUND);
    }

    info!("PIN registered for character {}", id);
    Ok(StatusCode::NO_CONTENT)
}

fn to_model(row: reliquary_db::models::CharacterRow) -> Result<Character, StatusCode> {
    row.into_model().map_err(|e| {
        error!("Corrupt character row: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
