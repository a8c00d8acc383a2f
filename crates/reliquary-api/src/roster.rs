use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;
use uuid::Uuid;

use reliquary_types::models::{GiftEntry, ItemEntry};

use crate::{AppState, run_db};

/// GET /characters/{id}/gifts: join rows with their gift, in link order.
/// Display order is the client's concern.
pub async fn gift_roster(
    State(state): State<AppState>,
    Path(character_id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    let rows = run_db(&state, move |db| db.gift_roster(&character_id.to_string())).await?;

    let entries = rows
        .into_iter()
        .map(|row| row.into_model())
        .collect::<anyhow::Result<Vec<GiftEntry>>>()
        .map_err(|e| {
            error!("Corrupt gift link for character {}: {}", character_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(entries))
}

pub async fn item_roster(
    State(state): State<AppState>,
    Path(character_id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    let rows = run_db(&state, move |db| db.item_roster(&character_id.to_string())).await?;

    let entries = rows
        .into_iter()
        .map(|row| row.into_model())
        .collect::<anyhow::Result<Vec<ItemEntry>>>()
        .map_err(|e| {
            error!("Corrupt item link for character {}: {}", character_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(entries))
}

pub async fn get_gift(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    let row = run_db(&state, move |db| db.get_gift(&id.to_string()))
        .await?
        .ok_or(StatusCode::NOT_FOUND)?;

    let gift = row.into_model().map_err(|e| {
        error!("Corrupt gift row {}: {}", id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(gift))
}

pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    let row = run_db(&state, move |db| db.get_item(&id.to_string()))
        .await?
        .ok_or(StatusCode::NOT_FOUND)?;

    let item = row.into_model().map_err(|e| {
        error!("Corrupt item row {}: {}", id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(item))
}
