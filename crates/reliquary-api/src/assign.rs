use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, info};
use uuid::Uuid;

use reliquary_db::models::{GiftRow, ItemRow};
use reliquary_types::api::{NewGift, NewItem};
use reliquary_types::events::GatewayEvent;
use reliquary_types::models::{GiftEntry, ItemEntry};

use crate::{AppState, run_db};

/// POST /characters/{id}/gifts: creates the gift and its join row atomically,
/// then announces the join row on the gateway.
pub async fn create_gift_and_link(
    State(state): State<AppState>,
    Path(character_id): Path<Uuid>,
    Json(req): Json<NewGift>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.name.trim().is_empty() || req.description.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let gift_id = Uuid::new_v4();
    let link_id = Uuid::new_v4();
    let row = GiftRow {
        id: gift_id.to_string(),
        name: req.name,
        description: req.description,
        uses_per_short_rest: req.uses_per_short_rest,
        uses_per_long_rest: req.uses_per_long_rest,
    };

    let (created, row) = run_db(&state, move |db| {
        let created = db.create_gift_and_link(&link_id.to_string(), &character_id.to_string(), &row)?;
        Ok((created, row))
    })
    .await?;
    if !created {
        return Err(StatusCode::NOT_FOUND);
    }

    info!("Gift '{}' linked to character {}", row.name, character_id);

    state.dispatcher.broadcast(GatewayEvent::GiftLinked {
        id: link_id,
        character_id,
        gift_id,
        created_at: chrono::Utc::now(),
    });

    let gift = row.into_model().map_err(|e| {
        error!("Gift {} failed to convert after insert: {}", gift_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok((StatusCode::CREATED, Json(GiftEntry { id: link_id, gift })))
}

/// POST /characters/{id}/items: same contract as gifts.
pub async fn create_item_and_link(
    State(state): State<AppState>,
    Path(character_id): Path<Uuid>,
    Json(req): Json<NewItem>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.name.trim().is_empty()
        || req.description.trim().is_empty()
        || req.image_url.trim().is_empty()
    {
        return Err(StatusCode::BAD_REQUEST);
    }

    let item_id = Uuid::new_v4();
    let link_id = Uuid::new_v4();
    let row = ItemRow {
        id: item_id.to_string(),
        name: req.name,
        description: req.description,
        image_url: req.image_url,
    };

    let (created, row) = run_db(&state, move |db| {
        let created = db.create_item_and_link(&link_id.to_string(), &character_id.to_string(), &row)?;
        Ok((created, row))
    })
    .await?;
    if !created {
        return Err(StatusCode::NOT_FOUND);
    }

    info!("Item '{}' linked to character {}", row.name, character_id);

    state.dispatcher.broadcast(GatewayEvent::ItemLinked {
        id: link_id,
        character_id,
        item_id,
        created_at: chrono::Utc::now(),
    });

    let item = row.into_model().map_err(|e| {
        error!("Item {} failed to convert after insert: {}", item_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok((StatusCode::CREATED, Json(ItemEntry { id: link_id, item })))
}
