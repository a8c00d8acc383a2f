use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display name of the character that unlocks the game-master panel.
pub const GAME_MASTER_NAME: &str = "???";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
    pub has_pin: bool,
    /// Argon2 PHC string, present once a PIN has been registered.
    pub pin_hash: Option<String>,
}

impl Character {
    pub fn is_game_master(&self) -> bool {
        self.name == GAME_MASTER_NAME
    }
}

/// A narrative ability with per-rest usage limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gift {
    pub id: Uuid,
    pub name: String,
    /// Rich text (HTML) as produced by the admin editor.
    pub description: String,
    pub uses_per_short_rest: u32,
    pub uses_per_long_rest: u32,
}

/// A unique narrative object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub image_url: String,
}

/// A `character_gifts` join row together with the gift it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftEntry {
    pub id: Uuid,
    pub gift: Gift,
}

/// A `character_items` join row together with the item it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemEntry {
    pub id: Uuid,
    pub item: Item,
}
