//! Database row types: these map directly to SQLite rows.
//! Ids are stored as TEXT and only parsed when converting to the shared models.

use anyhow::Result;
use reliquary_types::models::{Character, Gift, GiftEntry, Item, ItemEntry};

pub struct CharacterRow {
    pub id: String,
    pub name: String,
    pub image_url: Option<String>,
    pub has_pin: bool,
    pub pin_hash: Option<String>,
}

pub struct GiftRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub uses_per_short_rest: u32,
    pub uses_per_long_rest: u32,
}

pub struct ItemRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub image_url: String,
}

/// A join row with its gift or item columns.
pub struct LinkRow<T> {
    pub id: String,
    pub target: T,
}

impl CharacterRow {
    pub fn into_model(self) -> Result<Character> {
        Ok(Character {
            id: self.id.parse()?,
            name: self.name,
            image_url: self.image_url,
            has_pin: self.has_pin,
            pin_hash: self.pin_hash,
        })
    }
}

impl GiftRow {
    pub fn into_model(self) -> Result<Gift> {
        Ok(Gift {
            id: self.id.parse()?,
            name: self.name,
            description: self.description,
            uses_per_short_rest: self.uses_per_short_rest,
            uses_per_long_rest: self.uses_per_long_rest,
        })
    }
}

impl ItemRow {
    pub fn into_model(self) -> Result<Item> {
        Ok(Item {
            id: self.id.parse()?,
            name: self.name,
            description: self.description,
            image_url: self.image_url,
        })
    }
}

impl LinkRow<GiftRow> {
    pub fn into_model(self) -> Result<GiftEntry> {
        Ok(GiftEntry {
            id: self.id.parse()?,
            gift: self.target.into_model()?,
        })
    }
}

impl LinkRow<ItemRow> {
    pub fn into_model(self) -> Result<ItemEntry> {
        Ok(ItemEntry {
            id: self.id.parse()?,
            item: self.target.into_model()?,
        })
    }
}
