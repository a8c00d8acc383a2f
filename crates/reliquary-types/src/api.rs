use serde::{Deserialize, Serialize};

// -- Characters --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetPinRequest {
    pub pin_hash: String,
}

// -- Gifts --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewGift {
    pub name: String,
    pub description: String,
    pub uses_per_short_rest: u32,
    pub uses_per_long_rest: u32,
}

// -- Items --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewItem {
    pub name: String,
    pub description: String,
    pub image_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Gateway connections currently listening for a character
    pub listeners: usize,
}
