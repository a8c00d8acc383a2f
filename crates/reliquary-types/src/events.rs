use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms the connection is listening for the given character
    Ready { character_id: Uuid },

    /// A row was inserted into `character_gifts`
    GiftLinked {
        id: Uuid,
        character_id: Uuid,
        gift_id: Uuid,
        created_at: chrono::DateTime<chrono::Utc>,
    },

    /// A row was inserted into `character_items`
    ItemLinked {
        id: Uuid,
        character_id: Uuid,
        item_id: Uuid,
        created_at: chrono::DateTime<chrono::Utc>,
    },
}

impl GatewayEvent {
    /// Returns the character this event is scoped to.
    /// Events that return `None` are connection-level and never broadcast.
    pub fn character_id(&self) -> Option<Uuid> {
        match self {
            Self::GiftLinked { character_id, .. } => Some(*character_id),
            Self::ItemLinked { character_id, .. } => Some(*character_id),
            Self::Ready { .. } => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Listen for insertions on the join tables for one character.
    /// Replaces any previous filter on the connection.
    Subscribe { character_id: Uuid },

    /// Stop receiving events; the server closes the connection.
    Unsubscribe,
}
