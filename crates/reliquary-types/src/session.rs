use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Character;

/// Locally trusted proof of identity, persisted as
/// `{"role":"player","characterId":"..."}` or `{"role":"admin"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Session {
    Player {
        #[serde(rename = "characterId")]
        character_id: Uuid,
    },
    Admin,
}

impl Session {
    /// The session a successful PIN check grants for `character`.
    pub fn for_character(character: &Character) -> Self {
        if character.is_game_master() {
            Self::Admin
        } else {
            Self::Player {
                character_id: character.id,
            }
        }
    }

    pub fn character_id(&self) -> Option<Uuid> {
        match self {
            Self::Player { character_id } => Some(*character_id),
            Self::Admin => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn character(name: &str) -> Character {
        Character {
            id: Uuid::new_v4(),
            name: name.to_string(),
            image_url: None,
            has_pin: true,
            pin_hash: None,
        }
    }

    #[test]
    fn game_master_gets_admin_session() {
        assert_eq!(Session::for_character(&character("???")), Session::Admin);
    }

    #[test]
    fn players_are_bound_to_their_character() {
        for name in ["Thebryan", "Thytus", "Toji", "Talik", "Danstão", "??"] {
            let c = character(name);
            assert_eq!(
                Session::for_character(&c),
                Session::Player { character_id: c.id }
            );
        }
    }

    #[test]
    fn persisted_format() {
        let id = Uuid::new_v4();
        let player = serde_json::to_value(Session::Player { character_id: id }).unwrap();
        assert_eq!(player, serde_json::json!({ "role": "player", "characterId": id }));

        let admin = serde_json::to_value(Session::Admin).unwrap();
        assert_eq!(admin, serde_json::json!({ "role": "admin" }));
    }

    #[test]
    fn player_without_character_is_rejected() {
        let parsed = serde_json::from_str::<Session>(r#"{"role":"player"}"#);
        assert!(parsed.is_err());
    }
}
