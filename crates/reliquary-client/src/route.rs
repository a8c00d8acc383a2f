use std::fmt;

use uuid::Uuid;

use reliquary_types::session::Session;

/// Client-side routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// `/`: character selection and PIN pad
    Entry,
    /// `/character/:id`: a player's sheet
    Character(Uuid),
    /// `/admin`: the game master's panel
    Admin,
}

impl Route {
    pub fn parse(path: &str) -> Option<Self> {
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            "" => Some(Self::Entry),
            "/admin" => Some(Self::Admin),
            _ => trimmed
                .strip_prefix("/character/")
                .and_then(|id| id.parse().ok())
                .map(Self::Character),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Self::Entry => "/".to_string(),
            Self::Character(id) => format!("/character/{}", id),
            Self::Admin => "/admin".to_string(),
        }
    }

    /// Where a freshly authenticated session lands.
    pub fn home(session: &Session) -> Self {
        match session {
            Session::Admin => Self::Admin,
            Session::Player { character_id } => Self::Character(*character_id),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
