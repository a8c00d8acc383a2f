//! Character selection and PIN pad.
//!
//! ```text
//! Select ──select(name)──▶ Register   (no PIN yet)
//!        └────────────────▶ Enter      (PIN set)
//! Register/Enter ──submit──▶ Authenticated
//! Register/Enter ──back────▶ Select
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use reliquary_types::models::Character;
use reliquary_types::session::Session;

use crate::backend::{Backend, BackendError, with_timeout};
use crate::pin::{PIN_LENGTH, PinHasher, PinInput};
use crate::route::Route;
use crate::session::{SessionContext, SessionStoreError};

#[derive(Debug, thiserror::Error)]
pub enum EntryError {
    #[error("PIN must be {} digits", PIN_LENGTH)]
    IncompletePin,

    /// Deliberately says nothing about why.
    #[error("Wrong PIN")]
    WrongPin,

    #[error("no character selected")]
    NoCharacterSelected,

    #[error("no character named '{0}'")]
    UnknownCharacter(String),

    #[error("failed to hash PIN: {0}")]
    Hash(#[from] argon2::password_hash::Error),

    #[error("PIN worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("failed to store session: {0}")]
    Session(#[from] SessionStoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinState {
    Select,
    /// First visit: the typed PIN becomes the character's PIN.
    Register { character: Character, pin: PinInput },
    Enter { character: Character, pin: PinInput },
    Authenticated(Session),
}

impl PinState {
    /// The state a freshly fetched character leads to.
    pub fn selected(character: Character) -> Self {
        if character.has_pin {
            Self::Enter {
                character,
                pin: PinInput::new(),
            }
        } else {
            Self::Register {
                character,
                pin: PinInput::new(),
            }
        }
    }

    pub fn character(&self) -> Option<&Character> {
        match self {
            Self::Register { character, .. } | Self::Enter { character, .. } => Some(character),
            Self::Select | Self::Authenticated(_) => None,
        }
    }

    pub fn pin(&self) -> Option<&PinInput> {
        match self {
            Self::Register { pin, .. } | Self::Enter { pin, .. } => Some(pin),
            Self::Select | Self::Authenticated(_) => None,
        }
    }

    fn pin_mut(&mut self) -> Option<&mut PinInput> {
        match self {
            Self::Register { pin, .. } | Self::Enter { pin, .. } => Some(pin),
            Self::Select | Self::Authenticated(_) => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// Drives [`PinState`] against the record service and the session store.
pub struct EntryFlow<B> {
    backend: Arc<B>,
    session: SessionContext,
    hasher: PinHasher,
    fetch_timeout: Duration,
    state: PinState,
    error: Option<String>,
}

impl<B: Backend> EntryFlow<B> {
    pub fn new(backend: Arc<B>, session: SessionContext, hasher: PinHasher, fetch_timeout: Duration) -> Self {
        Self {
            backend,
            session,
            hasher,
            fetch_timeout,
            state: PinState::Select,
            error: None,
        }
    }

    pub fn state(&self) -> &PinState {
        &self.state
    }

    /// Message to show under the PIN pad, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Pick a character from the selection grid.
    pub async fn select(&mut self, name: &str) -> Result<(), EntryError> {
        self.error = None;
        let found = with_timeout(self.fetch_timeout, self.backend.character_by_name(name)).await;

        match found {
            Ok(Some(character)) => {
                debug!("Selected {} (has_pin: {})", character.name, character.has_pin);
                self.state = PinState::selected(character);
                Ok(())
            }
            Ok(None) => self.fail(EntryError::UnknownCharacter(name.to_string())),
            Err(e) => self.fail(e.into()),
        }
    }

    /// Returns false if the digit was rejected.
    pub fn press_digit(&mut self, digit: u8) -> bool {
        let Some(pin) = self.state.pin_mut() else {
            return false;
        };
        let accepted = pin.push(digit);
        if accepted {
            self.error = None;
        }
        accepted
    }

    pub fn remove_digit(&mut self) {
        if let Some(pin) = self.state.pin_mut() {
            pin.pop();
        }
    }

    pub fn back(&mut self) {
        if !self.state.is_authenticated() {
            self.state = PinState::Select;
            self.error = None;
        }
    }

    /// Register or check the typed PIN. On success the session is
    /// established and persisted, and the route to navigate to is returned.
    pub async fn submit(&mut self) -> Result<Route, EntryError> {
        let typed = match &self.state {
            PinState::Authenticated(session) => return Ok(Route::home(session)),
            PinState::Select => None,
            PinState::Register { character, pin } => Some((character.clone(), pin.clone(), true)),
            PinState::Enter { character, pin } => Some((character.clone(), pin.clone(), false)),
        };
        let Some((character, pin, registering)) = typed else {
            return self.fail(EntryError::NoCharacterSelected);
        };

        if !pin.is_complete() {
            return self.fail(EntryError::IncompletePin);
        }

        let result = if registering {
            self.register(&character, pin).await
        } else {
            self.verify(&character, pin).await
        };
        if let Err(e) = result {
            if matches!(e, EntryError::WrongPin) {
                warn!("Rejected PIN for {}", character.name);
                if let Some(pin) = self.state.pin_mut() {
                    pin.clear();
                }
            }
            return self.fail(e);
        }

        let session = Session::for_character(&character);
        if let Err(e) = self.session.establish(session) {
            return self.fail(e.into());
        }
        info!("{} entered as {:?}", character.name, session);

        self.state = PinState::Authenticated(session);
        self.error = None;
        Ok(Route::home(&session))
    }

    async fn register(&self, character: &Character, pin: PinInput) -> Result<(), EntryError> {
        let hasher = self.hasher.clone();
        let hash = tokio::task::spawn_blocking(move || hasher.hash(pin.as_str())).await??;

        with_timeout(self.fetch_timeout, self.backend.set_pin_hash(character.id, &hash)).await?;
        info!("Registered PIN for {}", character.name);
        Ok(())
    }

    async fn verify(&self, character: &Character, pin: PinInput) -> Result<(), EntryError> {
        let Some(hash) = character.pin_hash.clone() else {
            return Err(EntryError::WrongPin);
        };
        let hasher = self.hasher.clone();
        let valid = tokio::task::spawn_blocking(move || hasher.verify(pin.as_str(), &hash)).await?;

        if valid { Ok(()) } else { Err(EntryError::WrongPin) }
    }

    fn fail<T>(&mut self, error: EntryError) -> Result<T, EntryError> {
        self.error = Some(error.to_string());
        Err(error)
    }
}
