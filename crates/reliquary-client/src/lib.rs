//! Client core for Reliquary.
//!
//! Everything a player or the game master does goes through here:
//!
//! 1. **Entry**: pick a character and register or enter its PIN ([`EntryFlow`])
//! 2. **Guard**: every protected route checks the [`SessionContext`] first ([`guard`])
//! 3. **Character sheet**: the live, alphabetically sorted gift/item roster
//!    ([`CharacterView`]), kept current from gateway push events
//! 4. **Admin panel**: create gifts/items and link them to a player ([`AdminPanel`])
//!
//! The record service is reached through the [`Backend`] trait;
//! [`HttpBackend`] is the production implementation.

mod admin;
mod app;
mod backend;
mod config;
mod entry;
pub mod guard;
mod http;
mod pin;
mod roster;
mod route;
mod session;
mod view;

pub use admin::{AdminError, AdminPanel, GiftForm, ItemForm};
pub use app::{Client, ClientError, Screen};
pub use backend::{Backend, BackendError, LinkEvent, Subscription, with_timeout};
pub use config::{ClientConfig, ConfigError};
pub use entry::{EntryError, EntryFlow, PinState};
pub use guard::{Access, Entered};
pub use http::HttpBackend;
pub use pin::{PIN_LENGTH, PinHasher, PinInput};
pub use roster::{Listed, Roster, RosterEntry, RosterList};
pub use route::Route;
pub use session::{SessionContext, SessionStore, SessionStoreError};
pub use view::{CharacterSheet, CharacterView, ViewError};

pub use reliquary_types::session::Session;
