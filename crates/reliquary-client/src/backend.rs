//! The record service as seen from the client.
//!
//! The service is a plain record store with insert notifications; it owns
//! no sessions and makes no authorization decisions. [`Backend`] is the seam
//! the entry flow, the character view and the admin panel are written
//! against, so they can run over HTTP ([`crate::HttpBackend`]) or over an
//! in-memory store in tests.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;

use reliquary_types::api::{NewGift, NewItem};
use reliquary_types::events::GatewayEvent;
use reliquary_types::models::{Character, Gift, GiftEntry, Item, ItemEntry};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("record not found")]
    NotFound,

    #[error("record service rejected the request with status {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway failed: {0}")]
    Gateway(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("gateway protocol error: {0}")]
    Protocol(String),

    #[error("record service unavailable: {0}")]
    Unavailable(String),

    #[error("no response after {0:?}")]
    Timeout(Duration),
}

impl BackendError {
    /// Whether trying the same call again might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NotFound | Self::Protocol(_) => false,
            Self::Status(code) => *code >= 500,
            Self::Http(_) | Self::Gateway(_) | Self::Unavailable(_) | Self::Timeout(_) => true,
        }
    }
}

/// Bound a backend call so an unresponsive service surfaces as an error
/// instead of leaving a view loading forever.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| BackendError::Timeout(limit))?
}

/// A new join record, as announced by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Gift {
        id: Uuid,
        character_id: Uuid,
        gift_id: Uuid,
    },
    Item {
        id: Uuid,
        character_id: Uuid,
        item_id: Uuid,
    },
}

impl LinkEvent {
    pub fn from_gateway(event: GatewayEvent) -> Option<Self> {
        match event {
            GatewayEvent::GiftLinked {
                id,
                character_id,
                gift_id,
                ..
            } => Some(Self::Gift {
                id,
                character_id,
                gift_id,
            }),
            GatewayEvent::ItemLinked {
                id,
                character_id,
                item_id,
                ..
            } => Some(Self::Item {
                id,
                character_id,
                item_id,
            }),
            GatewayEvent::Ready { .. } => None,
        }
    }

    /// Id of the join record.
    pub fn link_id(&self) -> Uuid {
        match self {
            Self::Gift { id, .. } | Self::Item { id, .. } => *id,
        }
    }

    pub fn character_id(&self) -> Uuid {
        match self {
            Self::Gift { character_id, .. } | Self::Item { character_id, .. } => *character_id,
        }
    }
}

/// A live feed of join-table inserts for one character.
///
/// The feed is lazy, unbounded and cannot be restarted. Releasing it runs
/// the backend's unsubscribe hook exactly once, whether through
/// [`Subscription::unsubscribe`] or by dropping it.
pub struct Subscription {
    events: mpsc::UnboundedReceiver<LinkEvent>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        events: mpsc::UnboundedReceiver<LinkEvent>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            events,
            release: Some(Box::new(release)),
        }
    }

    /// Next event, or `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<LinkEvent> {
        if self.release.is_none() {
            return None;
        }
        self.events.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if let Some(release) = self.release.take() {
            self.events.close();
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_once();
    }
}

/// Record fetch, insert, update and insert-subscription.
///
/// Lookups that can miss return `Ok(None)`; every other failure is a
/// [`BackendError`].
pub trait Backend: Send + Sync + 'static {
    fn characters(&self) -> impl Future<Output = Result<Vec<Character>, BackendError>> + Send;

    fn character(&self, id: Uuid) -> impl Future<Output = Result<Option<Character>, BackendError>> + Send;

    fn character_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Character>, BackendError>> + Send;

    /// Store a PIN hash and flag the character as having a PIN.
    fn set_pin_hash(
        &self,
        character_id: Uuid,
        pin_hash: &str,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn gift_roster(
        &self,
        character_id: Uuid,
    ) -> impl Future<Output = Result<Vec<GiftEntry>, BackendError>> + Send;

    fn item_roster(
        &self,
        character_id: Uuid,
    ) -> impl Future<Output = Result<Vec<ItemEntry>, BackendError>> + Send;

    fn gift(&self, id: Uuid) -> impl Future<Output = Result<Option<Gift>, BackendError>> + Send;

    fn item(&self, id: Uuid) -> impl Future<Output = Result<Option<Item>, BackendError>> + Send;

    /// Create the gift and its join row as one unit.
    fn create_gift_and_link(
        &self,
        character_id: Uuid,
        gift: &NewGift,
    ) -> impl Future<Output = Result<GiftEntry, BackendError>> + Send;

    /// Create the item and its join row as one unit.
    fn create_item_and_link(
        &self,
        character_id: Uuid,
        item: &NewItem,
    ) -> impl Future<Output = Result<ItemEntry, BackendError>> + Send;

    /// Subscribe to join-table inserts for one character, filtered on the
    /// service side. Resolves once the service is listening.
    fn subscribe_links(
        &self,
        character_id: Uuid,
    ) -> impl Future<Output = Result<Subscription, BackendError>> + Send;
}
