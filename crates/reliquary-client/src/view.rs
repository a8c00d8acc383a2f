use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use reliquary_types::models::{Character, Gift, GiftEntry, Item, ItemEntry};

use crate::backend::{Backend, BackendError, LinkEvent, Subscription, with_timeout};
use crate::guard::{self, Access, Entered};
use crate::roster::{Listed, Roster};
use crate::route::Route;
use crate::session::SessionContext;

#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("character {0} does not exist")]
    CharacterNotFound(Uuid),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ViewError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::CharacterNotFound(_) => false,
            Self::Backend(e) => e.is_retryable(),
        }
    }
}

/// A rendered character sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterSheet {
    pub character: Character,
    pub gifts: Vec<Listed<Gift>>,
    pub items: Vec<Listed<Item>>,
    /// Set while a pushed entry could not be loaded or the feed is gone.
    pub error: Option<String>,
}

/// Delay before the first retry of a failed detail fetch.
const RETRY_BASE: Duration = Duration::from_millis(250);
const RETRY_MAX: Duration = Duration::from_secs(30);

fn retry_delay(attempts: u32) -> Duration {
    RETRY_BASE.saturating_mul(1 << attempts.min(7)).min(RETRY_MAX)
}

/// Shared between the view and its event task.
#[derive(Default)]
struct Live {
    roster: Roster,
    error: Option<String>,
}

/// The player view at `/character/:id`.
///
/// Holds the live roster and the task that applies gateway events to it.
/// Closing or dropping the view stops that task, which releases the
/// subscription.
pub struct CharacterView {
    character: Character,
    live: Arc<RwLock<Live>>,
    updates: watch::Receiver<u64>,
    cancel: CancellationToken,
    pump: Option<JoinHandle<()>>,
}

impl CharacterView {
    /// Guard, subscribe, then fetch the baseline.
    ///
    /// The subscription is opened before the fetch so an assignment made
    /// in between is not lost; the roster merges both by join id.
    pub async fn enter<B: Backend>(
        backend: Arc<B>,
        session: &SessionContext,
        character_id: Uuid,
        fetch_timeout: Duration,
    ) -> Result<Entered<Self>, ViewError> {
        let route = Route::Character(character_id);
        if let Access::Redirect(to) = guard::authorize(session.current().as_ref(), &route) {
            debug!("Denied {}, redirecting to {}", route, to);
            return Ok(Entered::Redirect(to));
        }

        let subscription = with_timeout(fetch_timeout, backend.subscribe_links(character_id)).await?;

        let live = Arc::new(RwLock::new(Live::default()));
        let (updates_tx, updates) = watch::channel(0u64);
        let cancel = CancellationToken::new();
        let pump = Pump {
            backend: backend.clone(),
            live: live.clone(),
            updates: updates_tx.clone(),
            fetch_timeout,
            pending: Vec::new(),
            feed_open: true,
        };
        let pump = tokio::spawn(pump.run(subscription, cancel.clone()));

        // From here on, dropping `view` on an error path tears the pump down.
        let mut view = Self {
            character: placeholder(character_id),
            live,
            updates,
            cancel,
            pump: Some(pump),
        };

        let (character, gifts, items) = tokio::try_join!(
            with_timeout(fetch_timeout, backend.character(character_id)),
            with_timeout(fetch_timeout, backend.gift_roster(character_id)),
            with_timeout(fetch_timeout, backend.item_roster(character_id)),
        )?;
        view.character = character.ok_or(ViewError::CharacterNotFound(character_id))?;

        {
            let mut live = view.live.write().unwrap_or_else(PoisonError::into_inner);
            live.roster.gifts.merge_baseline(gifts);
            live.roster.items.merge_baseline(items);
        }
        updates_tx.send_modify(|rev| *rev += 1);

        info!("Opened sheet of {} ({})", view.character.name, character_id);
        Ok(Entered::View(view))
    }

    pub fn character(&self) -> &Character {
        &self.character
    }

    /// Current sheet, sorted for display.
    pub fn render(&self) -> CharacterSheet {
        let live = self.live.read().unwrap_or_else(PoisonError::into_inner);
        CharacterSheet {
            character: self.character.clone(),
            gifts: live.roster.gifts.listed(),
            items: live.roster.items.listed(),
            error: live.error.clone(),
        }
    }

    /// Why the sheet may be missing pushed entries. Cleared once every
    /// failed entry has been loaded.
    pub fn last_error(&self) -> Option<String> {
        self.live.read().unwrap_or_else(PoisonError::into_inner).error.clone()
    }

    /// Wait until the roster changes. Returns false once the event feed has
    /// stopped and no further changes can arrive.
    pub async fn changed(&mut self) -> bool {
        self.updates.changed().await.is_ok()
    }

    /// Tear the view down and wait for the subscription to be released.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(pump) = self.pump.take() {
            if let Err(e) = pump.await {
                warn!("Roster event task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for CharacterView {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Stands in until the baseline fetch resolves; never rendered.
fn placeholder(id: Uuid) -> Character {
    Character {
        id,
        name: String::new(),
        image_url: None,
        has_pin: false,
        pin_hash: None,
    }
}

/// A pushed event whose detail fetch failed and is waiting for another try.
struct Pending {
    event: LinkEvent,
    attempts: u32,
    due: Instant,
}

/// Applies gateway events to the live roster until cancelled.
struct Pump<B> {
    backend: Arc<B>,
    live: Arc<RwLock<Live>>,
    updates: watch::Sender<u64>,
    fetch_timeout: Duration,
    pending: Vec<Pending>,
    feed_open: bool,
}

impl<B: Backend> Pump<B> {
    async fn run(mut self, mut subscription: Subscription, cancel: CancellationToken) {
        'pump: loop {
            let next_due = self.pending.iter().map(|p| p.due).min();

            tokio::select! {
                _ = cancel.cancelled() => break,
                event = subscription.next(), if self.feed_open => match event {
                    Some(event) => {
                        if self.pending.iter().any(|p| p.event.link_id() == event.link_id()) {
                            continue;
                        }
                        if !self.attempt(event, 0, &cancel).await {
                            break;
                        }
                    }
                    None => {
                        warn!("Roster feed ended");
                        self.feed_open = false;
                        self.set_error(Some("Live updates stopped".to_string()));
                    }
                },
                _ = wait_until(next_due) => {
                    let now = Instant::now();
                    let (due, waiting): (Vec<_>, Vec<_>) =
                        std::mem::take(&mut self.pending).into_iter().partition(|p| p.due <= now);
                    self.pending = waiting;
                    for retry in due {
                        if !self.attempt(retry.event, retry.attempts, &cancel).await {
                            break 'pump;
                        }
                    }
                }
            }

            if !self.feed_open && self.pending.is_empty() {
                break;
            }
        }

        subscription.unsubscribe();
    }

    /// Try to apply one event. Returns false if cancelled mid-fetch.
    async fn attempt(&mut self, event: LinkEvent, attempts: u32, cancel: &CancellationToken) -> bool {
        let known = self
            .live
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .roster
            .contains(event.link_id());
        if known {
            debug!("Skipping duplicate link event {}", event.link_id());
            return true;
        }

        let applied = tokio::select! {
            _ = cancel.cancelled() => return false,
            applied = apply_event(self.backend.as_ref(), &self.live, event, self.fetch_timeout) => applied,
        };

        match applied {
            Ok(changed) => {
                if changed {
                    self.bump();
                }
                if self.feed_open && self.pending.is_empty() {
                    self.set_error(None);
                }
            }
            Err(e) if e.is_retryable() => {
                let delay = retry_delay(attempts);
                warn!(
                    "Failed to load link {} (attempt {}), retrying in {:?}: {}",
                    event.link_id(),
                    attempts + 1,
                    delay,
                    e
                );
                self.pending.push(Pending {
                    event,
                    attempts: attempts + 1,
                    due: Instant::now() + delay,
                });
                self.set_error(Some(format!("Could not load a new entry: {e}")));
            }
            Err(e) => {
                warn!("Dropping link event {}: {}", event.link_id(), e);
                self.set_error(Some(format!("Could not load a new entry: {e}")));
            }
        }
        true
    }

    fn set_error(&self, error: Option<String>) {
        let changed = {
            let mut live = self.live.write().unwrap_or_else(PoisonError::into_inner);
            let changed = live.error != error;
            live.error = error;
            changed
        };
        if changed {
            self.bump();
        }
    }

    fn bump(&self) {
        self.updates.send_modify(|rev| *rev += 1);
    }
}

async fn wait_until(due: Option<Instant>) {
    match due {
        Some(due) => tokio::time::sleep_until(due).await,
        None => std::future::pending().await,
    }
}

/// Fetch the detail an event points at and add it to the roster.
/// Returns whether the roster changed.
async fn apply_event<B: Backend>(
    backend: &B,
    live: &RwLock<Live>,
    event: LinkEvent,
    fetch_timeout: Duration,
) -> Result<bool, BackendError> {
    match event {
        LinkEvent::Gift { id, gift_id, .. } => {
            let Some(gift) = with_timeout(fetch_timeout, backend.gift(gift_id)).await? else {
                warn!("Linked gift {} no longer exists", gift_id);
                return Ok(false);
            };
            let mut live = live.write().unwrap_or_else(PoisonError::into_inner);
            Ok(live.roster.gifts.push(GiftEntry { id, gift }))
        }
        LinkEvent::Item { id, item_id, .. } => {
            let Some(item) = with_timeout(fetch_timeout, backend.item(item_id)).await? else {
                warn!("Linked item {} no longer exists", item_id);
                return Ok(false);
            };
            let mut live = live.write().unwrap_or_else(PoisonError::into_inner);
            Ok(live.roster.items.push(ItemEntry { id, item }))
        }
    }
}
