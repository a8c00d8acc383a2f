use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use reliquary_types::api::{NewGift, NewItem};
use reliquary_types::models::{Character, GiftEntry, ItemEntry};

use crate::backend::{Backend, BackendError, with_timeout};
use crate::guard::{self, Access, Entered};
use crate::roster::Roster;
use crate::route::Route;
use crate::session::SessionContext;

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("select a player first")]
    NoPlayerSelected,

    #[error("fill in every gift field")]
    IncompleteGift,

    #[error("fill in every item field")]
    IncompleteItem,

    #[error("uses must be a whole number of zero or more, got '{0}'")]
    InvalidUses(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Gift fields as typed into the admin form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GiftForm {
    pub name: String,
    pub description: String,
    pub uses_per_short_rest: String,
    pub uses_per_long_rest: String,
}

impl GiftForm {
    pub fn validate(&self) -> Result<NewGift, AdminError> {
        let fields = [
            &self.name,
            &self.description,
            &self.uses_per_short_rest,
            &self.uses_per_long_rest,
        ];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(AdminError::IncompleteGift);
        }

        Ok(NewGift {
            name: self.name.trim().to_string(),
            description: self.description.clone(),
            uses_per_short_rest: parse_uses(&self.uses_per_short_rest)?,
            uses_per_long_rest: parse_uses(&self.uses_per_long_rest)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemForm {
    pub name: String,
    pub description: String,
    pub image_url: String,
}

impl ItemForm {
    pub fn validate(&self) -> Result<NewItem, AdminError> {
        if [&self.name, &self.description, &self.image_url]
            .iter()
            .any(|f| f.trim().is_empty())
        {
            return Err(AdminError::IncompleteItem);
        }

        Ok(NewItem {
            name: self.name.trim().to_string(),
            description: self.description.clone(),
            image_url: self.image_url.trim().to_string(),
        })
    }
}

fn parse_uses(raw: &str) -> Result<u32, AdminError> {
    raw.trim()
        .parse()
        .map_err(|_| AdminError::InvalidUses(raw.to_string()))
}

/// The game master's panel at `/admin`.
pub struct AdminPanel<B> {
    backend: Arc<B>,
    fetch_timeout: Duration,
    players: Vec<Character>,
    selected: Option<Uuid>,
    roster: Roster,
}

impl<B: Backend> AdminPanel<B> {
    pub async fn enter(
        backend: Arc<B>,
        session: &SessionContext,
        fetch_timeout: Duration,
    ) -> Result<Entered<Self>, BackendError> {
        if let Access::Redirect(to) = guard::authorize(session.current().as_ref(), &Route::Admin) {
            debug!("Denied {}, redirecting to {}", Route::Admin, to);
            return Ok(Entered::Redirect(to));
        }

        let players = with_timeout(fetch_timeout, backend.characters())
            .await?
            .into_iter()
            .filter(|c| !c.is_game_master())
            .collect();

        Ok(Entered::View(Self {
            backend,
            fetch_timeout,
            players,
            selected: None,
            roster: Roster::default(),
        }))
    }

    /// Characters gifts and items can be assigned to.
    pub fn players(&self) -> &[Character] {
        &self.players
    }

    pub fn selected(&self) -> Option<&Character> {
        let id = self.selected?;
        self.players.iter().find(|c| c.id == id)
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub async fn select_player(&mut self, character_id: Uuid) -> Result<(), AdminError> {
        if !self.players.iter().any(|c| c.id == character_id) {
            return Err(AdminError::NoPlayerSelected);
        }
        self.selected = Some(character_id);
        self.roster = Roster::default();
        self.reload().await
    }

    /// Create the gift, link it to the selected player and clear the form.
    /// On any error the form is left as typed.
    pub async fn create_gift_and_link(&mut self, form: &mut GiftForm) -> Result<GiftEntry, AdminError> {
        let character_id = self.selected.ok_or(AdminError::NoPlayerSelected)?;
        let gift = form.validate()?;

        let entry = with_timeout(self.fetch_timeout, self.backend.create_gift_and_link(character_id, &gift))
            .await
            .inspect_err(|e| error!("Failed to assign gift '{}': {}", gift.name, e))?;
        info!("Assigned gift '{}' to {}", entry.gift.name, character_id);

        *form = GiftForm::default();
        self.roster.gifts.merge_baseline(vec![entry.clone()]);
        self.refresh_after_write().await;
        Ok(entry)
    }

    pub async fn create_item_and_link(&mut self, form: &mut ItemForm) -> Result<ItemEntry, AdminError> {
        let character_id = self.selected.ok_or(AdminError::NoPlayerSelected)?;
        let item = form.validate()?;

        let entry = with_timeout(self.fetch_timeout, self.backend.create_item_and_link(character_id, &item))
            .await
            .inspect_err(|e| error!("Failed to assign item '{}': {}", item.name, e))?;
        info!("Assigned item '{}' to {}", entry.item.name, character_id);

        *form = ItemForm::default();
        self.roster.items.merge_baseline(vec![entry.clone()]);
        self.refresh_after_write().await;
        Ok(entry)
    }

    /// The write already succeeded; a failed refetch only leaves the roster
    /// without other concurrent changes.
    async fn refresh_after_write(&mut self) {
        if let Err(e) = self.reload().await {
            warn!("Failed to reload roster after assignment: {}", e);
        }
    }

    /// Refetch the selected player's roster.
    pub async fn reload(&mut self) -> Result<(), AdminError> {
        let character_id = self.selected.ok_or(AdminError::NoPlayerSelected)?;
        let (gifts, items) = tokio::try_join!(
            with_timeout(self.fetch_timeout, self.backend.gift_roster(character_id)),
            with_timeout(self.fetch_timeout, self.backend.item_roster(character_id)),
        )?;
        self.roster.gifts.merge_baseline(gifts);
        self.roster.items.merge_baseline(items);
        Ok(())
    }
}
