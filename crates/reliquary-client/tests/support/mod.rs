#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;

use reliquary_client::{
    Backend, BackendError, ClientConfig, LinkEvent, PinHasher, SessionContext, Subscription,
};
use reliquary_types::api::{NewGift, NewItem};
use reliquary_types::models::{Character, Gift, GiftEntry, Item, ItemEntry};

pub const TIMEOUT: Duration = Duration::from_secs(2);

pub fn hasher() -> PinHasher {
    PinHasher::new(argon2::Params::new(256, 1, 1, None).unwrap())
}

pub fn config() -> ClientConfig {
    ClientConfig {
        fetch_timeout: TIMEOUT,
        ..ClientConfig::default()
    }
}

pub fn ephemeral(session: Option<reliquary_client::Session>) -> SessionContext {
    SessionContext::ephemeral(session)
}

#[derive(Default)]
struct Records {
    characters: Vec<Character>,
    gifts: HashMap<Uuid, Gift>,
    items: HashMap<Uuid, Item>,
    /// (link id, character id, gift id)
    gift_links: Vec<(Uuid, Uuid, Uuid)>,
    item_links: Vec<(Uuid, Uuid, Uuid)>,
    subscribers: Vec<(Uuid, mpsc::UnboundedSender<LinkEvent>)>,
    /// Delivered to every new subscriber right after it subscribes.
    queued: Vec<LinkEvent>,
}

/// Record service kept in memory, with switches to make calls fail.
#[derive(Default)]
pub struct MockBackend {
    records: Mutex<Records>,
    pub subscribed: AtomicUsize,
    pub released: Arc<AtomicUsize>,
    pub pin_writes: AtomicUsize,
    pub fail_rosters: AtomicBool,
    pub fail_writes: AtomicBool,
    /// Number of upcoming gift/item detail fetches that fail.
    pub fail_details: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_character(&self, name: &str, pin_hash: Option<String>) -> Character {
        let character = Character {
            id: Uuid::new_v4(),
            name: name.to_string(),
            image_url: None,
            has_pin: pin_hash.is_some(),
            pin_hash,
        };
        self.records.lock().unwrap().characters.push(character.clone());
        character
    }

    pub fn stored(&self, id: Uuid) -> Character {
        let records = self.records.lock().unwrap();
        records.characters.iter().find(|c| c.id == id).cloned().unwrap()
    }

    pub fn link_gift(&self, character_id: Uuid, name: &str) -> LinkEvent {
        let gift = Gift {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: format!("{name} description"),
            uses_per_short_rest: 0,
            uses_per_long_rest: 1,
        };
        let link = Uuid::new_v4();
        let mut records = self.records.lock().unwrap();
        records.gift_links.push((link, character_id, gift.id));
        let event = LinkEvent::Gift {
            id: link,
            character_id,
            gift_id: gift.id,
        };
        records.gifts.insert(gift.id, gift);
        event
    }

    pub fn link_item(&self, character_id: Uuid, name: &str) -> LinkEvent {
        let item = Item {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
            image_url: format!("https://img.example.org/{name}.png"),
        };
        let link = Uuid::new_v4();
        let mut records = self.records.lock().unwrap();
        records.item_links.push((link, character_id, item.id));
        let event = LinkEvent::Item {
            id: link,
            character_id,
            item_id: item.id,
        };
        records.items.insert(item.id, item);
        event
    }

    /// Push an event to subscribers of its character.
    pub fn publish(&self, event: LinkEvent) {
        let records = self.records.lock().unwrap();
        for (character_id, tx) in &records.subscribers {
            if *character_id == event.character_id() {
                let _ = tx.send(event);
            }
        }
    }

    /// Hand `event` to the next subscriber as soon as it subscribes,
    /// ahead of its baseline fetch.
    pub fn queue_for_next_subscriber(&self, event: LinkEvent) {
        self.records.lock().unwrap().queued.push(event);
    }

    /// End every open event feed, as a dropped gateway connection would.
    pub fn close_feeds(&self) {
        self.records.lock().unwrap().subscribers.clear();
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    fn check_writes(&self) -> Result<(), BackendError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(BackendError::Unavailable("writes disabled".into()))
        } else {
            Ok(())
        }
    }

    fn check_details(&self) -> Result<(), BackendError> {
        let failing = self
            .fail_details
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            Err(BackendError::Status(503))
        } else {
            Ok(())
        }
    }

    fn check_rosters(&self) -> Result<(), BackendError> {
        if self.fail_rosters.load(Ordering::SeqCst) {
            Err(BackendError::Status(503))
        } else {
            Ok(())
        }
    }
}

impl Backend for MockBackend {
    async fn characters(&self) -> Result<Vec<Character>, BackendError> {
        Ok(self.records.lock().unwrap().characters.clone())
    }

    async fn character(&self, id: Uuid) -> Result<Option<Character>, BackendError> {
        let records = self.records.lock().unwrap();
        Ok(records.characters.iter().find(|c| c.id == id).cloned())
    }

    async fn character_by_name(&self, name: &str) -> Result<Option<Character>, BackendError> {
        let records = self.records.lock().unwrap();
        Ok(records.characters.iter().find(|c| c.name == name).cloned())
    }

    async fn set_pin_hash(&self, character_id: Uuid, pin_hash: &str) -> Result<(), BackendError> {
        self.check_writes()?;
        let mut records = self.records.lock().unwrap();
        let character = records
            .characters
            .iter_mut()
            .find(|c| c.id == character_id)
            .ok_or(BackendError::NotFound)?;
        character.pin_hash = Some(pin_hash.to_string());
        character.has_pin = true;
        self.pin_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn gift_roster(&self, character_id: Uuid) -> Result<Vec<GiftEntry>, BackendError> {
        self.check_rosters()?;
        let records = self.records.lock().unwrap();
        Ok(records
            .gift_links
            .iter()
            .filter(|(_, owner, _)| *owner == character_id)
            .map(|(link, _, gift_id)| GiftEntry {
                id: *link,
                gift: records.gifts[gift_id].clone(),
            })
            .collect())
    }

    async fn item_roster(&self, character_id: Uuid) -> Result<Vec<ItemEntry>, BackendError> {
        self.check_rosters()?;
        let records = self.records.lock().unwrap();
        Ok(records
            .item_links
            .iter()
            .filter(|(_, owner, _)| *owner == character_id)
            .map(|(link, _, item_id)| ItemEntry {
                id: *link,
                item: records.items[item_id].clone(),
            })
            .collect())
    }

    async fn gift(&self, id: Uuid) -> Result<Option<Gift>, BackendError> {
        self.check_details()?;
        Ok(self.records.lock().unwrap().gifts.get(&id).cloned())
    }

    async fn item(&self, id: Uuid) -> Result<Option<Item>, BackendError> {
        self.check_details()?;
        Ok(self.records.lock().unwrap().items.get(&id).cloned())
    }

    async fn create_gift_and_link(&self, character_id: Uuid, gift: &NewGift) -> Result<GiftEntry, BackendError> {
        self.check_writes()?;
        let created = Gift {
            id: Uuid::new_v4(),
            name: gift.name.clone(),
            description: gift.description.clone(),
            uses_per_short_rest: gift.uses_per_short_rest,
            uses_per_long_rest: gift.uses_per_long_rest,
        };
        let link = Uuid::new_v4();
        {
            let mut records = self.records.lock().unwrap();
            if !records.characters.iter().any(|c| c.id == character_id) {
                return Err(BackendError::NotFound);
            }
            records.gifts.insert(created.id, created.clone());
            records.gift_links.push((link, character_id, created.id));
        }
        self.publish(LinkEvent::Gift {
            id: link,
            character_id,
            gift_id: created.id,
        });
        Ok(GiftEntry {
            id: link,
            gift: created,
        })
    }

    async fn create_item_and_link(&self, character_id: Uuid, item: &NewItem) -> Result<ItemEntry, BackendError> {
        self.check_writes()?;
        let created = Item {
            id: Uuid::new_v4(),
            name: item.name.clone(),
            description: item.description.clone(),
            image_url: item.image_url.clone(),
        };
        let link = Uuid::new_v4();
        {
            let mut records = self.records.lock().unwrap();
            if !records.characters.iter().any(|c| c.id == character_id) {
                return Err(BackendError::NotFound);
            }
            records.items.insert(created.id, created.clone());
            records.item_links.push((link, character_id, created.id));
        }
        self.publish(LinkEvent::Item {
            id: link,
            character_id,
            item_id: created.id,
        });
        Ok(ItemEntry {
            id: link,
            item: created,
        })
    }

    async fn subscribe_links(&self, character_id: Uuid) -> Result<Subscription, BackendError> {
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut records = self.records.lock().unwrap();
            for event in records.queued.drain(..) {
                let _ = tx.send(event);
            }
            records.subscribers.push((character_id, tx));
        }
        self.subscribed.fetch_add(1, Ordering::SeqCst);

        let released = self.released.clone();
        Ok(Subscription::new(rx, move || {
            released.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
