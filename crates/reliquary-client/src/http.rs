use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use reliquary_types::api::{NewGift, NewItem, SetPinRequest};
use reliquary_types::events::{GatewayCommand, GatewayEvent};
use reliquary_types::models::{Character, Gift, GiftEntry, Item, ItemEntry};

use crate::backend::{Backend, BackendError, LinkEvent, Subscription};

/// How long the gateway may take to confirm a subscription.
const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// [`Backend`] over the record service's REST surface and `/gateway` WebSocket.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let base = Url::parse(base_url)
            .map_err(|e| BackendError::Unavailable(format!("invalid base url '{}': {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(BackendError::Unavailable(format!("'{}' cannot be a base url", base_url)));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base,
        })
    }

    /// Build `base/segment/segment...`, percent-encoding each segment
    /// (character names like `???` must not turn into a query string).
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn gateway_url(&self) -> Result<Url, BackendError> {
        let mut url = self.url(&["gateway"]);
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| BackendError::Unavailable(format!("cannot derive gateway url from {}", self.base)))?;
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, BackendError> {
        let response = self.client.get(self.url(segments)).send().await?;
        Ok(check(response)?.json().await?)
    }

    async fn get_optional<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Option<T>, BackendError> {
        match self.get_json(segments).await {
            Ok(value) => Ok(Some(value)),
            Err(BackendError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn check(response: Response) -> Result<Response, BackendError> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::NOT_FOUND => Err(BackendError::NotFound),
        status => Err(BackendError::Status(status.as_u16())),
    }
}

impl Backend for HttpBackend {
    async fn characters(&self) -> Result<Vec<Character>, BackendError> {
        self.get_json(&["characters"]).await
    }

    async fn character(&self, id: Uuid) -> Result<Option<Character>, BackendError> {
        self.get_optional(&["characters", &id.to_string()]).await
    }

    async fn character_by_name(&self, name: &str) -> Result<Option<Character>, BackendError> {
        self.get_optional(&["characters", "by-name", name]).await
    }

    async fn set_pin_hash(&self, character_id: Uuid, pin_hash: &str) -> Result<(), BackendError> {
        let body = SetPinRequest {
            pin_hash: pin_hash.to_string(),
        };
        let response = self
            .client
            .put(self.url(&["characters", &character_id.to_string(), "pin"]))
            .json(&body)
            .send()
            .await?;
        check(response)?;
        Ok(())
    }

    async fn gift_roster(&self, character_id: Uuid) -> Result<Vec<GiftEntry>, BackendError> {
        self.get_json(&["characters", &character_id.to_string(), "gifts"]).await
    }

    async fn item_roster(&self, character_id: Uuid) -> Result<Vec<ItemEntry>, BackendError> {
        self.get_json(&["characters", &character_id.to_string(), "items"]).await
    }

    async fn gift(&self, id: Uuid) -> Result<Option<Gift>, BackendError> {
        self.get_optional(&["gifts", &id.to_string()]).await
    }

    async fn item(&self, id: Uuid) -> Result<Option<Item>, BackendError> {
        self.get_optional(&["items", &id.to_string()]).await
    }

    async fn create_gift_and_link(&self, character_id: Uuid, gift: &NewGift) -> Result<GiftEntry, BackendError> {
        let response = self
            .client
            .post(self.url(&["characters", &character_id.to_string(), "gifts"]))
            .json(gift)
            .send()
            .await?;
        Ok(check(response)?.json().await?)
    }

    async fn create_item_and_link(&self, character_id: Uuid, item: &NewItem) -> Result<ItemEntry, BackendError> {
        let response = self
            .client
            .post(self.url(&["characters", &character_id.to_string(), "items"]))
            .json(item)
            .send()
            .await?;
        Ok(check(response)?.json().await?)
    }

    async fn subscribe_links(&self, character_id: Uuid) -> Result<Subscription, BackendError> {
        let url = self.gateway_url()?;
        let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str()).await?;

        let subscribe = serde_json::to_string(&GatewayCommand::Subscribe { character_id })
            .map_err(|e| BackendError::Protocol(e.to_string()))?;
        socket.send(Message::Text(subscribe.into())).await?;

        // Only hand out the subscription once the service is actually listening.
        let ready = tokio::time::timeout(READY_TIMEOUT, async {
            while let Some(frame) = socket.next().await {
                if let Message::Text(text) = frame? {
                    if let Ok(GatewayEvent::Ready { .. }) = serde_json::from_str::<GatewayEvent>(&text) {
                        return Ok(());
                    }
                }
            }
            Err(BackendError::Protocol("gateway closed before Ready".into()))
        })
        .await
        .map_err(|_| BackendError::Timeout(READY_TIMEOUT))?;
        ready?;

        info!("Listening for roster changes of character {}", character_id);

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let stop = cancel.clone();

        tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    _ = stop.cancelled() => {
                        if let Ok(text) = serde_json::to_string(&GatewayCommand::Unsubscribe) {
                            let _ = socket.send(Message::Text(text.into())).await;
                        }
                        let _ = socket.close(None).await;
                        break;
                    }
                    frame = socket.next() => frame,
                };

                match frame {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<GatewayEvent>(&text) {
                        Ok(event) => {
                            if let Some(link) = LinkEvent::from_gateway(event) {
                                if tx.send(link).is_err() {
                                    break;
                                }
                            }
                        }
                        Err(e) => warn!("Unreadable gateway event: {}", e),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Gateway closed the roster feed");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Gateway read failed: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(Subscription::new(rx, move || cancel.cancel()))
    }
}
