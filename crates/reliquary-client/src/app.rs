use std::sync::Arc;

use tracing::{debug, info};

use crate::admin::AdminPanel;
use crate::backend::{Backend, BackendError};
use crate::config::ClientConfig;
use crate::entry::EntryFlow;
use crate::guard::Entered;
use crate::http::HttpBackend;
use crate::pin::PinHasher;
use crate::route::Route;
use crate::session::{SessionContext, SessionStore, SessionStoreError};
use crate::view::{CharacterView, ViewError};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    View(#[from] ViewError),

    #[error(transparent)]
    Session(#[from] SessionStoreError),
}

/// What is on screen after navigating.
pub enum Screen<B> {
    Entry(EntryFlow<B>),
    Character(CharacterView),
    Admin(AdminPanel<B>),
}

impl<B> Screen<B> {
    pub fn route(&self) -> Route {
        match self {
            Self::Entry(_) => Route::Entry,
            Self::Character(view) => Route::Character(view.character().id),
            Self::Admin(_) => Route::Admin,
        }
    }
}

/// The client application: one backend, one session, one screen at a time.
pub struct Client<B> {
    backend: Arc<B>,
    session: SessionContext,
    hasher: PinHasher,
    config: ClientConfig,
}

impl Client<HttpBackend> {
    pub fn from_config(config: ClientConfig) -> Result<Self, ClientError> {
        let backend = HttpBackend::new(&config.api_url)?;
        let session = SessionContext::load(SessionStore::new(config.session_path.clone()))?;
        info!("Client ready against {}", config.api_url);
        Ok(Self::new(Arc::new(backend), session, PinHasher::default(), config))
    }
}

impl<B: Backend> Client<B> {
    pub fn new(backend: Arc<B>, session: SessionContext, hasher: PinHasher, config: ClientConfig) -> Self {
        Self {
            backend,
            session,
            hasher,
            config,
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Where to go on start: the session's home, or the entry screen.
    pub fn start_route(&self) -> Route {
        self.session.current().map_or(Route::Entry, |s| Route::home(&s))
    }

    /// Open `route`, following guard redirects until a screen is built.
    pub async fn navigate(&self, route: Route) -> Result<Screen<B>, ClientError> {
        let mut route = route;
        loop {
            debug!("Navigating to {}", route);
            let entered = match route {
                Route::Entry => return Ok(Screen::Entry(self.entry())),
                Route::Character(id) => {
                    let timeout = self.config.fetch_timeout;
                    match CharacterView::enter(self.backend.clone(), &self.session, id, timeout).await? {
                        Entered::View(view) => return Ok(Screen::Character(view)),
                        Entered::Redirect(to) => to,
                    }
                }
                Route::Admin => {
                    let timeout = self.config.fetch_timeout;
                    match AdminPanel::enter(self.backend.clone(), &self.session, timeout).await? {
                        Entered::View(panel) => return Ok(Screen::Admin(panel)),
                        Entered::Redirect(to) => to,
                    }
                }
            };
            route = entered;
        }
    }

    pub fn entry(&self) -> EntryFlow<B> {
        EntryFlow::new(
            self.backend.clone(),
            self.session.clone(),
            self.hasher.clone(),
            self.config.fetch_timeout,
        )
    }

    /// Forget the session; the next navigation lands on the entry screen.
    pub fn logout(&self) -> Result<(), ClientError> {
        self.session.clear()?;
        info!("Logged out");
        Ok(())
    }
}
