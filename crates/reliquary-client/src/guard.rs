//! Route authorization.
//!
//! Runs once per route entry, before anything is fetched. A protected
//! view that has not been granted access never gets constructed, so there
//! is nothing to render until the guard says yes.

use reliquary_types::session::Session;

use crate::route::Route;

/// Outcome of checking a session against a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    /// Not allowed; send the user here instead. Nothing else is surfaced.
    Redirect(Route),
}

/// Result of entering a guarded view.
#[derive(Debug)]
pub enum Entered<V> {
    View(V),
    Redirect(Route),
}

impl<V> Entered<V> {
    pub fn into_view(self) -> Option<V> {
        match self {
            Self::View(view) => Some(view),
            Self::Redirect(_) => None,
        }
    }

    pub fn redirect(&self) -> Option<Route> {
        match self {
            Self::View(_) => None,
            Self::Redirect(route) => Some(*route),
        }
    }
}

pub fn authorize(session: Option<&Session>, route: &Route) -> Access {
    let granted = match route {
        Route::Entry => true,
        Route::Admin => matches!(session, Some(Session::Admin)),
        Route::Character(id) => {
            matches!(session, Some(Session::Player { character_id }) if character_id == id)
        }
    };

    if granted {
        Access::Granted
    } else {
        Access::Redirect(Route::Entry)
    }
}
