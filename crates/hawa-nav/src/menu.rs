//! Sidebar menus.
//!
//! Which links a session sees. Entries are always a subset of what the
//! access policy would let that session open, so following a menu link never
//! bounces.

use serde::Serialize;

use crate::route::{AccessPolicy, Route};
use crate::session::{SessionSnapshot, UserProfile, INDUSTRY_ROLE};

const PUBLIC_MENU: &[Route] = &[Route::Landing, Route::Login, Route::Register];

const USER_MENU: &[Route] = &[Route::Dashboard, Route::Map, Route::Community, Route::Profile];

const ADMIN_MENU: &[Route] = &[
    Route::Admin,
    Route::AdminUsers,
    Route::AdminIotData,
    Route::AdminFeedback,
];

/// One sidebar link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    /// Target route.
    pub route: Route,
    /// Display text.
    pub label: &'static str,
    /// Link target, e.g. `#admin/users`.
    pub href: String,
    /// Whether this is the page being shown.
    pub active: bool,
}

/// Which sidebar a session gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuKind {
    /// Not logged in.
    Public,
    /// Regular user sidebar.
    User,
    /// Administrator sidebar.
    Admin,
}

impl MenuKind {
    /// Pick the sidebar for a session.
    #[must_use]
    pub fn for_session(session: SessionSnapshot) -> Self {
        match (session.authenticated, session.is_admin) {
            (false, _) => Self::Public,
            (true, false) => Self::User,
            (true, true) => Self::Admin,
        }
    }
}

/// Build the menu for `session`, marking `current` active.
///
/// Industry users additionally get the compliance page.
#[must_use]
pub fn menu_for(
    policy: &AccessPolicy,
    session: SessionSnapshot,
    user: Option<&UserProfile>,
    current: Route,
) -> Vec<MenuItem> {
    let kind = MenuKind::for_session(session);
    let mut routes: Vec<Route> = match kind {
        MenuKind::Public => PUBLIC_MENU.to_vec(),
        MenuKind::Admin => ADMIN_MENU.to_vec(),
        MenuKind::User => USER_MENU.to_vec(),
    };
    if kind == MenuKind::User && user.is_some_and(|u| u.has_role(INDUSTRY_ROLE)) {
        routes.push(Route::Compliance);
    }

    routes
        .into_iter()
        .filter(|route| policy.route_set().contains(*route))
        .filter(|route| !policy.evaluate(*route, session).is_redirect())
        .map(|route| MenuItem {
            route,
            label: route.label(),
            href: route.fragment(),
            active: route == current,
        })
        .collect()
}
