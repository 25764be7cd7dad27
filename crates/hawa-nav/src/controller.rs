//! The navigation controller.
//!
//! Owns the one piece of mutable routing state, [`NavigationState`], and the
//! rules that move it: resolve the fragment, check it against the session,
//! redirect if needed, and stamp a fresh [`Epoch`] so the page view rebuilds.
//!
//! The controller is synchronous and event-source agnostic. Something else
//! (the [`Navigator`](crate::navigator::Navigator), a test, the CLI) decides
//! when to call [`NavigationController::on_fragment_changed`] and
//! [`NavigationController::on_cross_tab_session_invalidated`].

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::location::Location;
use crate::route::{AccessPolicy, Route};
use crate::session::{SessionOracle, SessionSnapshot, AUTH_TOKEN_KEY};

/// Remount key: milliseconds since the Unix epoch, strictly increasing per controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epoch(i64);

impl Epoch {
    /// Wrap a raw millisecond value.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// The raw millisecond value.
    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Wall-clock time this epoch was issued at.
    #[must_use]
    pub fn issued_at(self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.0).single()
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issues epochs from the wall clock, bumping by one when the clock has not advanced.
#[derive(Debug, Default)]
pub struct EpochClock {
    last: Option<i64>,
}

impl EpochClock {
    /// Create a clock that has issued nothing yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next epoch.
    pub fn tick(&mut self) -> Epoch {
        let now = Utc::now().timestamp_millis();
        let next = match self.last {
            Some(last) if now <= last => last.saturating_add(1),
            _ => now,
        };
        self.last = Some(next);
        Epoch(next)
    }
}

/// What the presentation layer renders: one page, and the key it is mounted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationState {
    /// The page being shown. Always satisfies the access policy at the time of the decision.
    pub current_page: Route,
    /// Regenerated on every accepted navigation.
    pub epoch: Epoch,
}

impl NavigationState {
    /// Key that changes whenever the page view must be rebuilt, e.g. `admin-users-1718000000000`.
    #[must_use]
    pub fn view_key(&self) -> String {
        format!("{}-{}", self.current_page.slug(), self.epoch)
    }
}

/// Resolves fragments, enforces the access policy and tracks the current page.
pub struct NavigationController {
    policy: AccessPolicy,
    location: Arc<dyn Location>,
    session: Arc<dyn SessionOracle>,
    auth_token_key: String,
    clock: EpochClock,
    state: Option<NavigationState>,
}

impl fmt::Debug for NavigationController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationController")
            .field("policy", &self.policy)
            .field("auth_token_key", &self.auth_token_key)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl NavigationController {
    /// Create a controller. Nothing is read until [`start`](Self::start).
    #[must_use]
    pub fn new(
        policy: AccessPolicy,
        location: Arc<dyn Location>,
        session: Arc<dyn SessionOracle>,
    ) -> Self {
        Self {
            policy,
            location,
            session,
            auth_token_key: AUTH_TOKEN_KEY.to_string(),
            clock: EpochClock::new(),
            state: None,
        }
    }

    /// Watch a different storage key for cross-tab invalidation.
    #[must_use]
    pub fn with_auth_token_key(mut self, key: impl Into<String>) -> Self {
        self.auth_token_key = key.into();
        self
    }

    /// The access policy in force.
    #[must_use]
    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// The location this controller reads and rewrites.
    #[must_use]
    pub fn location(&self) -> &Arc<dyn Location> {
        &self.location
    }

    /// The session this controller consults.
    #[must_use]
    pub fn session(&self) -> &Arc<dyn SessionOracle> {
        &self.session
    }

    /// The storage key whose changes invalidate the session.
    #[must_use]
    pub fn auth_token_key(&self) -> &str {
        &self.auth_token_key
    }

    /// Current state, or `None` before [`start`](Self::start).
    #[must_use]
    pub fn state(&self) -> Option<NavigationState> {
        self.state
    }

    /// Current page, [`Route::Landing`] before [`start`](Self::start).
    #[must_use]
    pub fn current_page(&self) -> Route {
        self.state.map_or(Route::Landing, |s| s.current_page)
    }

    /// Map fragment text (without `#`) to an enabled route, or landing.
    #[must_use]
    pub fn resolve_route(&self, fragment: &str) -> Route {
        self.policy.resolve(fragment)
    }

    /// Apply the access policy to `route`.
    ///
    /// On a redirect the fragment is rewritten to the returned route.
    pub fn decide_page(&self, route: Route, session: SessionSnapshot) -> Route {
        let verdict = self.policy.evaluate(route, session);
        let page = verdict.target(route);
        if verdict.is_redirect() {
            info!(requested = %route, redirect = %page, "access denied, redirecting");
            self.location.replace_fragment(page);
        }
        page
    }

    /// Initial resolve and decide against the current fragment.
    ///
    /// Calling it again returns the existing state untouched.
    pub fn start(&mut self) -> NavigationState {
        if let Some(state) = self.state {
            debug!(page = %state.current_page, "controller already started");
            return state;
        }

        let state = self.navigate_to_current_fragment();
        info!(page = %state.current_page, epoch = %state.epoch, "navigation started");
        state
    }

    /// Handle a fragment change. Always issues a new epoch.
    pub fn on_fragment_changed(&mut self) -> NavigationState {
        let previous = self.state.map(|s| s.current_page);
        let state = self.navigate_to_current_fragment();
        debug!(
            from = ?previous,
            to = %state.current_page,
            epoch = %state.epoch,
            "fragment changed"
        );
        state
    }

    /// Handle a change to shared session storage made elsewhere.
    ///
    /// Returns the new state if the current page had to change.
    pub fn on_cross_tab_session_invalidated(&mut self, key: &str) -> Option<NavigationState> {
        if key != self.auth_token_key {
            trace!(key, "ignoring storage change");
            return None;
        }

        let current = self.state?.current_page;
        if !current.is_protected() {
            trace!(page = %current, "session changed on a public page");
            return None;
        }

        let page = self.decide_page(current, self.session.snapshot());
        if page == current {
            return None;
        }

        let state = self.commit(page);
        info!(from = %current, to = %page, "session invalidated in another tab");
        Some(state)
    }

    fn navigate_to_current_fragment(&mut self) -> NavigationState {
        let route = self.resolve_route(&self.location.fragment());
        let page = self.decide_page(route, self.session.snapshot());
        self.commit(page)
    }

    fn commit(&mut self, page: Route) -> NavigationState {
        let state = NavigationState {
            current_page: page,
            epoch: self.clock.tick(),
        };
        self.state = Some(state);
        state
    }
}
