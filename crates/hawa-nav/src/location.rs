//! The address fragment a tab is showing.
//!
//! [`Location`] is the seam between the controller and whatever hosts it.
//! User navigation goes through [`HashLocation::navigate`], which notifies
//! subscribers; controller redirects go through [`Location::replace_fragment`],
//! which rewrites the fragment silently so a redirect never triggers itself.

use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::route::Route;

/// Default capacity of the fragment change channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// Notification that the user changed the fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentChange {
    /// The new fragment text, without the leading `#`.
    pub fragment: String,
}

/// Read, rewrite and watch the address fragment.
pub trait Location: Send + Sync {
    /// Current fragment text without the leading `#`. Empty when absent.
    fn fragment(&self) -> String;

    /// Rewrite the fragment to `route` without notifying subscribers.
    fn replace_fragment(&self, route: Route);

    /// Watch user-initiated fragment changes.
    fn subscribe(&self) -> broadcast::Receiver<FragmentChange>;
}

/// In-process fragment holder standing in for a browser address bar.
#[derive(Debug)]
pub struct HashLocation {
    fragment: Mutex<String>,
    changes: broadcast::Sender<FragmentChange>,
}

impl HashLocation {
    /// Create a location showing `initial` (with or without `#`).
    #[must_use]
    pub fn new(initial: &str) -> Self {
        Self::with_capacity(initial, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a location with a specific change channel capacity.
    #[must_use]
    pub fn with_capacity(initial: &str, capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self {
            fragment: Mutex::new(strip_hash(initial).to_string()),
            changes,
        }
    }

    /// User navigation: set the fragment and notify subscribers.
    ///
    /// Navigating to the fragment already shown still notifies.
    pub fn navigate(&self, fragment: &str) {
        let fragment = strip_hash(fragment).to_string();
        debug!(fragment = %fragment, "navigate");
        self.store(fragment.clone());
        let _ = self.changes.send(FragmentChange { fragment });
    }

    /// The fragment with its `#`, as it would appear in an address bar.
    #[must_use]
    pub fn href(&self) -> String {
        format!("#{}", self.fragment())
    }

    fn store(&self, fragment: String) {
        *self.fragment.lock().unwrap_or_else(PoisonError::into_inner) = fragment;
    }
}

impl Default for HashLocation {
    fn default() -> Self {
        Self::new("")
    }
}

impl Location for HashLocation {
    fn fragment(&self) -> String {
        self.fragment
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_fragment(&self, route: Route) {
        trace!(route = %route, "replace fragment");
        self.store(route.as_str().to_string());
    }

    fn subscribe(&self) -> broadcast::Receiver<FragmentChange> {
        self.changes.subscribe()
    }
}

/// Drop a single leading `#`.
#[must_use]
pub fn strip_hash(text: &str) -> &str {
    text.strip_prefix('#').unwrap_or(text)
}
