//! Event loop that drives one tab's controller.
//!
//! A [`Navigator`] subscribes once to its location and to shared storage,
//! feeds each event to the [`NavigationController`] in dispatch order, and
//! publishes every resulting [`NavigationState`] on a `watch` channel for the
//! presentation layer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, watch, Notify};
use tracing::{debug, info, trace, warn};

use crate::controller::{NavigationController, NavigationState};
use crate::location::FragmentChange;
use crate::storage::{Storage, StorageEvent, TabId};

/// Outcome of handling one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A fragment change was applied.
    Navigated(NavigationState),
    /// A storage change from another tab was checked; `Some` if the page changed.
    SessionChecked(Option<NavigationState>),
    /// A storage change written by this tab, skipped.
    Ignored,
    /// Stop was requested.
    Stopped,
    /// Both event sources are closed.
    Closed,
}

/// Handle for stopping a running [`Navigator`] from elsewhere.
#[derive(Debug, Clone)]
pub struct NavigatorHandle {
    stop_signal: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl NavigatorHandle {
    /// Ask the navigator to stop after the current event.
    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Whether stop has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop_signal.load(Ordering::SeqCst)
    }
}

/// Runs one tab's controller against its event sources.
#[derive(Debug)]
pub struct Navigator {
    controller: NavigationController,
    tab: TabId,
    fragments: broadcast::Receiver<FragmentChange>,
    storage: broadcast::Receiver<StorageEvent>,
    fragments_open: bool,
    storage_open: bool,
    output: watch::Sender<NavigationState>,
    handle: NavigatorHandle,
}

impl Navigator {
    /// Subscribe to both event sources, start the controller and publish the initial state.
    ///
    /// `tab` identifies this tab's own storage writes so they are not treated
    /// as cross-tab changes.
    #[must_use]
    pub fn start(
        mut controller: NavigationController,
        storage: &Storage,
        tab: TabId,
    ) -> (Self, watch::Receiver<NavigationState>) {
        let fragments = controller.location().subscribe();
        let storage = storage.subscribe();
        let initial = controller.start();
        let (output, receiver) = watch::channel(initial);

        debug!(%tab, page = %initial.current_page, "navigator started");
        let navigator = Self {
            controller,
            tab,
            fragments,
            storage,
            fragments_open: true,
            storage_open: true,
            output,
            handle: NavigatorHandle {
                stop_signal: Arc::new(AtomicBool::new(false)),
                wake: Arc::new(Notify::new()),
            },
        };
        (navigator, receiver)
    }

    /// A handle that can stop [`run`](Self::run).
    #[must_use]
    pub fn handle(&self) -> NavigatorHandle {
        self.handle.clone()
    }

    /// Another receiver of the published state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<NavigationState> {
        self.output.subscribe()
    }

    /// The latest published state.
    #[must_use]
    pub fn state(&self) -> NavigationState {
        *self.output.borrow()
    }

    /// The tab this navigator runs.
    #[must_use]
    pub fn tab(&self) -> TabId {
        self.tab
    }

    /// The controller being driven.
    #[must_use]
    pub fn controller(&self) -> &NavigationController {
        &self.controller
    }

    /// Wait for the next event from either source and apply it.
    pub async fn process_next(&mut self) -> Step {
        loop {
            if self.handle.is_stopped() {
                return Step::Stopped;
            }
            if !self.fragments_open && !self.storage_open {
                return Step::Closed;
            }

            tokio::select! {
                () = self.handle.wake.notified() => {}
                result = self.fragments.recv(), if self.fragments_open => match result {
                    Ok(_) => return self.apply_fragment_change(),
                    Err(RecvError::Lagged(missed)) => {
                        warn!(tab = %self.tab, missed, "fragment events lagged, resyncing");
                        return self.apply_fragment_change();
                    }
                    Err(RecvError::Closed) => self.fragments_open = false,
                },
                result = self.storage.recv(), if self.storage_open => match result {
                    Ok(event) => return self.apply_storage_event(&event),
                    Err(RecvError::Lagged(missed)) => {
                        warn!(tab = %self.tab, missed, "storage events lagged, resyncing");
                        return self.apply_session_check();
                    }
                    Err(RecvError::Closed) => self.storage_open = false,
                },
            }
        }
    }

    /// Apply one event that has already been dispatched, without waiting.
    ///
    /// Fragment changes are drained before storage changes. Returns `None`
    /// when nothing is pending.
    pub fn try_process_next(&mut self) -> Option<Step> {
        if self.fragments_open {
            match self.fragments.try_recv() {
                Ok(_) => return Some(self.apply_fragment_change()),
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(tab = %self.tab, missed, "fragment events lagged, resyncing");
                    return Some(self.apply_fragment_change());
                }
                Err(TryRecvError::Closed) => self.fragments_open = false,
                Err(TryRecvError::Empty) => {}
            }
        }

        if self.storage_open {
            match self.storage.try_recv() {
                Ok(event) => return Some(self.apply_storage_event(&event)),
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(tab = %self.tab, missed, "storage events lagged, resyncing");
                    return Some(self.apply_session_check());
                }
                Err(TryRecvError::Closed) => self.storage_open = false,
                Err(TryRecvError::Empty) => {}
            }
        }

        None
    }

    /// Apply every pending event. Returns how many were applied.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while self.try_process_next().is_some() {
            applied += 1;
        }
        applied
    }

    /// Process events until both sources close or stop is requested.
    ///
    /// Returns the last published state.
    pub async fn run(mut self) -> NavigationState {
        info!(tab = %self.tab, "navigator running");
        loop {
            match self.process_next().await {
                Step::Navigated(state) | Step::SessionChecked(Some(state)) => {
                    debug!(tab = %self.tab, view = %state.view_key(), "transition");
                }
                Step::SessionChecked(None) | Step::Ignored => {}
                Step::Stopped | Step::Closed => break,
            }
        }
        info!(tab = %self.tab, "navigator stopped");
        self.state()
    }

    fn apply_fragment_change(&mut self) -> Step {
        let state = self.controller.on_fragment_changed();
        self.output.send_replace(state);
        Step::Navigated(state)
    }

    fn apply_storage_event(&mut self, event: &StorageEvent) -> Step {
        if event.source == self.tab {
            trace!(tab = %self.tab, key = %event.key, "own storage write");
            return Step::Ignored;
        }
        let transition = self.controller.on_cross_tab_session_invalidated(&event.key);
        if let Some(state) = transition {
            self.output.send_replace(state);
        }
        Step::SessionChecked(transition)
    }

    fn apply_session_check(&mut self) -> Step {
        let key = self.controller.auth_token_key().to_string();
        let transition = self.controller.on_cross_tab_session_invalidated(&key);
        if let Some(state) = transition {
            self.output.send_replace(state);
        }
        Step::SessionChecked(transition)
    }
}
