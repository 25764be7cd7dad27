//! Multi-tab replay.
//!
//! Drives several tabs that share one session store through a scripted
//! sequence of actions, one JSON object per line:
//!
//! ```text
//! {"action":"open","tab":"a","fragment":"#admin/iot-data"}
//! {"action":"login","tab":"a","token":"t1","user":{"email":"a@hawa.rw","role":"user"}}
//! {"action":"navigate","tab":"a","fragment":"#admin"}
//! {"action":"open","tab":"b","fragment":"#profile"}
//! {"action":"logout","tab":"a"}
//! ```
//!
//! After every action each open tab drains its pending events, so a logout
//! in one tab is visible as a redirect in the others before the next line.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::controller::{Epoch, NavigationController};
use crate::error::{Error, Result};
use crate::location::{HashLocation, Location};
use crate::navigator::Navigator;
use crate::route::{AccessPolicy, Route};
use crate::session::{SessionKeys, SessionOracle, StoredSession, UserProfile};
use crate::storage::{Storage, TabId, DEFAULT_CHANNEL_CAPACITY};

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReplayAction {
    /// Open a new tab at a fragment.
    Open {
        /// Tab name.
        tab: String,
        /// Initial fragment.
        #[serde(default)]
        fragment: String,
    },
    /// User navigation in a tab.
    Navigate {
        /// Tab name.
        tab: String,
        /// Target fragment.
        fragment: String,
    },
    /// Log in from a tab.
    Login {
        /// Tab name.
        tab: String,
        /// Token to store.
        token: String,
        /// User record to store.
        #[serde(default)]
        user: UserProfile,
    },
    /// Log out from a tab.
    Logout {
        /// Tab name.
        tab: String,
    },
    /// Close a tab.
    Close {
        /// Tab name.
        tab: String,
    },
}

impl ReplayAction {
    /// Parse one script line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReplayStep`] if the line is not a valid action.
    pub fn parse(line: usize, text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::replay_step(line, e.to_string()))
    }

    /// The tab this action targets.
    #[must_use]
    pub fn tab(&self) -> &str {
        match self {
            Self::Open { tab, .. }
            | Self::Navigate { tab, .. }
            | Self::Login { tab, .. }
            | Self::Logout { tab }
            | Self::Close { tab } => tab,
        }
    }
}

impl fmt::Display for ReplayAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { tab, fragment } => write!(f, "open {tab} #{}", strip(fragment)),
            Self::Navigate { tab, fragment } => write!(f, "navigate {tab} #{}", strip(fragment)),
            Self::Login { tab, user, .. } => write!(f, "login {tab} {}", user.email),
            Self::Logout { tab } => write!(f, "logout {tab}"),
            Self::Close { tab } => write!(f, "close {tab}"),
        }
    }
}

fn strip(fragment: &str) -> &str {
    crate::location::strip_hash(fragment)
}

/// State of one tab after a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabView {
    /// Tab name.
    pub tab: String,
    /// Page shown.
    pub page: Route,
    /// Current epoch.
    pub epoch: Epoch,
    /// Fragment in the address bar.
    pub fragment: String,
    /// Remount key.
    pub view_key: String,
}

/// Outcome of one script line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayRecord {
    /// 1-based script line.
    pub line: usize,
    /// What was done.
    pub action: String,
    /// Every open tab afterwards, sorted by name.
    pub tabs: Vec<TabView>,
}

struct ReplayTab {
    location: Arc<HashLocation>,
    session: Arc<StoredSession>,
    navigator: Navigator,
}

/// A set of named tabs sharing one store.
pub struct Replay {
    storage: Arc<Storage>,
    policy: AccessPolicy,
    keys: SessionKeys,
    channel_capacity: usize,
    tabs: BTreeMap<String, ReplayTab>,
}

impl fmt::Debug for Replay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replay")
            .field("policy", &self.policy)
            .field("tabs", &self.tabs.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Replay {
    /// Create a replay over `storage`.
    #[must_use]
    pub fn new(storage: Arc<Storage>, policy: AccessPolicy, keys: SessionKeys) -> Self {
        Self {
            storage,
            policy,
            keys,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            tabs: BTreeMap::new(),
        }
    }

    /// Create a replay over a fresh in-memory store using `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory store cannot be created.
    pub fn from_config(config: &Config) -> Result<Self> {
        let storage =
            Storage::open_in_memory()?.with_channel_capacity(config.events.channel_capacity);
        let mut replay = Self::new(Arc::new(storage), config.policy(), config.session_keys());
        replay.channel_capacity = config.events.channel_capacity;
        Ok(replay)
    }

    /// The shared store.
    #[must_use]
    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    /// Run a whole script. Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Stops at the first line that fails to parse or apply.
    pub fn run_script(&mut self, script: &str) -> Result<Vec<ReplayRecord>> {
        let mut records = Vec::new();
        for (index, text) in script.lines().enumerate() {
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            let line = index + 1;
            let action = ReplayAction::parse(line, text)?;
            records.push(self.apply(line, &action)?);
        }
        Ok(records)
    }

    /// Apply one action, then let every tab react.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown or duplicate tabs and for storage failures.
    pub fn apply(&mut self, line: usize, action: &ReplayAction) -> Result<ReplayRecord> {
        debug!(line, action = %action, "replay step");
        match action {
            ReplayAction::Open { tab, fragment } => self.open(line, tab, fragment)?,
            ReplayAction::Navigate { tab, fragment } => self.tab(tab)?.location.navigate(fragment),
            ReplayAction::Login { tab, token, user } => self.tab(tab)?.session.login(token, user)?,
            ReplayAction::Logout { tab } => self.tab(tab)?.session.logout()?,
            ReplayAction::Close { tab } => {
                self.tabs
                    .remove(tab)
                    .ok_or_else(|| Error::UnknownTab(tab.clone()))?;
            }
        }

        self.settle();
        Ok(ReplayRecord {
            line,
            action: action.to_string(),
            tabs: self.views(),
        })
    }

    /// Current state of every open tab, sorted by name.
    #[must_use]
    pub fn views(&self) -> Vec<TabView> {
        self.tabs
            .iter()
            .map(|(name, tab)| {
                let state = tab.navigator.state();
                TabView {
                    tab: name.clone(),
                    page: state.current_page,
                    epoch: state.epoch,
                    fragment: tab.location.fragment(),
                    view_key: state.view_key(),
                }
            })
            .collect()
    }

    fn open(&mut self, line: usize, name: &str, fragment: &str) -> Result<()> {
        if self.tabs.contains_key(name) {
            return Err(Error::replay_step(line, format!("tab '{name}' is already open")));
        }

        let tab = TabId::new();
        let location = Arc::new(HashLocation::with_capacity(fragment, self.channel_capacity));
        let session = Arc::new(StoredSession::new(
            Arc::clone(&self.storage),
            tab,
            self.keys.clone(),
        ));
        let controller = NavigationController::new(
            self.policy,
            Arc::clone(&location) as Arc<dyn Location>,
            Arc::clone(&session) as Arc<dyn SessionOracle>,
        )
        .with_auth_token_key(self.keys.auth_token.clone());

        let (navigator, _) = Navigator::start(controller, &self.storage, tab);
        self.tabs.insert(
            name.to_string(),
            ReplayTab {
                location,
                session,
                navigator,
            },
        );
        Ok(())
    }

    fn tab(&self, name: &str) -> Result<&ReplayTab> {
        self.tabs
            .get(name)
            .ok_or_else(|| Error::UnknownTab(name.to_string()))
    }

    fn settle(&mut self) {
        loop {
            let applied: usize = self.tabs.values_mut().map(|t| t.navigator.drain()).sum();
            if applied == 0 {
                break;
            }
        }
    }
}
