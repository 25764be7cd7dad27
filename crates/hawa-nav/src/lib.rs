//! `hawa-nav` - Auth-gated hash router for the Hawa air-quality dashboard
//!
//! Maps the address fragment to a page, enforces the access policy against
//! the current session, redirects when needed and issues a fresh epoch on
//! every navigation so the page view is rebuilt. Several tabs can share one
//! session store; a logout in one tab redirects the others.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod location;
pub mod logging;
pub mod menu;
pub mod navigator;
pub mod replay;
pub mod route;
pub mod session;
pub mod storage;

pub use config::Config;
pub use controller::{Epoch, EpochClock, NavigationController, NavigationState};
pub use error::{Error, Result};
pub use location::{FragmentChange, HashLocation, Location};
pub use logging::init_logging;
pub use menu::{menu_for, MenuItem, MenuKind};
pub use navigator::{Navigator, NavigatorHandle, Step};
pub use replay::{Replay, ReplayAction, ReplayRecord, TabView};
pub use route::{AccessLevel, AccessPolicy, Route, RouteSet, Verdict};
pub use session::{
    MemorySession, SessionKeys, SessionOracle, SessionSnapshot, StoredSession, UserProfile,
};
pub use storage::{Storage, StorageEvent, TabId};
