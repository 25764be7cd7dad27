//! Configuration management for hawa-nav.
//!
//! Loaded with figment from defaults, a TOML file and `HAWANAV_` environment
//! variables. Nested keys use a double underscore in the environment, e.g.
//! `HAWANAV_ROUTING__ROUTE_SET=compact`.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::route::{AccessPolicy, RouteSet};
use crate::session::{SessionKeys, AUTH_TOKEN_KEY, USER_KEY};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "hawa-nav";

/// Default session database file name.
const STORAGE_FILE_NAME: &str = "session.db";

/// Environment variable prefix.
const ENV_PREFIX: &str = "HAWANAV_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `HAWANAV_`)
/// 2. TOML config file at `~/.config/hawa-nav/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Routing configuration.
    pub routing: RoutingConfig,
    /// Session storage configuration.
    pub session: SessionConfig,
    /// Event channel configuration.
    pub events: EventsConfig,
}

/// Routing-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Which routes are enabled.
    pub route_set: RouteSet,
}

/// Session-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Storage key holding the auth token. Changes to it trigger cross-tab checks.
    pub auth_token_key: String,
    /// Storage key holding the user record.
    pub user_key: String,
    /// Path to the session database.
    /// Defaults to `~/.local/share/hawa-nav/session.db`
    pub storage_path: Option<PathBuf>,
}

/// Event channel configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Capacity of the fragment and storage broadcast channels.
    pub channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auth_token_key: AUTH_TOKEN_KEY.to_string(),
            user_key: USER_KEY.to_string(),
            storage_path: None,
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.session.auth_token_key.trim().is_empty() {
            return Err(Error::config_validation(
                "session.auth_token_key must not be empty",
            ));
        }

        if self.session.user_key.trim().is_empty() {
            return Err(Error::config_validation("session.user_key must not be empty"));
        }

        if self.session.auth_token_key == self.session.user_key {
            return Err(Error::config_validation(format!(
                "session.auth_token_key and session.user_key must differ (both are '{}')",
                self.session.user_key
            )));
        }

        if self.events.channel_capacity == 0 {
            return Err(Error::config_validation(
                "events.channel_capacity must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Get the session database path, resolving defaults if not set.
    #[must_use]
    pub fn storage_path(&self) -> PathBuf {
        self.session
            .storage_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(STORAGE_FILE_NAME))
    }

    /// The access policy for the configured route set.
    #[must_use]
    pub fn policy(&self) -> AccessPolicy {
        AccessPolicy::new(self.routing.route_set)
    }

    /// The configured session storage keys.
    #[must_use]
    pub fn session_keys(&self) -> SessionKeys {
        SessionKeys {
            auth_token: self.session.auth_token_key.clone(),
            user: self.session.user_key.clone(),
        }
    }
}
