//! Session state as seen by the navigation controller.
//!
//! The controller never touches storage directly. It asks a [`SessionOracle`]
//! two questions (is someone logged in, are they an administrator) and reads
//! both fresh on every decision. [`StoredSession`] answers them from shared
//! [`Storage`]; [`MemorySession`] answers them from a value set in code.

use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{info, trace, warn};

use crate::error::Result;
use crate::route::Route;
use crate::storage::{Storage, TabId};

/// Storage key holding the authentication token.
pub const AUTH_TOKEN_KEY: &str = "hawa_auth_token";

/// Storage key holding the serialized user record.
pub const USER_KEY: &str = "hawa_user";

/// Role value that grants administrator access.
pub const ADMIN_ROLE: &str = "admin";

/// Role value for industry accounts, which get the compliance page.
pub const INDUSTRY_ROLE: &str = "industry";

/// The two facts a routing decision depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SessionSnapshot {
    /// A token is present.
    pub authenticated: bool,
    /// The stored user is an administrator.
    pub is_admin: bool,
}

impl SessionSnapshot {
    /// Nobody is logged in.
    pub const ANONYMOUS: Self = Self {
        authenticated: false,
        is_admin: false,
    };

    /// A logged-in regular user.
    pub const MEMBER: Self = Self {
        authenticated: true,
        is_admin: false,
    };

    /// A logged-in administrator.
    pub const ADMIN: Self = Self {
        authenticated: true,
        is_admin: true,
    };

    /// Where a user lands right after logging in.
    #[must_use]
    pub fn home_route(self) -> Route {
        match (self.authenticated, self.is_admin) {
            (false, _) => Route::Landing,
            (true, true) => Route::Admin,
            (true, false) => Route::Dashboard,
        }
    }
}

/// The user record kept next to the token.
///
/// Only `role` and `is_admin` matter for routing. Unknown fields are kept so
/// a record written by another client survives a read/write cycle. A known
/// field holding the wrong JSON type reads as unset instead of failing the
/// whole record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserProfile {
    /// Login email.
    #[serde(default, deserialize_with = "lenient")]
    pub email: String,
    /// Display name.
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub full_name: Option<String>,
    /// Account role (`admin`, `industry`, `user`, ...).
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub role: Option<String>,
    /// Explicit administrator flag. Only a JSON `true` counts.
    #[serde(
        default,
        rename = "is_admin",
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub admin_flag: Option<bool>,
    /// Preferred UI language, as written by the backend.
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub language: Option<String>,
    /// Everything else.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Accept any JSON value, falling back to `T::default()` on a type mismatch.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

impl UserProfile {
    /// Create a profile with just an email.
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Self::default()
        }
    }

    /// Set the role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.full_name = Some(name.into());
        self
    }

    /// Set the explicit administrator flag.
    #[must_use]
    pub fn with_admin_flag(mut self, admin: bool) -> Self {
        self.admin_flag = Some(admin);
        self
    }

    /// Administrator if the role is `admin` or the flag is set.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE) || self.admin_flag == Some(true)
    }

    /// Check the role exactly.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role.as_deref() == Some(role)
    }
}

/// Read-only view of the current session, plus logout.
pub trait SessionOracle: Send + Sync {
    /// Whether a token is present.
    fn is_authenticated(&self) -> bool;

    /// Whether the current user is an administrator.
    fn is_admin(&self) -> bool;

    /// The current user record, if any.
    fn current_user(&self) -> Option<UserProfile>;

    /// End the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn logout(&self) -> Result<()>;

    /// Read both routing facts at once.
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            authenticated: self.is_authenticated(),
            is_admin: self.is_admin(),
        }
    }
}

/// Storage keys used by [`StoredSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKeys {
    /// Key holding the token.
    pub auth_token: String,
    /// Key holding the user record.
    pub user: String,
}

impl Default for SessionKeys {
    fn default() -> Self {
        Self {
            auth_token: AUTH_TOKEN_KEY.to_string(),
            user: USER_KEY.to_string(),
        }
    }
}

/// Session backed by shared storage, as seen from one tab.
#[derive(Debug, Clone)]
pub struct StoredSession {
    storage: Arc<Storage>,
    tab: TabId,
    keys: SessionKeys,
}

impl StoredSession {
    /// Create a session view for `tab` over `storage`.
    #[must_use]
    pub fn new(storage: Arc<Storage>, tab: TabId, keys: SessionKeys) -> Self {
        Self { storage, tab, keys }
    }

    /// The tab this view writes as.
    #[must_use]
    pub fn tab(&self) -> TabId {
        self.tab
    }

    /// The storage keys in use.
    #[must_use]
    pub fn keys(&self) -> &SessionKeys {
        &self.keys
    }

    /// The underlying storage.
    #[must_use]
    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    /// The stored token, if any.
    ///
    /// Unreadable storage counts as no token.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        match self.storage.get(&self.keys.auth_token) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %e, "failed to read auth token, treating session as logged out");
                None
            }
        }
    }

    /// Store a token and user record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or stored.
    pub fn login(&self, token: &str, user: &UserProfile) -> Result<()> {
        let record = serde_json::to_string(user)?;
        // User record first so token watchers see a complete session.
        self.storage.set(&self.keys.user, &record, self.tab)?;
        self.storage.set(&self.keys.auth_token, token, self.tab)?;
        info!(tab = %self.tab, email = %user.email, admin = user.is_admin(), "logged in");
        Ok(())
    }
}

impl SessionOracle for StoredSession {
    fn is_authenticated(&self) -> bool {
        let authenticated = self.token().is_some();
        trace!(tab = %self.tab, authenticated, "read session");
        authenticated
    }

    fn is_admin(&self) -> bool {
        self.current_user().is_some_and(|user| user.is_admin())
    }

    fn current_user(&self) -> Option<UserProfile> {
        let raw = match self.storage.get(&self.keys.user) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "failed to read user record");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "stored user record is not valid JSON");
                None
            }
        }
    }

    fn logout(&self) -> Result<()> {
        self.storage.remove(&self.keys.auth_token, self.tab)?;
        self.storage.remove(&self.keys.user, self.tab)?;
        info!(tab = %self.tab, "logged out");
        Ok(())
    }
}

/// Session held in memory, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySession {
    state: Mutex<(SessionSnapshot, Option<UserProfile>)>,
}

impl MemorySession {
    /// Create a session with the given state.
    #[must_use]
    pub fn new(snapshot: SessionSnapshot) -> Self {
        Self {
            state: Mutex::new((snapshot, None)),
        }
    }

    /// Replace the session state.
    pub fn set(&self, snapshot: SessionSnapshot) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).0 = snapshot;
    }

    /// Replace the user record.
    pub fn set_user(&self, user: Option<UserProfile>) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).1 = user;
    }

    fn current(&self) -> SessionSnapshot {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).0
    }
}

impl SessionOracle for MemorySession {
    fn is_authenticated(&self) -> bool {
        self.current().authenticated
    }

    fn is_admin(&self) -> bool {
        self.current().is_admin
    }

    fn current_user(&self) -> Option<UserProfile> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .1
            .clone()
    }

    fn logout(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = (SessionSnapshot::ANONYMOUS, None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored_session() -> StoredSession {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        StoredSession::new(storage, TabId::new(), SessionKeys::default())
    }

    #[test]
    fn test_empty_storage_is_anonymous() {
        let session = stored_session();
        assert!(!session.is_authenticated());
        assert!(!session.is_admin());
        assert_eq!(session.current_user(), None);
        assert_eq!(session.snapshot(), SessionSnapshot::ANONYMOUS);
    }

    #[test]
    fn test_login_member() {
        let session = stored_session();
        session
            .login("tok", &UserProfile::new("a@hawa.rw").with_role("user"))
            .unwrap();

        assert_eq!(session.snapshot(), SessionSnapshot::MEMBER);
        assert_eq!(session.token().as_deref(), Some("tok"));
        assert_eq!(session.current_user().unwrap().email, "a@hawa.rw");
    }

    #[test]
    fn test_login_admin_by_role() {
        let session = stored_session();
        session
            .login("tok", &UserProfile::new("root@hawa.rw").with_role("admin"))
            .unwrap();
        assert_eq!(session.snapshot(), SessionSnapshot::ADMIN);
    }

    #[test]
    fn test_login_admin_by_flag() {
        let session = stored_session();
        session
            .login(
                "tok",
                &UserProfile::new("ops@hawa.rw")
                    .with_role("industry")
                    .with_admin_flag(true),
            )
            .unwrap();
        assert!(session.is_admin());
    }

    #[test]
    fn test_logout_removes_both_keys() {
        let session = stored_session();
        session.login("tok", &UserProfile::new("a@hawa.rw")).unwrap();
        session.logout().unwrap();

        assert!(session.storage().keys().unwrap().is_empty());
        assert_eq!(session.snapshot(), SessionSnapshot::ANONYMOUS);
    }

    #[test]
    fn test_empty_token_is_not_authenticated() {
        let session = stored_session();
        session
            .storage()
            .set(AUTH_TOKEN_KEY, "", session.tab())
            .unwrap();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_corrupt_user_record_is_not_admin() {
        let session = stored_session();
        let storage = session.storage();
        storage.set(AUTH_TOKEN_KEY, "tok", session.tab()).unwrap();
        storage.set(USER_KEY, "{not json", session.tab()).unwrap();

        assert!(session.is_authenticated());
        assert!(!session.is_admin());
    }

    #[test]
    fn test_token_without_user_is_member() {
        let session = stored_session();
        session
            .storage()
            .set(AUTH_TOKEN_KEY, "tok", session.tab())
            .unwrap();
        assert_eq!(session.snapshot(), SessionSnapshot::MEMBER);
    }

    #[test]
    fn test_custom_keys() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let keys = SessionKeys {
            auth_token: "t".to_string(),
            user: "u".to_string(),
        };
        let session = StoredSession::new(Arc::clone(&storage), TabId::new(), keys);
        session.login("tok", &UserProfile::new("a@hawa.rw")).unwrap();

        assert_eq!(storage.get("t").unwrap().as_deref(), Some("tok"));
        assert!(storage.get(AUTH_TOKEN_KEY).unwrap().is_none());
    }

    #[test]
    fn test_sessions_share_storage() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let a = StoredSession::new(Arc::clone(&storage), TabId::new(), SessionKeys::default());
        let b = StoredSession::new(storage, TabId::new(), SessionKeys::default());

        a.login("tok", &UserProfile::new("a@hawa.rw")).unwrap();
        assert!(b.is_authenticated());

        b.logout().unwrap();
        assert!(!a.is_authenticated());
    }

    #[test]
    fn test_user_profile_keeps_unknown_fields() {
        let raw = r#"{"email":"a@hawa.rw","role":"industry","organization":"Hawa Ltd"}"#;
        let user: UserProfile = serde_json::from_str(raw).unwrap();

        assert!(user.has_role(INDUSTRY_ROLE));
        assert!(!user.is_admin());
        assert_eq!(user.extra["organization"], "Hawa Ltd");

        let back = serde_json::to_value(&user).unwrap();
        assert_eq!(back["organization"], "Hawa Ltd");
    }

    #[test]
    fn test_user_profile_reads_is_admin_field() {
        let user: UserProfile =
            serde_json::from_str(r#"{"email":"a@hawa.rw","is_admin":true}"#).unwrap();
        assert!(user.is_admin());
    }

    #[test]
    fn test_user_profile_reads_language() {
        let user: UserProfile =
            serde_json::from_str(r#"{"email":"a@hawa.rw","language":"rw"}"#).unwrap();
        assert_eq!(user.language.as_deref(), Some("rw"));
        assert!(user.extra.is_empty());
    }

    #[test]
    fn test_mistyped_fields_read_as_unset() {
        let raw = r#"{"email":null,"full_name":3,"role":["admin"],"is_admin":"yes","language":7}"#;
        let user: UserProfile = serde_json::from_str(raw).unwrap();

        assert_eq!(user.email, "");
        assert_eq!(user.full_name, None);
        assert_eq!(user.role, None);
        assert_eq!(user.admin_flag, None);
        assert_eq!(user.language, None);
        assert!(!user.is_admin());
    }

    #[test]
    fn test_admin_role_survives_mistyped_fields() {
        let records = [
            r#"{"email":null,"role":"admin"}"#,
            r#"{"email":"a@b","role":"admin","is_admin":1}"#,
            r#"{"email":"a@b","role":"admin","language":7}"#,
            r#"{"email":"a@b","role":"admin","locale":7}"#,
        ];
        for record in records {
            let session = stored_session();
            let storage = session.storage();
            storage.set(AUTH_TOKEN_KEY, "tok", session.tab()).unwrap();
            storage.set(USER_KEY, record, session.tab()).unwrap();

            assert_eq!(session.snapshot(), SessionSnapshot::ADMIN, "{record}");
            assert!(session.current_user().is_some(), "{record}");
        }
    }

    #[test]
    fn test_numeric_admin_flag_does_not_grant_admin() {
        let session = stored_session();
        let storage = session.storage();
        storage.set(AUTH_TOKEN_KEY, "tok", session.tab()).unwrap();
        storage
            .set(USER_KEY, r#"{"email":"a@b","role":"user","is_admin":1}"#, session.tab())
            .unwrap();

        assert_eq!(session.snapshot(), SessionSnapshot::MEMBER);
    }

    #[test]
    fn test_home_route() {
        assert_eq!(SessionSnapshot::ADMIN.home_route(), Route::Admin);
        assert_eq!(SessionSnapshot::MEMBER.home_route(), Route::Dashboard);
        assert_eq!(SessionSnapshot::ANONYMOUS.home_route(), Route::Landing);
    }

    #[test]
    fn test_memory_session() {
        let session = MemorySession::new(SessionSnapshot::ADMIN);
        assert_eq!(session.snapshot(), SessionSnapshot::ADMIN);

        session.set(SessionSnapshot::MEMBER);
        assert!(!session.is_admin());

        session.set_user(Some(UserProfile::new("a@hawa.rw")));
        assert!(session.current_user().is_some());

        session.logout().unwrap();
        assert_eq!(session.snapshot(), SessionSnapshot::ANONYMOUS);
        assert!(session.current_user().is_none());
    }
}
