//! Routes and the access policy that gates them.
//!
//! A [`Route`] is one of a closed set of page identifiers. Fragments are
//! matched literally against the enabled [`RouteSet`]; anything else falls
//! back to [`Route::Landing`]. Every route carries exactly one
//! [`AccessLevel`], and [`AccessPolicy::evaluate`] turns a route plus a
//! [`SessionSnapshot`] into a [`Verdict`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::session::SessionSnapshot;

/// A page the dashboard can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Route {
    /// Public landing page. Also the fallback for unknown fragments.
    #[default]
    #[serde(rename = "landing")]
    Landing,
    /// Sign-in form.
    #[serde(rename = "login")]
    Login,
    /// Account registration.
    #[serde(rename = "register")]
    Register,
    /// One-time-password confirmation after registration.
    #[serde(rename = "verify-otp")]
    VerifyOtp,
    /// Air-quality dashboard for signed-in users.
    #[serde(rename = "dashboard")]
    Dashboard,
    /// The signed-in user's profile.
    #[serde(rename = "profile")]
    Profile,
    /// Emission compliance records for industry accounts.
    #[serde(rename = "compliance")]
    Compliance,
    /// Community pollution reports.
    #[serde(rename = "community")]
    Community,
    /// Admin overview.
    #[serde(rename = "admin")]
    Admin,
    /// User management.
    #[serde(rename = "admin/users")]
    AdminUsers,
    /// IoT sensor data management.
    #[serde(rename = "admin/iot-data")]
    AdminIotData,
    /// Moderation of community feedback.
    #[serde(rename = "admin/feedback")]
    AdminFeedback,
    /// Pollutant heat map.
    #[serde(rename = "map")]
    Map,
}

impl Route {
    /// Every route, in menu order.
    pub const ALL: [Route; 13] = [
        Self::Landing,
        Self::Login,
        Self::Register,
        Self::VerifyOtp,
        Self::Dashboard,
        Self::Profile,
        Self::Compliance,
        Self::Community,
        Self::Map,
        Self::Admin,
        Self::AdminUsers,
        Self::AdminIotData,
        Self::AdminFeedback,
    ];

    /// The fragment text for this route, without the leading `#`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Landing => "landing",
            Self::Login => "login",
            Self::Register => "register",
            Self::VerifyOtp => "verify-otp",
            Self::Dashboard => "dashboard",
            Self::Profile => "profile",
            Self::Compliance => "compliance",
            Self::Community => "community",
            Self::Admin => "admin",
            Self::AdminUsers => "admin/users",
            Self::AdminIotData => "admin/iot-data",
            Self::AdminFeedback => "admin/feedback",
            Self::Map => "map",
        }
    }

    /// Exact, case-sensitive lookup. No prefix matching, no parameters.
    #[must_use]
    pub fn from_fragment(fragment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|route| route.as_str() == fragment)
    }

    /// The session level needed to view this route.
    #[must_use]
    pub fn required_level(self) -> AccessLevel {
        match self {
            Self::Landing | Self::Login | Self::Register | Self::VerifyOtp => AccessLevel::Public,
            Self::Dashboard | Self::Profile | Self::Map | Self::Compliance | Self::Community => {
                AccessLevel::Authenticated
            }
            Self::Admin | Self::AdminUsers | Self::AdminIotData | Self::AdminFeedback => {
                AccessLevel::Admin
            }
        }
    }

    /// Whether viewing this route needs any session at all.
    #[must_use]
    pub fn is_protected(self) -> bool {
        self.required_level().requires_authentication()
    }

    /// Human label used by menus.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Landing => "Home",
            Self::Login => "Login",
            Self::Register => "Register",
            Self::VerifyOtp => "Verify OTP",
            Self::Dashboard => "Dashboard",
            Self::Profile => "Profile",
            Self::Compliance => "Compliance",
            Self::Community => "Community Reports",
            Self::Admin => "Admin Dashboard",
            Self::AdminUsers => "Users",
            Self::AdminIotData => "IoT Data",
            Self::AdminFeedback => "Community Feedback",
            Self::Map => "Pollutant Map",
        }
    }

    /// Key-safe name: the fragment with `/` replaced by `-`.
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Self::AdminUsers => "admin-users",
            Self::AdminIotData => "admin-iot-data",
            Self::AdminFeedback => "admin-feedback",
            other => other.as_str(),
        }
    }

    /// The full fragment including `#`, as written to the location.
    #[must_use]
    pub fn fragment(self) -> String {
        format!("#{}", self.as_str())
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Session level a route requires. `Admin` implies `Authenticated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Anyone, signed in or not.
    Public,
    /// Any signed-in user.
    Authenticated,
    /// Signed-in administrators only.
    Admin,
}

impl AccessLevel {
    /// Whether this level needs a signed-in session.
    #[must_use]
    pub fn requires_authentication(self) -> bool {
        self >= Self::Authenticated
    }

    /// Whether this level needs an administrator.
    #[must_use]
    pub fn requires_admin(self) -> bool {
        self == Self::Admin
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Authenticated => write!(f, "authenticated"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// Which routes a deployment recognises.
///
/// The dashboard shipped with two page sets; `Compact` is the earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSet {
    /// All thirteen routes.
    #[default]
    Full,
    /// Landing, auth pages, dashboard, profile, map, admin and IoT data.
    Compact,
}

const COMPACT_ROUTES: [Route; 8] = [
    Route::Landing,
    Route::Login,
    Route::Register,
    Route::Dashboard,
    Route::Profile,
    Route::Map,
    Route::Admin,
    Route::AdminIotData,
];

impl RouteSet {
    /// Routes enabled by this set, in menu order.
    #[must_use]
    pub fn routes(self) -> &'static [Route] {
        match self {
            Self::Full => &Route::ALL,
            Self::Compact => &COMPACT_ROUTES,
        }
    }

    /// Whether `route` resolves under this set.
    #[must_use]
    pub fn contains(self, route: Route) -> bool {
        self.routes().contains(&route)
    }
}

impl fmt::Display for RouteSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Compact => write!(f, "compact"),
        }
    }
}

/// Outcome of checking a route against a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The session may view the route.
    Allow,
    /// No session; send to the login page.
    RedirectToLogin,
    /// Signed in but not an admin; send to the user dashboard.
    RedirectToDashboard,
}

impl Verdict {
    /// The page actually shown for `requested` under this verdict.
    #[must_use]
    pub fn target(self, requested: Route) -> Route {
        match self {
            Self::Allow => requested,
            Self::RedirectToLogin => Route::Login,
            Self::RedirectToDashboard => Route::Dashboard,
        }
    }

    /// Whether the verdict sends the user elsewhere.
    #[must_use]
    pub fn is_redirect(self) -> bool {
        self != Self::Allow
    }
}

/// Static route-to-level table plus the enabled route set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessPolicy {
    route_set: RouteSet,
}

impl AccessPolicy {
    /// Policy over the given route set.
    #[must_use]
    pub fn new(route_set: RouteSet) -> Self {
        Self { route_set }
    }

    /// The enabled route set.
    #[must_use]
    pub fn route_set(&self) -> RouteSet {
        self.route_set
    }

    /// Resolve raw fragment text (without `#`) to an enabled route.
    ///
    /// Never fails: unknown or disabled fragments become [`Route::Landing`].
    #[must_use]
    pub fn resolve(&self, fragment: &str) -> Route {
        Route::from_fragment(fragment)
            .filter(|route| self.route_set.contains(*route))
            .unwrap_or(Route::Landing)
    }

    /// Check `route` against `session`. The authentication check runs first.
    #[must_use]
    pub fn evaluate(&self, route: Route, session: SessionSnapshot) -> Verdict {
        let level = route.required_level();
        if level.requires_authentication() && !session.authenticated {
            Verdict::RedirectToLogin
        } else if level.requires_admin() && !session.is_admin {
            Verdict::RedirectToDashboard
        } else {
            Verdict::Allow
        }
    }

    /// `(route, level)` pairs for every enabled route.
    pub fn table(&self) -> impl Iterator<Item = (Route, AccessLevel)> + '_ {
        self.route_set
            .routes()
            .iter()
            .map(|route| (*route, route.required_level()))
    }
}
