use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hawa_nav::{
    AccessPolicy, HashLocation, Location, NavigationController, Navigator, Route, SessionKeys,
    SessionOracle, Storage, StoredSession, TabId, UserProfile,
};
use tempfile::TempDir;

// --- Hand-driven session for controller-only scenarios ---

#[derive(Default)]
struct FakeSession {
    authenticated: AtomicBool,
    admin: AtomicBool,
}

impl FakeSession {
    fn set(&self, authenticated: bool, admin: bool) {
        self.authenticated.store(authenticated, Ordering::SeqCst);
        self.admin.store(admin, Ordering::SeqCst);
    }
}

impl SessionOracle for FakeSession {
    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    fn is_admin(&self) -> bool {
        self.admin.load(Ordering::SeqCst)
    }

    fn current_user(&self) -> Option<UserProfile> {
        None
    }

    fn logout(&self) -> hawa_nav::Result<()> {
        self.set(false, false);
        Ok(())
    }
}

fn controller_at(fragment: &str) -> (Arc<HashLocation>, Arc<FakeSession>, NavigationController) {
    let location = Arc::new(HashLocation::new(fragment));
    let session = Arc::new(FakeSession::default());
    let controller = NavigationController::new(
        AccessPolicy::default(),
        Arc::clone(&location) as Arc<dyn Location>,
        Arc::clone(&session) as Arc<dyn SessionOracle>,
    );
    (location, session, controller)
}

// --- Tabs over shared storage ---

struct Tab {
    location: Arc<HashLocation>,
    session: Arc<StoredSession>,
    navigator: Navigator,
}

fn open_tab(storage: &Arc<Storage>, fragment: &str) -> Tab {
    let tab = TabId::new();
    let location = Arc::new(HashLocation::new(fragment));
    let session = Arc::new(StoredSession::new(
        Arc::clone(storage),
        tab,
        SessionKeys::default(),
    ));
    let controller = NavigationController::new(
        AccessPolicy::default(),
        Arc::clone(&location) as Arc<dyn Location>,
        Arc::clone(&session) as Arc<dyn SessionOracle>,
    );
    let (navigator, _) = Navigator::start(controller, storage, tab);
    Tab {
        location,
        session,
        navigator,
    }
}

#[test]
fn test_every_fragment_resolves_to_a_known_route() {
    let (_, _, controller) = controller_at("");
    let samples = [
        "",
        "admin/bogus",
        "ADMIN",
        "dashboard/",
        " dashboard",
        "admin/users?id=4",
        "map",
        "verify-otp",
        "💨",
    ];
    for fragment in samples {
        let route = controller.resolve_route(fragment);
        assert!(Route::ALL.contains(&route), "{fragment:?} -> {route:?}");
    }
    assert_eq!(controller.resolve_route("admin/bogus"), Route::Landing);
}

#[test]
fn test_protected_routes_need_a_session() {
    for route in Route::ALL.into_iter().filter(|r| r.is_protected()) {
        let (location, session, controller) = controller_at(route.as_str());
        let page = controller.decide_page(route, session.snapshot());
        assert_eq!(page, Route::Login, "{route}");
        assert_eq!(location.href(), "#login");
    }
}

#[test]
fn test_admin_routes_demote_members_to_dashboard() {
    for route in [
        Route::Admin,
        Route::AdminUsers,
        Route::AdminIotData,
        Route::AdminFeedback,
    ] {
        let (location, session, controller) = controller_at(route.as_str());
        session.set(true, false);
        assert_eq!(controller.decide_page(route, session.snapshot()), Route::Dashboard);
        assert_eq!(location.href(), "#dashboard");
    }
}

#[test]
fn test_landing_is_always_reachable() {
    let (location, session, controller) = controller_at("");
    for (authenticated, admin) in [(false, false), (true, false), (true, true), (false, true)] {
        session.set(authenticated, admin);
        assert_eq!(
            controller.decide_page(Route::Landing, session.snapshot()),
            Route::Landing
        );
    }
    assert_eq!(location.fragment(), "");
}

#[test]
fn test_revisiting_a_page_remounts_it() {
    let (location, session, mut controller) = controller_at("dashboard");
    session.set(true, false);
    controller.start();

    location.navigate("#dashboard");
    let first = controller.on_fragment_changed();
    location.navigate("#dashboard");
    let second = controller.on_fragment_changed();

    assert_eq!(first.current_page, second.current_page);
    assert_ne!(first.epoch, second.epoch);
}

#[test]
fn test_logout_elsewhere_leaves_profile() {
    let (location, session, mut controller) = controller_at("#profile");
    session.set(true, false);
    assert_eq!(controller.start().current_page, Route::Profile);

    session.set(false, false);
    let state = controller
        .on_cross_tab_session_invalidated("hawa_auth_token")
        .expect("profile needs a session");

    assert_eq!(state.current_page, Route::Login);
    assert_eq!(location.href(), "#login");
}

#[test]
fn test_login_and_promotion_walkthrough() {
    let (location, session, mut controller) = controller_at("#admin/iot-data");

    assert_eq!(controller.start().current_page, Route::Login);
    assert_eq!(location.href(), "#login");

    session.set(true, false);
    location.navigate("#admin");
    assert_eq!(controller.on_fragment_changed().current_page, Route::Dashboard);
    assert_eq!(location.href(), "#dashboard");

    session.set(true, true);
    location.navigate("#admin");
    assert_eq!(controller.on_fragment_changed().current_page, Route::Admin);
    assert_eq!(location.href(), "#admin");
}

#[tokio::test]
async fn test_logout_in_one_tab_redirects_the_others() {
    let storage = Arc::new(Storage::open_in_memory().unwrap());

    let mut first = open_tab(&storage, "#login");
    first
        .session
        .login("t-1", &UserProfile::new("amina@hawa.rw").with_role("admin"))
        .unwrap();
    first.location.navigate("#admin/users");
    first.navigator.drain();
    assert_eq!(first.navigator.state().current_page, Route::AdminUsers);

    let mut second = open_tab(&storage, "#map");
    let mut third = open_tab(&storage, "#register");
    assert_eq!(second.navigator.state().current_page, Route::Map);

    first.session.logout().unwrap();
    for tab in [&mut first, &mut second, &mut third] {
        tab.navigator.drain();
    }

    // The tab that logged out sees no storage event of its own.
    assert_eq!(first.navigator.state().current_page, Route::AdminUsers);
    assert_eq!(second.navigator.state().current_page, Route::Login);
    assert_eq!(second.location.href(), "#login");
    assert_eq!(third.navigator.state().current_page, Route::Register);
}

#[tokio::test]
async fn test_demotion_in_another_tab() {
    let storage = Arc::new(Storage::open_in_memory().unwrap());
    let mut viewer = open_tab(&storage, "");
    let editor = open_tab(&storage, "");

    editor
        .session
        .login("t-1", &UserProfile::new("ops@hawa.rw").with_role("admin"))
        .unwrap();
    viewer.navigator.drain();
    viewer.location.navigate("#admin/feedback");
    viewer.navigator.drain();
    assert_eq!(viewer.navigator.state().current_page, Route::AdminFeedback);

    // Re-login as a regular user rewrites both keys under a new token.
    editor
        .session
        .login("t-2", &UserProfile::new("ops@hawa.rw").with_role("user"))
        .unwrap();
    viewer.navigator.drain();

    assert_eq!(viewer.navigator.state().current_page, Route::Dashboard);
    assert_eq!(viewer.location.href(), "#dashboard");
}

#[tokio::test]
async fn test_navigator_run_publishes_to_watchers() {
    let storage = Arc::new(Storage::open_in_memory().unwrap());
    let tab = open_tab(&storage, "");
    let mut watcher = tab.navigator.subscribe();
    let handle = tab.navigator.handle();
    let location = Arc::clone(&tab.location);

    let task = tokio::spawn(tab.navigator.run());

    location.navigate("#register");
    watcher.changed().await.unwrap();
    assert_eq!(watcher.borrow_and_update().current_page, Route::Register);

    handle.stop();
    let last = task.await.unwrap();
    assert_eq!(last.current_page, Route::Register);
}

#[test]
fn test_admin_with_loosely_typed_record_stays_on_admin() {
    let storage = Arc::new(Storage::open_in_memory().unwrap());
    let writer = TabId::new();
    storage.set("hawa_auth_token", "t-1", writer).unwrap();
    storage
        .set(
            "hawa_user",
            r#"{"email":"a@b","role":"admin","is_admin":1,"locale":7}"#,
            writer,
        )
        .unwrap();

    let tab = open_tab(&storage, "#admin");
    assert_eq!(tab.navigator.state().current_page, Route::Admin);
    assert_eq!(tab.location.href(), "#admin");
}

#[test]
fn test_session_survives_reopening_storage() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.db");

    {
        let storage = Arc::new(Storage::open(&path).unwrap());
        let session = StoredSession::new(storage, TabId::new(), SessionKeys::default());
        session
            .login("t-1", &UserProfile::new("amina@hawa.rw").with_role("industry"))
            .unwrap();
    }

    let storage = Arc::new(Storage::open(&path).unwrap());
    let tab = open_tab(&storage, "#compliance");
    assert_eq!(tab.navigator.state().current_page, Route::Compliance);
    assert!(tab.session.current_user().unwrap().has_role("industry"));
}
