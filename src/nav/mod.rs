//! Navigation bar: link set and profile menu follow the session.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{error, info};

use crate::auth::{AuthContext, AuthListener, IdentityProvider, Session, Subscription};
use crate::state::{lock, AppState};

pub const DEFAULT_AVATAR: &str = "/default-avatar.png";
pub const DASHBOARD_PATH: &str = "/dashboard";
pub const HOME_PATH: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NavLink {
    pub path: &'static str,
    pub label: &'static str,
}

const fn link(path: &'static str, label: &'static str) -> NavLink {
    NavLink { path, label }
}

pub const GUEST_LINKS: &[NavLink] = &[
    link("/", "Home"),
    link("/meals", "Meals"),
    link("/join-us", "Join Us"),
];

pub const USER_LINKS: &[NavLink] = &[
    link("/", "Home"),
    link("/meals", "Meals"),
    link("/upcoming-meals", "Upcoming Meals"),
    link("/featured", "Featured Meals"),
    link("/newsletter", "Newsletter"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileMenu {
    pub name: String,
    pub avatar: String,
    pub dashboard: &'static str,
}

impl ProfileMenu {
    fn for_session(session: &Session) -> Self {
        Self {
            name: session.display_name_or_email().to_string(),
            avatar: session
                .photo_url
                .clone()
                .unwrap_or_else(|| DEFAULT_AVATAR.to_string()),
            dashboard: DASHBOARD_PATH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavView {
    pub links: &'static [NavLink],
    pub profile: Option<ProfileMenu>,
    pub dropdown_open: bool,
    pub mobile_menu_open: bool,
}

impl Default for NavView {
    fn default() -> Self {
        Self {
            links: GUEST_LINKS,
            profile: None,
            dropdown_open: false,
            mobile_menu_open: false,
        }
    }
}

#[derive(Default)]
struct NavListener {
    view: Mutex<NavView>,
}

impl AuthListener for NavListener {
    fn on_auth_state_changed(&self, session: Option<&Session>) {
        let mut view = lock(&self.view);
        match session {
            Some(s) => {
                view.links = USER_LINKS;
                view.profile = Some(ProfileMenu::for_session(s));
            }
            None => {
                view.links = GUEST_LINKS;
                view.profile = None;
                view.dropdown_open = false;
            }
        }
    }
}

/// Holds its session subscription for as long as it lives.
pub struct NavigationController {
    auth: AuthContext,
    identity: Arc<dyn IdentityProvider>,
    listener: Arc<NavListener>,
    _subscription: Subscription,
}

impl NavigationController {
    pub fn new(app: &AppState) -> Self {
        let listener = Arc::new(NavListener::default());
        let subscription = app.auth.subscribe(listener.clone());
        Self {
            auth: app.auth.clone(),
            identity: app.identity.clone(),
            listener,
            _subscription: subscription,
        }
    }

    pub fn view(&self) -> NavView {
        lock(&self.listener.view).clone()
    }

    pub fn toggle_dropdown(&self) {
        let mut view = lock(&self.listener.view);
        view.dropdown_open = !view.dropdown_open && view.profile.is_some();
    }

    pub fn toggle_mobile_menu(&self) {
        let mut view = lock(&self.listener.view);
        view.mobile_menu_open = !view.mobile_menu_open;
    }

    /// Following a link closes both menus.
    pub fn close_menus(&self) {
        let mut view = lock(&self.listener.view);
        view.dropdown_open = false;
        view.mobile_menu_open = false;
    }

    /// Path to redirect to on success. A provider failure is logged and
    /// leaves the session in place.
    pub async fn sign_out(&self) -> Option<&'static str> {
        if let Err(e) = self.identity.sign_out().await {
            error!(error = %e, "sign out failed");
            return None;
        }
        self.auth.clear();
        self.close_menus();
        info!("signed out");
        Some(HOME_PATH)
    }
}
