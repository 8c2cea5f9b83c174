//! Home-page strip of meals per category. One page per tab, no paging.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, error, instrument};

use crate::api::dto::{Category, Meal, MealQuery};
use crate::api::Backend;
use crate::auth::{AuthContext, Session};
use crate::notice::Notice;
use crate::state::{lock, AppState};

pub const TABS: [&str; 4] = ["All", "Breakfast", "Lunch", "Dinner"];

#[derive(Debug, Clone)]
pub struct TabsState {
    pub active: &'static str,
    pub meals: Vec<Meal>,
    pub loading: bool,
    latest: u64,
}

pub struct CategoryTabsController {
    api: Arc<dyn Backend>,
    auth: AuthContext,
    limit: u32,
    state: Mutex<TabsState>,
}

impl CategoryTabsController {
    pub fn new(app: &AppState) -> Self {
        Self {
            api: app.api.clone(),
            auth: app.auth.clone(),
            limit: app.config.meals_page_size.max(1),
            state: Mutex::new(TabsState {
                active: TABS[0],
                meals: Vec::new(),
                loading: false,
                latest: 0,
            }),
        }
    }

    pub fn snapshot(&self) -> TabsState {
        lock(&self.state).clone()
    }

    /// Switches to `label` (unknown labels fall back to "All") and loads it.
    pub async fn select(&self, label: &str) -> Option<Notice> {
        let active = TABS
            .into_iter()
            .find(|t| t.eq_ignore_ascii_case(label.trim()))
            .unwrap_or(TABS[0]);
        lock(&self.state).active = active;
        self.refresh().await
    }

    /// Reloads the active tab.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Option<Notice> {
        let (seq, active) = {
            let mut state = lock(&self.state);
            state.latest += 1;
            state.loading = true;
            (state.latest, state.active)
        };

        let query = MealQuery {
            category: Category::from_tab(active),
            limit: self.limit,
            ..Default::default()
        };
        let token = self.auth.token();
        let result = self.api.list_meals(&query, token.as_deref()).await;

        let mut state = lock(&self.state);
        if seq != state.latest {
            debug!(tab = active, "discarding stale tab page");
            return None;
        }
        state.loading = false;
        match result {
            Ok(page) => {
                state.meals = page.meals;
                None
            }
            Err(e) => {
                error!(error = %e, tab = active, "fetch tab meals failed");
                Some(Notice::from_api("Error", &e, "Failed to fetch meals."))
            }
        }
    }

    /// Reloads the active tab on every sign-in or sign-out.
    pub async fn follow_session(&self, mut changes: watch::Receiver<Option<Session>>) {
        while changes.changed().await.is_ok() {
            self.refresh().await;
        }
    }
}
