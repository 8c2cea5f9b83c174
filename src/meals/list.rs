//! Browsable meal catalog with filters and infinite scroll.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, error, instrument};

use crate::api::dto::{Category, Meal, MealPage, MealQuery, SortOrder};
use crate::api::Backend;
use crate::auth::{AuthContext, Session};
use crate::error::ApiResult;
use crate::notice::Notice;
use crate::state::{lock, AppState};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MealFilters {
    pub search: String,
    pub category: Option<Category>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub sort: Option<SortOrder>,
}

impl MealFilters {
    pub fn query(&self, page: u32, limit: u32) -> MealQuery {
        let search = self.search.trim();
        MealQuery {
            search: (!search.is_empty()).then(|| search.to_string()),
            category: self.category,
            min_price: self.min_price,
            max_price: self.max_price,
            sort_by_price: self.sort,
            page: Some(page),
            limit,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MealListState {
    pub filters: MealFilters,
    pub meals: Vec<Meal>,
    pub page: u32,
    pub has_more: bool,
    pub loading: bool,
    latest: u64,
    /// A replacing fetch was issued and has not landed yet.
    pending_replace: bool,
}

impl Default for MealListState {
    fn default() -> Self {
        Self {
            filters: MealFilters::default(),
            meals: Vec::new(),
            page: 0,
            has_more: true,
            loading: false,
            latest: 0,
            pending_replace: false,
        }
    }
}

/// One issued page fetch. Only the most recently issued ticket may land.
#[derive(Debug, Clone, PartialEq)]
pub struct PageTicket {
    seq: u64,
    pub page: u32,
    pub replace: bool,
    pub query: MealQuery,
}

pub struct MealListController {
    api: Arc<dyn Backend>,
    auth: AuthContext,
    page_size: u32,
    state: Mutex<MealListState>,
}

impl MealListController {
    pub fn new(app: &AppState) -> Self {
        Self {
            api: app.api.clone(),
            auth: app.auth.clone(),
            page_size: app.config.meals_page_size.max(1),
            state: Mutex::new(MealListState::default()),
        }
    }

    pub fn snapshot(&self) -> MealListState {
        lock(&self.state).clone()
    }

    fn issue(&self, state: &mut MealListState, page: u32, replace: bool) -> PageTicket {
        state.latest += 1;
        state.loading = true;
        if replace {
            state.has_more = true;
            state.pending_replace = true;
        }
        PageTicket {
            seq: state.latest,
            page,
            replace,
            query: state.filters.query(page, self.page_size),
        }
    }

    /// New filter state: the list is replaced by page 1 of these filters.
    pub fn set_filters(&self, filters: MealFilters) -> PageTicket {
        let mut state = lock(&self.state);
        state.filters = filters;
        self.issue(&mut state, 1, true)
    }

    /// Fresh first page under the current filters, e.g. after a sign-in.
    pub fn restart(&self) -> PageTicket {
        let mut state = lock(&self.state);
        self.issue(&mut state, 1, true)
    }

    /// Next page to append, unless a fetch is running or the list is exhausted.
    /// After a failed replace this retries page 1 instead.
    pub fn next_page(&self) -> Option<PageTicket> {
        let mut state = lock(&self.state);
        if state.loading || !state.has_more {
            return None;
        }
        if state.pending_replace {
            return Some(self.issue(&mut state, 1, true));
        }
        let page = state.page + 1;
        Some(self.issue(&mut state, page, false))
    }

    #[instrument(skip(self), fields(page = ticket.page, seq = ticket.seq))]
    pub async fn fetch(&self, ticket: &PageTicket) -> ApiResult<MealPage> {
        let token = self.auth.token();
        self.api.list_meals(&ticket.query, token.as_deref()).await
    }

    /// Lands a fetch result. Results for superseded tickets are dropped.
    pub fn apply(&self, ticket: &PageTicket, result: ApiResult<MealPage>) -> Option<Notice> {
        let mut state = lock(&self.state);
        if ticket.seq != state.latest {
            debug!(seq = ticket.seq, latest = state.latest, "discarding stale meal page");
            return None;
        }
        state.loading = false;

        match result {
            Ok(page) => {
                state.has_more = page.meals.len() == ticket.query.limit as usize;
                if ticket.replace {
                    state.pending_replace = false;
                    state.meals = page.meals;
                } else {
                    state.meals.extend(page.meals);
                }
                state.page = ticket.page;
                None
            }
            Err(e) => {
                error!(error = %e, page = ticket.page, "fetch meals failed");
                Some(Notice::from_api("Error", &e, "Failed to fetch meals."))
            }
        }
    }

    pub async fn run(&self, ticket: PageTicket) -> Option<Notice> {
        let result = self.fetch(&ticket).await;
        self.apply(&ticket, result)
    }

    pub async fn update_filters(&self, filters: MealFilters) -> Option<Notice> {
        let ticket = self.set_filters(filters);
        self.run(ticket).await
    }

    pub async fn load_more(&self) -> Option<Notice> {
        let ticket = self.next_page()?;
        self.run(ticket).await
    }

    /// Restarts the list every time the session changes, until the context
    /// side of the channel goes away.
    pub async fn follow_session(&self, mut changes: watch::Receiver<Option<Session>>) {
        while changes.changed().await.is_ok() {
            let ticket = self.restart();
            self.run(ticket).await;
        }
    }
}
