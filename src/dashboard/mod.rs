//! Admin dashboard overview: counters and chart series.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{error, instrument};

use crate::api::dto::DashboardStats;
use crate::api::Backend;
use crate::notice::Notice;
use crate::state::{lock, AppState};

/// Chart palette, cycled when there are more slices than colours.
pub const PALETTE: [&str; 4] = ["#4F46E5", "#06B6D4", "#F59E0B", "#EF4444"];

#[derive(Debug, Clone, PartialEq)]
pub enum Overview {
    Loading,
    Loaded(DashboardStats),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatCard {
    pub label: &'static str,
    pub value: u64,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PieSlice {
    pub name: &'static str,
    pub value: u64,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Point {
    pub label: String,
    pub value: u64,
}

pub fn cards(stats: &DashboardStats) -> Vec<StatCard> {
    [
        ("Total Users", stats.total_users),
        ("Total Meals", stats.total_meals),
        ("Meal Requests", stats.total_requests),
        ("Reviews", stats.total_reviews),
    ]
    .into_iter()
    .zip(PALETTE)
    .map(|((label, value), color)| StatCard { label, value, color })
    .collect()
}

pub fn pie(stats: &DashboardStats) -> Vec<PieSlice> {
    [
        ("Users", stats.total_users),
        ("Meals", stats.total_meals),
        ("Requests", stats.total_requests),
        ("Reviews", stats.total_reviews),
    ]
    .into_iter()
    .zip(PALETTE.into_iter().cycle())
    .map(|((name, value), color)| PieSlice { name, value, color })
    .collect()
}

/// Bar series: meal title to like count.
pub fn likes_series(stats: &DashboardStats) -> Vec<Point> {
    stats
        .meal_likes
        .iter()
        .map(|m| Point {
            label: m.title.clone(),
            value: m.likes,
        })
        .collect()
}

/// Line series: month to request count.
pub fn monthly_series(stats: &DashboardStats) -> Vec<Point> {
    stats
        .monthly_requests
        .iter()
        .map(|m| Point {
            label: m.month.clone(),
            value: m.requests,
        })
        .collect()
}

pub struct OverviewController {
    api: Arc<dyn Backend>,
    state: Mutex<Overview>,
}

impl OverviewController {
    pub fn new(app: &AppState) -> Self {
        Self {
            api: app.api.clone(),
            state: Mutex::new(Overview::Loading),
        }
    }

    pub fn snapshot(&self) -> Overview {
        lock(&self.state).clone()
    }

    #[instrument(skip(self))]
    pub async fn load(&self) -> Option<Notice> {
        *lock(&self.state) = Overview::Loading;
        match self.api.overview_stats().await {
            Ok(stats) => {
                *lock(&self.state) = Overview::Loaded(stats);
                None
            }
            Err(e) => {
                error!(error = %e, "fetch overview stats failed");
                *lock(&self.state) = Overview::Failed(e.to_string());
                Some(Notice::from_api("Error", &e, "Failed to load overview stats."))
            }
        }
    }
}
