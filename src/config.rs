use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_API_BASE_URL: &str = "https://hotel-server-side-sandy.vercel.app";

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub meals_page_size: u32,
    pub requests_check_limit: u32,
    pub admin_email: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: DEFAULT_API_BASE_URL.into(),
                timeout_secs: 10,
            },
            meals_page_size: 6,
            requests_check_limit: 100,
            admin_email: "admin@example.com".into(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let api = ApiConfig {
            base_url: std::env::var("API_BASE_URL").unwrap_or(defaults.api.base_url),
            timeout_secs: parse_var("API_TIMEOUT_SECS")?.unwrap_or(defaults.api.timeout_secs),
        };
        let meals_page_size: u32 =
            parse_var("MEALS_PAGE_SIZE")?.unwrap_or(defaults.meals_page_size);
        anyhow::ensure!(meals_page_size > 0, "MEALS_PAGE_SIZE must be positive");

        Ok(Self {
            api,
            meals_page_size,
            requests_check_limit: parse_var("REQUESTS_CHECK_LIMIT")?
                .unwrap_or(defaults.requests_check_limit),
            admin_email: std::env::var("ADMIN_EMAIL").unwrap_or(defaults.admin_email),
        })
    }
}

fn parse_var<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("parse {name}={v:?}")),
        Err(_) => Ok(None),
    }
}
