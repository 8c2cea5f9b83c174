//! Client core for the hostel meal service: typed backend access, an explicit
//! session context, and one controller per screen.

pub mod api;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod display;
pub mod error;
pub mod meals;
pub mod nav;
pub mod notice;
pub mod state;
pub mod upcoming;

pub use api::{Backend, HttpBackend};
pub use auth::{AuthContext, Session};
pub use config::AppConfig;
pub use error::{ApiError, ApiResult, ValidationError};
pub use notice::{Level, Notice};
pub use state::AppState;
