//! User-facing notifications produced by controller actions.

use serde::Serialize;

use crate::error::{ApiError, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: Level,
    pub title: String,
    pub text: String,
}

impl Notice {
    pub fn new(level: Level, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            text: text.into(),
        }
    }

    pub fn success(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(Level::Success, title, text)
    }

    pub fn info(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(Level::Info, title, text)
    }

    pub fn warning(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(Level::Warning, title, text)
    }

    pub fn error(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(Level::Error, title, text)
    }

    pub fn login_required(action: &str) -> Self {
        Self::warning("Login Required", format!("Please login to {action}."))
    }

    /// Error notice preferring the server's own message over `fallback`.
    pub fn from_api(title: &str, err: &ApiError, fallback: &str) -> Self {
        Self::error(title, err.server_message().unwrap_or(fallback))
    }

    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }
}

impl From<ValidationError> for Notice {
    fn from(e: ValidationError) -> Self {
        let title = match e {
            ValidationError::MissingField(_) => "Missing Field",
            ValidationError::InvalidPrice => "Invalid Price",
            ValidationError::EmptyComment => "Empty Comment",
        };
        Notice::error(title, e.to_string())
    }
}
