use async_trait::async_trait;
use tracing::{info, warn};

use super::session::Session;
use crate::error::AuthError;

/// The external identity provider. Only sign-out is driven from here; sign-in
/// happens on the provider's side and lands in the `AuthContext`.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_out(&self) -> Result<(), AuthError>;
}

/// Identity handed to the binary through environment variables.
#[derive(Debug, Default, Clone)]
pub struct EnvIdentity;

impl EnvIdentity {
    /// `HOSTEL_ID_TOKEN` and `HOSTEL_USER_EMAIL` both set means signed in.
    pub fn session_from_env() -> anyhow::Result<Option<Session>> {
        let token = std::env::var("HOSTEL_ID_TOKEN").ok().filter(|t| !t.is_empty());
        let email = std::env::var("HOSTEL_USER_EMAIL").ok().filter(|e| !e.is_empty());

        let (token, email) = match (token, email) {
            (Some(t), Some(e)) => (t, e),
            (Some(_), None) => {
                warn!("HOSTEL_ID_TOKEN set without HOSTEL_USER_EMAIL; continuing anonymously");
                return Ok(None);
            }
            _ => return Ok(None),
        };

        let mut session = Session::new(&email, token)?;
        if let Ok(name) = std::env::var("HOSTEL_USER_NAME") {
            session = session.with_display_name(name);
        }
        if let Ok(photo) = std::env::var("HOSTEL_USER_PHOTO") {
            session = session.with_photo_url(photo);
        }
        Ok(Some(session))
    }
}

#[async_trait]
impl IdentityProvider for EnvIdentity {
    async fn sign_out(&self) -> Result<(), AuthError> {
        info!("env identity signed out for this run");
        Ok(())
    }
}
