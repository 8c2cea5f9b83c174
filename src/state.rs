use std::sync::{Arc, Mutex, MutexGuard};

use crate::api::{Backend, HttpBackend};
use crate::auth::{AuthContext, EnvIdentity, IdentityProvider};
use crate::config::AppConfig;

/// Everything a controller needs: config, the backend seam, and the session.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub api: Arc<dyn Backend>,
    pub auth: AuthContext,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    pub fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let api = Arc::new(HttpBackend::new(&config.api)?) as Arc<dyn Backend>;

        let auth = match EnvIdentity::session_from_env()? {
            Some(session) => AuthContext::signed_in(session),
            None => AuthContext::anonymous(),
        };

        Ok(Self {
            config,
            api,
            auth,
            identity: Arc::new(EnvIdentity),
        })
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        api: Arc<dyn Backend>,
        auth: AuthContext,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            config,
            api,
            auth,
            identity,
        }
    }

    /// State over an in-memory backend; the backend is returned for assertions.
    #[cfg(test)]
    pub(crate) fn fake(auth: AuthContext) -> (Self, Arc<crate::api::fake::FakeBackend>) {
        let backend = Arc::new(crate::api::fake::FakeBackend::new());
        let state = Self::from_parts(
            Arc::new(AppConfig::default()),
            backend.clone() as Arc<dyn Backend>,
            auth,
            Arc::new(EnvIdentity),
        );
        (state, backend)
    }
}

/// Controller state is never held across an await, so a poisoned lock only
/// means a panic mid-update elsewhere and the data is still usable.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
