use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, info};

use super::session::Session;

/// Receives every session change published through an [`AuthContext`].
pub trait AuthListener: Send + Sync {
    fn on_auth_state_changed(&self, session: Option<&Session>);
}

struct Inner {
    session: Mutex<Option<Session>>,
    listeners: Mutex<Vec<(u64, Arc<dyn AuthListener>)>>,
    next_id: AtomicU64,
    changes: watch::Sender<Option<Session>>,
}

/// Explicit handle to the current session, passed to every controller.
/// Cloning shares the same state.
#[derive(Clone)]
pub struct AuthContext {
    inner: Arc<Inner>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::from_session(None)
    }

    pub fn signed_in(session: Session) -> Self {
        Self::from_session(Some(session))
    }

    fn from_session(session: Option<Session>) -> Self {
        let (changes, _) = watch::channel(session.clone());
        Self {
            inner: Arc::new(Inner {
                session: Mutex::new(session),
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                changes,
            }),
        }
    }

    /// Current session. A session whose token has expired is dropped here
    /// and listeners hear about it.
    pub fn current(&self) -> Option<Session> {
        let session = lock(&self.inner.session).clone()?;
        if session.is_expired_at(OffsetDateTime::now_utc()) {
            info!(email = %session.email, "session token expired");
            self.publish(None);
            return None;
        }
        Some(session)
    }

    /// Bearer token for the next request, read fresh each time.
    pub fn token(&self) -> Option<String> {
        self.current().map(|s| s.token)
    }

    pub fn sign_in(&self, session: Session) {
        info!(email = %session.email, "signed in");
        self.publish(Some(session));
    }

    pub fn clear(&self) {
        self.publish(None);
    }

    fn publish(&self, session: Option<Session>) {
        *lock(&self.inner.session) = session.clone();
        self.inner.changes.send_replace(session.clone());

        let listeners: Vec<Arc<dyn AuthListener>> = lock(&self.inner.listeners)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        debug!(listeners = listeners.len(), signed_in = session.is_some(), "auth state changed");
        for l in listeners {
            l.on_auth_state_changed(session.as_ref());
        }
    }

    /// Registers `listener` and calls it once with the current state. The
    /// listener stays registered until the returned guard is dropped.
    pub fn subscribe(&self, listener: Arc<dyn AuthListener>) -> Subscription {
        let current = self.current();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.listeners).push((id, Arc::clone(&listener)));
        listener.on_auth_state_changed(current.as_ref());
        Subscription {
            inner: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Async view of session changes. Dropping the receiver unsubscribes.
    pub fn watch(&self) -> watch::Receiver<Option<Session>> {
        self.inner.changes.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }
}

/// Registration guard returned by [`AuthContext::subscribe`].
#[must_use = "dropping the subscription unsubscribes the listener"]
pub struct Subscription {
    inner: Weak<Inner>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            lock(&inner.listeners).retain(|(id, _)| *id != self.id);
        }
    }
}
