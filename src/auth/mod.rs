mod context;
mod provider;
mod session;

pub use context::{AuthContext, AuthListener, Subscription};
pub use provider::{EnvIdentity, IdentityProvider};
pub use session::Session;

#[cfg(test)]
pub(crate) use session::token_expiring_at;
