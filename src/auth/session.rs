use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::debug;

use crate::error::AuthError;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Claims we read from the identity provider's token. Only the expiry
/// matters on this side; the backend verifies the signature.
#[derive(Debug, Deserialize)]
struct TokenClaims {
    #[serde(default)]
    exp: Option<i64>,
}

/// Signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub token: String,
}

impl Session {
    pub fn new(email: &str, token: impl Into<String>) -> Result<Self, AuthError> {
        let email = email.trim().to_string();
        if !is_valid_email(&email) {
            return Err(AuthError::InvalidEmail(email));
        }
        Ok(Self {
            email,
            display_name: None,
            photo_url: None,
            token: token.into(),
        })
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into()).filter(|n: &String| !n.trim().is_empty());
        self
    }

    pub fn with_photo_url(mut self, url: impl Into<String>) -> Self {
        self.photo_url = Some(url.into()).filter(|u: &String| !u.trim().is_empty());
        self
    }

    /// Identifier stored in liker sets and request records.
    pub fn user_id(&self) -> &str {
        &self.email
    }

    pub fn display_name_or_email(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }

    /// `exp` claim of the bearer token, if it is a JWT that carries one.
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        match decode::<TokenClaims>(&self.token, &DecodingKey::from_secret(&[]), &validation) {
            Ok(data) => data
                .claims
                .exp
                .and_then(|exp| OffsetDateTime::from_unix_timestamp(exp).ok()),
            Err(e) => {
                debug!(error = %e, "token is not a readable jwt");
                None
            }
        }
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at().is_some_and(|exp| exp <= now)
    }
}

/// HS256 token carrying only `sub` and `exp`, for tests.
#[cfg(test)]
pub(crate) fn token_expiring_at(exp: OffsetDateTime) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    #[derive(serde::Serialize)]
    struct Claims {
        sub: String,
        exp: i64,
    }

    let claims = Claims {
        sub: "uid-1".into(),
        exp: exp.unix_timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"provider-secret"),
    )
    .expect("sign token")
}
