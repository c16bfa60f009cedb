//! Caller identity.
//!
//! Every protected route carries `Authorization: Bearer <id token>`. An
//! [`IdentityVerifier`] turns that token into a [`VerifiedPrincipal`] whose
//! `email` is the only identity the rest of the service trusts. Emails found in
//! request bodies or query strings are never used for authorization.

pub mod firebase;
pub mod jwks;
pub mod token;

use async_trait::async_trait;
use thiserror::Error;

pub use firebase::{FirebaseVerifier, ServiceAccount, DEFAULT_JWKS_URL};
pub use token::TokenError;

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPrincipal {
    /// Provider user id (`sub`).
    pub subject: String,
    /// Lowercased email from the token.
    pub email: String,
    pub email_verified: bool,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("token carries no email claim")]
    MissingEmail,
}

/// Health of the key source behind a verifier, reported by `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyStatus {
    /// Remote keyset is reachable and the last fetch succeeded.
    Ok,
    /// Remote keyset could not be fetched.
    Error,
    /// Keys are configured locally; there is nothing to reach.
    Static,
}

impl DependencyStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Static => "static",
        }
    }

    #[must_use]
    pub const fn is_healthy(self) -> bool {
        !matches!(self, Self::Error)
    }
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify a raw bearer token.
    async fn verify(&self, token: &str) -> Result<VerifiedPrincipal, AuthError>;

    async fn status(&self) -> DependencyStatus;
}
