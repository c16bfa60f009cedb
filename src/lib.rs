//! # Share Meal (food donation marketplace API)
//!
//! `sharemeal` lets donors list surplus food and requesters claim it. Every
//! listing moves through `available -> requested -> delivered`, and falls back
//! to `available` when the donator cancels the request that claimed it.
//!
//! ## Identity
//!
//! Protected routes expect `Authorization: Bearer <Firebase ID token>`. Tokens
//! are verified offline against the provider's published JWKS (RS256), and the
//! token `email` claim becomes the authorization subject. Any verification
//! failure is a plain `401`; the reason is only logged.
//!
//! ## Ownership
//!
//! Listings belong to their donator's email, requests to their requester's
//! email. Mutations compare the caller's verified email against the owner and
//! return `403` on mismatch.
//!
//! ## Consistency
//!
//! A listing is claimed with a conditional update (`available -> requested`)
//! in the same transaction that inserts the request, so two concurrent
//! requesters can never both win; the loser gets `409`. Request transitions
//! update the request and its listing in one transaction as well.

pub mod api;
pub mod cli;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod model;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
