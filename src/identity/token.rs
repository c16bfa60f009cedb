//! RS256 ID-token signing and verification.
//!
//! Verification checks the signature against a JWKS first and only then looks
//! at the claims: issuer `https://securetoken.google.com/<project>`, audience
//! `<project>`, a non-empty subject, an unexpired `exp` and an `iat` that is not
//! in the future beyond the allowed clock skew.

use super::jwks::{decode_private_key, Jwks};
use base64ct::{Base64UrlUnpadded, Encoding};
use rsa::errors::Error as RsaError;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

pub const ISSUER_PREFIX: &str = "https://securetoken.google.com/";
pub const CLOCK_SKEW_SECONDS: i64 = 60;
const MAX_SUBJECT_LEN: usize = 128;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdTokenHeader {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    pub kid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdTokenClaims {
    pub iss: String,
    pub aud: String,
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("unknown key id: {0}")]
    UnknownKid(String),
    #[error("failed to parse RSA key")]
    KeyParse,
    #[error("rsa error")]
    Rsa(#[from] RsaError),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token issued in the future")]
    IssuedInFuture,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("invalid audience")]
    InvalidAudience,
    #[error("invalid subject")]
    InvalidSubject,
}

/// Expected `iss` claim for a project.
#[must_use]
pub fn issuer_for(project_id: &str) -> String {
    format!("{ISSUER_PREFIX}{project_id}")
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Create an RS256 signed ID token.
///
/// Local tooling and tests use this to mint tokens that [`verify_rs256`]
/// accepts when paired with the matching JWKS.
///
/// # Errors
///
/// Returns an error if the private key cannot be parsed or the header/claims
/// cannot be encoded.
pub fn sign_rs256(
    private_key_pem_or_der: &[u8],
    kid: impl Into<String>,
    claims: &IdTokenClaims,
) -> Result<String, TokenError> {
    let header = IdTokenHeader {
        alg: "RS256".to_string(),
        typ: Some("JWT".to_string()),
        kid: kid.into(),
    };
    let signing_input = format!("{}.{}", b64e_json(&header)?, b64e_json(claims)?);

    let private_key = decode_private_key(private_key_pem_or_der)?;
    let signing_key = SigningKey::<Sha256>::new(private_key);
    let signature: Signature = signing_key.sign(signing_input.as_bytes());
    let signature_b64 = Base64UrlUnpadded::encode_string(&signature.to_vec());

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify an RS256 ID token and return its decoded claims.
///
/// # Errors
///
/// Returns an error if:
/// - the token is malformed or contains invalid base64/json,
/// - the `kid` is unknown for the provided JWKS,
/// - the signature is invalid,
/// - the claims fail validation (`iss`, `aud`, `sub`, `exp`, `iat`).
pub fn verify_rs256(
    token: &str,
    jwks: &Jwks,
    project_id: &str,
    now_unix_seconds: i64,
) -> Result<IdTokenClaims, TokenError> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
    if parts.next().is_some() {
        return Err(TokenError::TokenFormat);
    }

    let header: IdTokenHeader = b64d_json(header_b64)?;
    if header.alg != "RS256" {
        return Err(TokenError::UnsupportedAlg(header.alg));
    }

    let jwk = jwks
        .find_by_kid(&header.kid)
        .ok_or_else(|| TokenError::UnknownKid(header.kid.clone()))?;

    let verifying_key = VerifyingKey::<Sha256>::new(jwk.to_rsa_public_key()?);
    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature_bytes = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| TokenError::Base64)?;
    let signature = Signature::try_from(signature_bytes.as_slice())
        .map_err(|_| TokenError::InvalidSignature)?;
    verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| TokenError::InvalidSignature)?;

    let claims: IdTokenClaims = b64d_json(claims_b64)?;
    if claims.iss != issuer_for(project_id) {
        return Err(TokenError::InvalidIssuer);
    }
    if claims.aud != project_id {
        return Err(TokenError::InvalidAudience);
    }
    if claims.sub.is_empty() || claims.sub.len() > MAX_SUBJECT_LEN {
        return Err(TokenError::InvalidSubject);
    }
    if claims.exp <= now_unix_seconds {
        return Err(TokenError::Expired);
    }
    let latest = now_unix_seconds + CLOCK_SKEW_SECONDS;
    if claims.iat > latest || claims.auth_time.is_some_and(|auth_time| auth_time > latest) {
        return Err(TokenError::IssuedInFuture);
    }

    Ok(claims)
}
