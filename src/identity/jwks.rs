use super::token::TokenError;
use base64ct::{Base64UrlUnpadded, Encoding};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};

/// JSON Web Key Set as published by the identity provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Parse a JWKS from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if `s` is not valid JSON or doesn't match the expected JWKS shape.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    #[must_use]
    pub fn find_by_kid(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Build a single-key JWKS whose public half is derived from a private key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be parsed.
    pub fn from_rsa_private_key_pem_or_der(
        private_key_pem_or_der: &[u8],
        kid: impl Into<String>,
    ) -> Result<Self, TokenError> {
        let private_key = decode_private_key(private_key_pem_or_der)?;
        let public_key = RsaPublicKey::from(&private_key);
        Ok(Self {
            keys: vec![Jwk::from_rsa_public_key(&public_key, kid)],
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    pub kty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    pub kid: String,
    pub n: String,
    pub e: String,
}

impl Jwk {
    #[must_use]
    pub fn from_rsa_public_key(public_key: &RsaPublicKey, kid: impl Into<String>) -> Self {
        Self {
            kty: "RSA".to_string(),
            alg: Some("RS256".to_string()),
            key_use: Some("sig".to_string()),
            kid: kid.into(),
            n: Base64UrlUnpadded::encode_string(&public_key.n().to_bytes_be()),
            e: Base64UrlUnpadded::encode_string(&public_key.e().to_bytes_be()),
        }
    }

    /// Convert this JWK to an `RsaPublicKey`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not RSA, the modulus or exponent is not
    /// valid base64url, or the resulting key is rejected.
    pub fn to_rsa_public_key(&self) -> Result<RsaPublicKey, TokenError> {
        if self.kty != "RSA" {
            return Err(TokenError::KeyParse);
        }
        let n_bytes = Base64UrlUnpadded::decode_vec(&self.n).map_err(|_| TokenError::Base64)?;
        let e_bytes = Base64UrlUnpadded::decode_vec(&self.e).map_err(|_| TokenError::Base64)?;
        let n = BigUint::from_bytes_be(&n_bytes);
        let e = BigUint::from_bytes_be(&e_bytes);
        RsaPublicKey::new(n, e).map_err(TokenError::Rsa)
    }
}

pub(crate) fn decode_private_key(pem_or_der: &[u8]) -> Result<RsaPrivateKey, TokenError> {
    if pem_or_der.starts_with(b"-----BEGIN") {
        let s = std::str::from_utf8(pem_or_der).map_err(|_| TokenError::KeyParse)?;
        return RsaPrivateKey::from_pkcs8_pem(s)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(s))
            .map_err(|_| TokenError::KeyParse);
    }

    RsaPrivateKey::from_pkcs8_der(pem_or_der)
        .or_else(|_| RsaPrivateKey::from_pkcs1_der(pem_or_der))
        .map_err(|_| TokenError::KeyParse)
}
