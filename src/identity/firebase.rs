//! Firebase ID-token verifier with a cached signing keyset.
//!
//! Keys come either from a static JWKS (tests, air-gapped setups) or from
//! Google's published JWKS. The remote keyset is cached for the `max-age` the
//! endpoint advertises, refreshed when stale or when a token names an unknown
//! `kid`, and kept as-is when a refresh fails so verification keeps working.

use super::{
    jwks::Jwks,
    token::{verify_rs256, IdTokenClaims, TokenError},
    AuthError, DependencyStatus, IdentityVerifier, VerifiedPrincipal,
};
use crate::model::normalize_email;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use reqwest::{header::CACHE_CONTROL, Client};
use serde::Deserialize;
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant, SystemTime},
};
use tokio::sync::RwLock;
use tracing::{debug, info, info_span, warn, Instrument};
use url::Url;

pub const DEFAULT_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

const KEYSET_CACHE_TTL_SECONDS: u64 = 3600;
const KEYSET_REFRESH_COOLDOWN_SECONDS: u64 = 30;

/// The parts of a service-account key file the verifier needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
    #[serde(default)]
    pub client_email: Option<String>,
}

impl ServiceAccount {
    /// Decode a base64 encoded service-account JSON document.
    ///
    /// # Errors
    /// Returns an error if the value is not base64 or not a service-account document.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let compact: String = encoded.split_whitespace().collect();
        let json = Base64::decode_vec(&compact)
            .map_err(|_| anyhow!("Firebase service key is not valid base64"))?;
        let account: Self =
            serde_json::from_slice(&json).context("Firebase service key is not valid JSON")?;
        if account.project_id.trim().is_empty() {
            return Err(anyhow!("Firebase service key has an empty project_id"));
        }
        Ok(account)
    }
}

#[derive(Debug)]
enum KeysetSource {
    Static,
    Remote { url: String, client: Client },
}

#[derive(Debug, Clone)]
struct KeysetCache {
    jwks: Jwks,
    fetched_at: Instant,
    ttl: Duration,
}

impl KeysetCache {
    fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() < self.ttl
    }
}

#[derive(Debug)]
pub struct FirebaseVerifier {
    keyset_source: KeysetSource,
    keyset_cache: RwLock<KeysetCache>,
    project_id: String,
    /// Unix time of the last refresh attempt; refreshes are at most one per cooldown.
    last_refresh_unix: AtomicU64,
}

impl FirebaseVerifier {
    /// Verifier over a fixed keyset that is never refreshed.
    #[must_use]
    pub fn new(jwks: Jwks, project_id: impl Into<String>) -> Self {
        Self {
            keyset_source: KeysetSource::Static,
            keyset_cache: RwLock::new(KeysetCache {
                jwks,
                fetched_at: Instant::now(),
                ttl: Duration::MAX,
            }),
            project_id: project_id.into(),
            last_refresh_unix: AtomicU64::new(0),
        }
    }

    /// Verifier that fetches its keyset from `url`.
    ///
    /// The first fetch is best-effort: when it fails the verifier starts with an
    /// empty, stale keyset and rejects every token until a refresh succeeds.
    ///
    /// # Errors
    /// Returns an error if the URL is not https or the HTTP client cannot be built.
    pub async fn new_remote(url: String, project_id: impl Into<String>) -> Result<Self> {
        let parsed = Url::parse(&url).context("Invalid JWKS URL")?;
        if parsed.scheme() != "https" {
            return Err(anyhow!("JWKS URL must use https: {url}"));
        }

        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build JWKS HTTP client")?;

        let (cache, last_refresh_unix) = match fetch_keyset(&client, &url).await {
            Ok((jwks, ttl)) => (
                KeysetCache {
                    jwks,
                    fetched_at: Instant::now(),
                    ttl,
                },
                now_unix_seconds_u64(),
            ),
            Err(err) => {
                warn!(
                    url = %url,
                    error = %err,
                    "JWKS fetch failed during startup; continuing with empty keyset"
                );
                (
                    KeysetCache {
                        jwks: Jwks::default(),
                        fetched_at: Instant::now(),
                        ttl: Duration::ZERO,
                    },
                    0,
                )
            }
        };

        Ok(Self {
            keyset_source: KeysetSource::Remote { url, client },
            keyset_cache: RwLock::new(cache),
            project_id: project_id.into(),
            last_refresh_unix: AtomicU64::new(last_refresh_unix),
        })
    }

    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    #[must_use]
    pub fn keyset_url(&self) -> Option<&str> {
        match &self.keyset_source {
            KeysetSource::Static => None,
            KeysetSource::Remote { url, .. } => Some(url.as_str()),
        }
    }

    /// Current keyset; refreshed first when stale, left unchanged if that fails.
    async fn keyset_snapshot(&self) -> Jwks {
        let (cached, fresh) = {
            let cache = self.keyset_cache.read().await;
            (cache.jwks.clone(), cache.is_fresh())
        };
        if fresh {
            return cached;
        }

        if let KeysetSource::Remote { url, .. } = &self.keyset_source {
            if !self.claim_refresh_slot() {
                debug!(url = %url, "JWKS cache stale; refresh suppressed by cooldown");
                return cached;
            }
            if let Err(err) = self.refresh_keyset().await {
                warn!(error = %err, url = %url, "failed to refresh JWKS cache");
                return cached;
            }
        }

        self.keyset_cache.read().await.jwks.clone()
    }

    /// `true` when no refresh was attempted within the cooldown; records this attempt.
    fn claim_refresh_slot(&self) -> bool {
        let now = now_unix_seconds_u64();
        let last = self.last_refresh_unix.load(Ordering::Relaxed);
        if !refresh_due(now, last) {
            return false;
        }
        self.last_refresh_unix
            .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }

    async fn refresh_keyset(&self) -> Result<()> {
        let KeysetSource::Remote { url, client } = &self.keyset_source else {
            return Ok(());
        };

        let (jwks, ttl) = fetch_keyset(client, url).await?;
        let mut cache = self.keyset_cache.write().await;
        cache.jwks = jwks;
        cache.fetched_at = Instant::now();
        cache.ttl = ttl;
        info!(
            keyset_keys = cache.jwks.keys.len(),
            ttl_seconds = ttl.as_secs(),
            "JWKS cache refreshed"
        );
        Ok(())
    }

    async fn refresh_on_unknown_kid(&self) -> Result<bool> {
        if matches!(&self.keyset_source, KeysetSource::Static) || !self.claim_refresh_slot() {
            return Ok(false);
        }
        self.refresh_keyset().await?;
        Ok(true)
    }

    async fn verify_claims(&self, token: &str) -> Result<IdTokenClaims, TokenError> {
        let jwks = self.keyset_snapshot().await;
        match verify_rs256(token, &jwks, &self.project_id, now_unix_seconds()) {
            Err(TokenError::UnknownKid(kid)) => match self.refresh_on_unknown_kid().await {
                Ok(true) => {
                    let jwks = self.keyset_snapshot().await;
                    verify_rs256(token, &jwks, &self.project_id, now_unix_seconds())
                }
                Ok(false) => {
                    debug!(kid = %kid, "token kid not found and refresh suppressed");
                    Err(TokenError::UnknownKid(kid))
                }
                Err(err) => {
                    warn!(kid = %kid, error = %err, "JWKS refresh on unknown kid failed");
                    Err(TokenError::UnknownKid(kid))
                }
            },
            other => other,
        }
    }
}

#[async_trait]
impl IdentityVerifier for FirebaseVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedPrincipal, AuthError> {
        let claims = self.verify_claims(token).await?;

        let email = claims
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|email| !email.is_empty())
            .ok_or(AuthError::MissingEmail)?;

        Ok(VerifiedPrincipal {
            subject: claims.sub,
            email,
            email_verified: claims.email_verified,
        })
    }

    async fn status(&self) -> DependencyStatus {
        match &self.keyset_source {
            KeysetSource::Static => DependencyStatus::Static,
            KeysetSource::Remote { url, .. } => {
                if self.keyset_cache.read().await.is_fresh() {
                    return DependencyStatus::Ok;
                }
                if !self.claim_refresh_slot() {
                    return DependencyStatus::Error;
                }
                match self.refresh_keyset().await {
                    Ok(()) => DependencyStatus::Ok,
                    Err(err) => {
                        warn!(error = %err, url = %url, "JWKS fetch failed during health check");
                        DependencyStatus::Error
                    }
                }
            }
        }
    }
}

fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

fn now_unix_seconds_u64() -> u64 {
    u64::try_from(now_unix_seconds()).unwrap_or(0)
}

fn refresh_due(now: u64, last_refresh: u64) -> bool {
    now.saturating_sub(last_refresh) >= KEYSET_REFRESH_COOLDOWN_SECONDS
}

/// `max-age` from a `Cache-Control` header value.
fn max_age(cache_control: &str) -> Option<Duration> {
    cache_control
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|seconds| seconds.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

async fn fetch_keyset(client: &Client, url: &str) -> Result<(Jwks, Duration)> {
    let span = info_span!("identity.jwks.fetch", http.method = "GET", url = %url);
    async {
        let response = client.get(url).send().await?;
        let status = response.status();
        let ttl = response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
            .and_then(max_age)
            .unwrap_or(Duration::from_secs(KEYSET_CACHE_TTL_SECONDS));
        let body = response.text().await?;

        if !status.is_success() {
            return Err(anyhow!("JWKS fetch failed: {status}"));
        }

        let jwks = Jwks::from_json(&body).context("Invalid JWKS JSON")?;
        if jwks.is_empty() {
            return Err(anyhow!("JWKS contains no keys"));
        }
        Ok((jwks, ttl))
    }
    .instrument(span)
    .await
}
