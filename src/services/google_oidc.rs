// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google ID token verification for sign-in.
//!
//! Signing keys come from Google's published certificate set and are cached
//! for as long as its `Cache-Control: max-age` allows. A token signed with a
//! key we have not seen forces one refetch, since Google rotates keys.

use crate::config::Config;
use anyhow::Context;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};

const GOOGLE_CERTS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const GOOGLE_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const FALLBACK_KEYS_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;

/// Identity extracted from a valid Google ID token.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    /// Stable Google account ID; used as the user document ID
    pub subject: String,
    pub name: Option<String>,
}

/// Sign-in token verification failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OidcError {
    /// The token is malformed, badly signed, or for someone else.
    #[error("rejected ID token: {0}")]
    Rejected(String),
    /// Google's keys could not be fetched; sign-in may be retried.
    #[error("transient OIDC failure: {0}")]
    Transient(String),
}

struct SigningKeys {
    by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Verifier for Google-issued sign-in ID tokens.
pub struct GoogleOidcVerifier {
    http_client: reqwest::Client,
    client_id: String,
    keys: RwLock<Option<SigningKeys>>,
    refresh_lock: Mutex<()>,
}

impl GoogleOidcVerifier {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client_id = config.google_client_id.trim().to_string();
        if client_id.is_empty() {
            anyhow::bail!("Google client ID must not be empty");
        }

        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed building OIDC HTTP client")?;

        tracing::info!(client_id = %client_id, "Initialized Google sign-in verifier");

        Ok(Self {
            http_client,
            client_id,
            keys: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Verify a Google ID token obtained by the client's sign-in popup.
    pub async fn verify_id_token(&self, token: &str) -> Result<VerifiedIdentity, OidcError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(OidcError::Rejected("ID token is empty".to_string()));
        }

        let header = decode_header(token)
            .map_err(|e| OidcError::Rejected(format!("invalid JWT header: {e}")))?;
        if header.alg != Algorithm::RS256 {
            return Err(OidcError::Rejected(format!(
                "unexpected JWT alg: {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| OidcError::Rejected("missing JWT kid".to_string()))?;

        let key = self.signing_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let claims = decode::<GoogleIdTokenClaims>(token, key.as_ref(), &validation)
            .map_err(|e| OidcError::Rejected(format!("JWT validation failed: {e}")))?
            .claims;

        if claims.iat.is_some_and(|iat| iat > now_unix_secs() + CLOCK_SKEW_SECS) {
            return Err(OidcError::Rejected("iat claim is in the future".to_string()));
        }
        if claims.sub.trim().is_empty() {
            return Err(OidcError::Rejected("empty sub claim".to_string()));
        }
        if claims.email_verified == Some(false) {
            return Err(OidcError::Rejected("email is not verified".to_string()));
        }

        tracing::debug!(subject = %claims.sub, "Google ID token verified");

        Ok(VerifiedIdentity {
            subject: claims.sub,
            name: claims.name,
        })
    }

    async fn signing_key(&self, kid: &str) -> Result<Arc<DecodingKey>, OidcError> {
        if let Some(key) = self.cached_key(kid).await {
            return Ok(key);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another request may have refreshed while we waited.
        if let Some(key) = self.cached_key(kid).await {
            return Ok(key);
        }

        let fresh = self.fetch_keys().await?;
        let key = fresh.by_kid.get(kid).cloned();
        *self.keys.write().await = Some(fresh);

        key.ok_or_else(|| OidcError::Rejected(format!("unknown JWT kid: {kid}")))
    }

    async fn cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let keys = self.keys.read().await;
        keys.as_ref()
            .filter(|k| k.expires_at > Instant::now())
            .and_then(|k| k.by_kid.get(kid))
            .cloned()
    }

    async fn fetch_keys(&self) -> Result<SigningKeys, OidcError> {
        let response = self
            .http_client
            .get(GOOGLE_CERTS_URL)
            .send()
            .await
            .map_err(|e| OidcError::Transient(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(OidcError::Transient(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(max_age)
            .map(Duration::from_secs)
            .unwrap_or(FALLBACK_KEYS_TTL);

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| OidcError::Transient(format!("invalid JWKS JSON: {e}")))?;

        let by_kid: HashMap<_, _> = jwks
            .keys
            .into_iter()
            .filter(|jwk| jwk.kty == "RSA" && jwk.alg.as_deref().unwrap_or("RS256") == "RS256")
            .filter_map(|jwk| match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => Some((jwk.kid, Arc::new(key))),
                Err(e) => {
                    tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA key");
                    None
                }
            })
            .collect();

        if by_kid.is_empty() {
            return Err(OidcError::Transient(
                "JWKS response had no usable RSA keys".to_string(),
            ));
        }

        tracing::debug!(keys = by_kid.len(), ttl_secs = ttl.as_secs(), "Fetched Google signing keys");
        Ok(SigningKeys {
            by_kid,
            expires_at: Instant::now() + ttl,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct GoogleIdTokenClaims {
    sub: String,
    iat: Option<u64>,
    email_verified: Option<bool>,
    name: Option<String>,
}

/// `max-age` seconds from a `Cache-Control` value.
fn max_age(cache_control: &str) -> Option<u64> {
    cache_control
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|raw| raw.trim_matches('"').parse().ok())
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
