//! JWKS fetching, caching and identity-token verification.

use crate::error::LinkerError;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

enum Lookup {
    Hit(Jwk),
    /// The set was fetched too recently to justify another round trip.
    Throttled,
    Refetch,
}

/// Verifies RS256 identity tokens against a provider's published key set.
///
/// Keys are cached for `ttl`. A `kid` missing from the cached set triggers one
/// refetch, which covers provider key rotation, unless the set is younger than
/// `min_refetch_interval`.
pub struct JwksVerifier {
    http: reqwest::Client,
    jwks_url: Url,
    issuer: String,
    audience: String,
    ttl: Duration,
    min_refetch_interval: Duration,
    cache: RwLock<Option<CachedKeys>>,
}

impl JwksVerifier {
    pub fn new(
        http: reqwest::Client,
        jwks_url: Url,
        issuer: String,
        audience: String,
        ttl: Duration,
        min_refetch_interval: Duration,
    ) -> Self {
        Self {
            http,
            jwks_url,
            issuer,
            audience,
            ttl,
            min_refetch_interval,
            cache: RwLock::new(None),
        }
    }

    /// Verify `token` and deserialize its claims.
    pub async fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T, LinkerError> {
        let header = decode_header(token)?;
        let kid = header.kid.ok_or_else(|| LinkerError::KeyNotFound {
            kid: "missing".to_string(),
        })?;
        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.validate_exp = true;
        validation.leeway = 60;

        let data = decode::<T>(token, &key, &validation)?;
        debug!(kid = %kid, "identity token verified");
        Ok(data.claims)
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, LinkerError> {
        match self.lookup(kid).await {
            Lookup::Hit(jwk) => return Ok(DecodingKey::from_jwk(&jwk)?),
            Lookup::Throttled => {
                warn!(kid = %kid, "unknown kid; JWKS refetch skipped, set is fresh");
                return Err(LinkerError::KeyNotFound {
                    kid: kid.to_string(),
                });
            }
            Lookup::Refetch => {}
        }

        let keys = self.refresh().await?;
        let jwk = keys.find(kid).ok_or_else(|| LinkerError::KeyNotFound {
            kid: kid.to_string(),
        })?;
        Ok(DecodingKey::from_jwk(jwk)?)
    }

    async fn lookup(&self, kid: &str) -> Lookup {
        let cache = self.cache.read().await;
        let Some(cached) = cache.as_ref() else {
            return Lookup::Refetch;
        };
        let age = cached.fetched_at.elapsed();
        if age >= self.ttl {
            return Lookup::Refetch;
        }
        match cached.keys.find(kid) {
            Some(jwk) => Lookup::Hit(jwk.clone()),
            None if age < self.min_refetch_interval => Lookup::Throttled,
            None => Lookup::Refetch,
        }
    }

    async fn refresh(&self) -> Result<JwkSet, LinkerError> {
        let keys: JwkSet = self
            .http
            .get(self.jwks_url.clone())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        info!(url = %self.jwks_url, count = keys.keys.len(), "Fetched JWKS");

        let mut cache = self.cache.write().await;
        *cache = Some(CachedKeys {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });
        Ok(keys)
    }
}
