// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use jsonwebtoken::jwk::JwkSet;
use tokio::sync::{Mutex, RwLock};
use url::Url;

use crate::error::JwksError;

/// Biggest key set we accept from a remote endpoint
const MAX_JWKS_SIZE: usize = 512 * 1024;

/// How long a fetched key set is reused by default
pub(crate) const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

/// Minimum time between two fetches of the same key set, by default
pub(crate) const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct CachedJwks {
    jwks: Arc<JwkSet>,
    fetched_at: Instant,
}

/// A cache of remote JSON Web Key Sets, keyed by their URI
#[derive(Debug)]
pub struct JwksCache {
    client: reqwest::Client,
    ttl: Duration,
    min_refresh_interval: Duration,
    entries: RwLock<HashMap<Url, CachedJwks>>,
    refresh_lock: Mutex<()>,
}

impl JwksCache {
    /// Create a new cache using the given HTTP client
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            ttl: DEFAULT_TTL,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            entries: RwLock::new(HashMap::new()),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Set how long a fetched key set is reused
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the minimum time between two forced refreshes of the same key set
    #[must_use]
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    async fn cached(&self, uri: &Url, max_age: Duration) -> Option<Arc<JwkSet>> {
        let entries = self.entries.read().await;
        entries
            .get(uri)
            .filter(|entry| entry.fetched_at.elapsed() < max_age)
            .map(|entry| Arc::clone(&entry.jwks))
    }

    /// Get the key set at `uri`, fetching it if it is not cached or expired
    ///
    /// # Errors
    ///
    /// Returns an error if the key set had to be fetched and the fetch failed
    pub async fn get(&self, uri: &Url) -> Result<Arc<JwkSet>, JwksError> {
        if let Some(jwks) = self.cached(uri, self.ttl).await {
            return Ok(jwks);
        }

        self.fetch_and_store(uri).await
    }

    /// Fetch the key set at `uri` again, to pick up rotated keys
    ///
    /// The cached entry is returned as-is if it was fetched less than the
    /// minimum refresh interval ago, so that tokens with unknown key IDs
    /// cannot make us hit the provider on every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch failed. The previous entry is kept as-is
    /// in that case.
    pub async fn refresh(&self, uri: &Url) -> Result<Arc<JwkSet>, JwksError> {
        // Concurrent refreshes wait for the first one and reuse its result
        let _guard = self.refresh_lock.lock().await;

        if let Some(jwks) = self.cached(uri, self.min_refresh_interval).await {
            tracing::debug!(jwks_uri = %uri, "JWKS was fetched recently, not refreshing");
            return Ok(jwks);
        }

        self.fetch_and_store(uri).await
    }

    #[tracing::instrument(name = "jwks.fetch", skip(self), fields(jwks_uri = %uri), err)]
    async fn fetch_and_store(&self, uri: &Url) -> Result<Arc<JwkSet>, JwksError> {
        let jwks = Arc::new(self.fetch(uri).await?);
        tracing::debug!(keys = jwks.keys.len(), "Fetched JWKS");

        self.entries.write().await.insert(
            uri.clone(),
            CachedJwks {
                jwks: Arc::clone(&jwks),
                fetched_at: Instant::now(),
            },
        );

        Ok(jwks)
    }

    async fn fetch(&self, uri: &Url) -> Result<JwkSet, JwksError> {
        let http_error = |source| JwksError::Http {
            uri: uri.clone(),
            source,
        };
        let too_large = |size| JwksError::TooLarge {
            uri: uri.clone(),
            size,
        };

        let mut response = self
            .client
            .get(uri.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(http_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(JwksError::Status {
                uri: uri.clone(),
                status,
            });
        }

        if let Some(size) = response.content_length() {
            let size = usize::try_from(size).unwrap_or(usize::MAX);
            if size > MAX_JWKS_SIZE {
                return Err(too_large(size));
            }
        }

        // The length header may be missing, so the limit is also enforced
        // while reading
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(http_error)? {
            if body.len() + chunk.len() > MAX_JWKS_SIZE {
                return Err(too_large(body.len() + chunk.len()));
            }
            body.extend_from_slice(&chunk);
        }

        serde_json::from_slice(&body).map_err(|source| JwksError::Parse {
            uri: uri.clone(),
            source,
        })
    }
}
