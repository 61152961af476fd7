//! Redis-backed result cache
//!
//! Caches analysis results keyed by a SHA-256 hash of the canonical request
//! payload (structured data plus notes; the request id is deliberately
//! excluded so identical payloads share an entry). The cache is a
//! collaborator of the handlers, not of the router: the router stays
//! cache-agnostic, and a cache outage degrades to a miss, never to a failed
//! request.

use crate::providers::{AnalysisRequest, AnalysisResult};
use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;

/// Cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// Redis connection or command error
    #[error("cache backend: {0}")]
    Backend(String),
    /// Serialization error
    #[error("serialization: {0}")]
    Serialization(String),
}

/// Compute the cache key for a request.
///
/// Hashes the serialized structured data and each note with length framing,
/// so `["ab"]` and `["a", "b"]` produce different keys.
pub fn cache_key(request: &AnalysisRequest) -> String {
    let mut hasher = Sha256::new();
    let payload = request.structured_data.to_string();
    hasher.update((payload.len() as u64).to_be_bytes());
    hasher.update(payload.as_bytes());
    for note in &request.notes {
        hasher.update((note.len() as u64).to_be_bytes());
        hasher.update(note.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Analysis result cache backed by Redis
#[derive(Clone, Debug)]
pub struct ResultCache {
    client: redis::Client,
    default_ttl: Duration,
    key_prefix: String,
}

impl ResultCache {
    /// Create a new result cache
    ///
    /// # Errors
    ///
    /// Returns an error if the Redis URL is invalid.
    pub fn new(url: &str, default_ttl: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)
            .map_err(|e| CacheError::Backend(format!("invalid URL: {}", e)))?;

        Ok(Self {
            client,
            default_ttl,
            key_prefix: "thriftroute:result".to_string(),
        })
    }

    /// Look up a cached result by request hash
    ///
    /// # Errors
    ///
    /// Returns an error on connection or deserialization failure. Callers
    /// treat errors as misses.
    pub async fn get(&self, key: &str) -> Result<Option<AnalysisResult>, CacheError> {
        use redis::AsyncCommands;

        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::Backend(format!("connection failed: {}", e)))?;

        let full_key = format!("{}:{}", self.key_prefix, key);
        let data: Option<String> = conn
            .get(&full_key)
            .await
            .map_err(|e| CacheError::Backend(format!("GET failed: {}", e)))?;

        match data {
            Some(raw) => {
                let result: AnalysisResult = serde_json::from_str(&raw)
                    .map_err(|e| CacheError::Serialization(format!("deserialize: {}", e)))?;
                tracing::debug!(cache_key = key, "cache hit");
                Ok(Some(result))
            }
            None => {
                tracing::debug!(cache_key = key, "cache miss");
                Ok(None)
            }
        }
    }

    /// Store a result with the default TTL
    ///
    /// # Errors
    ///
    /// Returns an error on connection or serialization failure.
    pub async fn set(&self, key: &str, result: &AnalysisResult) -> Result<(), CacheError> {
        use redis::AsyncCommands;

        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::Backend(format!("connection failed: {}", e)))?;

        let full_key = format!("{}:{}", self.key_prefix, key);
        let data = serde_json::to_string(result)
            .map_err(|e| CacheError::Serialization(format!("serialize: {}", e)))?;

        let ttl_secs = self.default_ttl.as_secs();
        let _: () = conn
            .set_ex(&full_key, &data, ttl_secs)
            .await
            .map_err(|e| CacheError::Backend(format!("SET failed: {}", e)))?;

        tracing::debug!(cache_key = key, ttl_secs, "cached analysis result");
        Ok(())
    }
}
