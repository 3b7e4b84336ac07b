//! Time-boxed single-use access tokens.
//!
//! A token gates exactly one download of a dataset's consolidated
//! contents. Tokens carry `(dataset_id, expires_at, is_used)`; redeeming
//! checks expiry and single-use, then marks the token consumed. Payment
//! verification happens upstream; this layer only enforces the token
//! contract.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use weft_core::DatasetId;

use crate::error::{Result, StoreError};

/// A temporary, single-use grant to download one dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    /// Opaque token string handed to the client.
    pub token: String,
    /// The dataset this token unlocks.
    pub dataset_id: DatasetId,
    /// When the token stops being redeemable.
    pub expires_at: DateTime<Utc>,
    /// Whether the token has been redeemed.
    pub is_used: bool,
    /// When the token was redeemed, if it has been.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Returns whether this token's expiry has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Persistence contract for access tokens.
#[async_trait]
pub trait AccessTokenStore: Send + Sync + 'static {
    /// Persists a freshly issued token.
    async fn create(&self, token: AccessToken) -> Result<()>;

    /// Looks a token up by its string.
    async fn find(&self, token: &str) -> Result<Option<AccessToken>>;

    /// Marks a token redeemed at the given time.
    async fn mark_used(&self, token: &str, used_at: DateTime<Utc>) -> Result<()>;

    /// Removes expired tokens; returns how many were purged.
    async fn purge_expired(&self) -> Result<usize>;
}

/// In-memory token store for testing and debug deployments.
#[derive(Debug, Default)]
pub struct MemoryAccessTokenStore {
    tokens: Arc<RwLock<HashMap<String, AccessToken>>>,
}

impl MemoryAccessTokenStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn write_lock(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, AccessToken>>> {
        self.tokens.write().map_err(|_| StoreError::Persistence {
            message: "token lock poisoned".into(),
        })
    }
}

#[async_trait]
impl AccessTokenStore for MemoryAccessTokenStore {
    async fn create(&self, token: AccessToken) -> Result<()> {
        self.write_lock()?.insert(token.token.clone(), token);
        Ok(())
    }

    async fn find(&self, token: &str) -> Result<Option<AccessToken>> {
        Ok(self
            .tokens
            .read()
            .map_err(|_| StoreError::Persistence {
                message: "token lock poisoned".into(),
            })?
            .get(token)
            .cloned())
    }

    async fn mark_used(&self, token: &str, used_at: DateTime<Utc>) -> Result<()> {
        let mut tokens = self.write_lock()?;
        if let Some(entry) = tokens.get_mut(token) {
            entry.is_used = true;
            entry.used_at = Some(used_at);
        }
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let mut tokens = self.write_lock()?;
        let before = tokens.len();
        tokens.retain(|_, t| !t.is_expired());
        Ok(before - tokens.len())
    }
}

/// Issues and redeems dataset access tokens.
pub struct AccessIssuer {
    store: Arc<dyn AccessTokenStore>,
    ttl: Duration,
}

impl AccessIssuer {
    /// Creates an issuer with the given token time-to-live.
    #[must_use]
    pub fn new(store: Arc<dyn AccessTokenStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Issues a new single-use token for a dataset.
    pub async fn issue(&self, dataset_id: DatasetId) -> Result<AccessToken> {
        let now = Utc::now();
        let token = AccessToken {
            token: Ulid::new().to_string(),
            dataset_id,
            expires_at: now
                + chrono::Duration::from_std(self.ttl)
                    .unwrap_or_else(|_| chrono::Duration::minutes(15)),
            is_used: false,
            used_at: None,
        };
        self.store.create(token.clone()).await?;
        tracing::info!(
            dataset_id = %dataset_id,
            expires_at = %token.expires_at,
            "issued access token"
        );
        Ok(token)
    }

    /// Redeems a token for one download of the given dataset.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for an unknown token or a
    /// dataset mismatch, `StoreError::TokenExpired` past expiry, and
    /// `StoreError::TokenUsed` if it was already redeemed.
    pub async fn redeem(&self, dataset_id: &DatasetId, token: &str) -> Result<()> {
        let grant = self
            .store
            .find(token)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                message: "access token".into(),
            })?;

        if &grant.dataset_id != dataset_id {
            // Don't leak which dataset the token actually belongs to.
            return Err(StoreError::NotFound {
                message: "access token".into(),
            });
        }
        if grant.is_expired() {
            return Err(StoreError::TokenExpired {
                message: format!("expired at {}", grant.expires_at),
            });
        }
        if grant.is_used {
            return Err(StoreError::TokenUsed {
                message: format!(
                    "used at {}",
                    grant
                        .used_at
                        .map_or_else(|| "unknown time".to_string(), |t| t.to_string())
                ),
            });
        }

        self.store.mark_used(token, Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer(ttl: Duration) -> AccessIssuer {
        AccessIssuer::new(Arc::new(MemoryAccessTokenStore::new()), ttl)
    }

    #[tokio::test]
    async fn token_redeems_exactly_once() {
        let issuer = issuer(Duration::from_secs(60));
        let dataset_id = DatasetId::generate();
        let token = issuer.issue(dataset_id).await.expect("issue");

        issuer
            .redeem(&dataset_id, &token.token)
            .await
            .expect("first redeem");

        let err = issuer.redeem(&dataset_id, &token.token).await.unwrap_err();
        assert!(matches!(err, StoreError::TokenUsed { .. }));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let issuer = issuer(Duration::ZERO);
        let dataset_id = DatasetId::generate();
        let token = issuer.issue(dataset_id).await.expect("issue");

        let err = issuer.redeem(&dataset_id, &token.token).await.unwrap_err();
        assert!(matches!(err, StoreError::TokenExpired { .. }));
    }

    #[tokio::test]
    async fn token_is_bound_to_its_dataset() {
        let issuer = issuer(Duration::from_secs(60));
        let token = issuer.issue(DatasetId::generate()).await.expect("issue");

        let err = issuer
            .redeem(&DatasetId::generate(), &token.token)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let issuer = issuer(Duration::from_secs(60));
        let err = issuer
            .redeem(&DatasetId::generate(), "nope")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn purge_removes_only_expired_tokens() {
        let store = Arc::new(MemoryAccessTokenStore::new());
        let short = AccessIssuer::new(store.clone(), Duration::ZERO);
        let long = AccessIssuer::new(store.clone(), Duration::from_secs(60));

        short.issue(DatasetId::generate()).await.expect("issue");
        let live = long.issue(DatasetId::generate()).await.expect("issue");

        let purged = store.purge_expired().await.expect("purge");
        assert_eq!(purged, 1);
        assert!(store.find(&live.token).await.expect("find").is_some());
    }
}
