//! Hands out a valid access token, refreshing it at most once at a time.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::credential::{CredentialRecord, GrantKind, TokenGrant};
use crate::error::{CredentialError, StoreError};
use crate::store::CredentialStore;

/// Talks to the OAuth token endpoint.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Exchange the record's refresh token for a new access token.
    async fn refresh(&self, record: &CredentialRecord) -> Result<TokenGrant, CredentialError>;

    /// Mint a new access token from service-account key material.
    async fn mint(&self, record: &CredentialRecord) -> Result<TokenGrant, CredentialError>;
}

pub struct CredentialManager {
    current: RwLock<CredentialRecord>,
    refresh_lock: Mutex<()>,
    store: Arc<dyn CredentialStore>,
    tokens: Arc<dyn TokenSource>,
}

impl CredentialManager {
    /// `store` must be the backing the record was loaded from.
    pub fn new(
        record: CredentialRecord,
        store: Arc<dyn CredentialStore>,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self, StoreError> {
        if record.origin != store.backing() {
            return Err(StoreError::WrongBacking {
                record: record.origin,
                store: store.backing(),
            });
        }

        Ok(CredentialManager {
            current: RwLock::new(record),
            refresh_lock: Mutex::new(()),
            store,
            tokens,
        })
    }

    /// Snapshot of the record as it is right now, fresh or not.
    pub async fn current(&self) -> CredentialRecord {
        self.current.read().await.clone()
    }

    /// Return a record whose access token is valid right now.
    ///
    /// Concurrent callers that all find the token expired wait on a single
    /// refresh and then share its result.
    pub async fn acquire(&self) -> Result<CredentialRecord, CredentialError> {
        {
            let record = self.current.read().await;
            if record.is_fresh() {
                tracing::debug!("Using cached access token");
                return Ok(record.clone());
            }
        }

        let _guard = self.refresh_lock.lock().await;

        // Someone else may have refreshed while we waited
        let record = self.current.read().await.clone();
        if record.is_fresh() {
            return Ok(record);
        }

        let grant = match record.kind {
            GrantKind::ServiceAccount => {
                tracing::info!("Minting service-account access token");
                self.tokens.mint(&record).await?
            }
            GrantKind::UserConsent => {
                if record.refresh_token.is_none() {
                    return Err(CredentialError::Unrecoverable(
                        "access token expired and no refresh token is stored; \
                         a new consent grant is required"
                            .to_string(),
                    ));
                }
                tracing::info!("Access token expired, refreshing");
                self.tokens.refresh(&record).await?
            }
        };

        let refreshed = record.with_grant(grant, Utc::now())?;
        self.persist(&refreshed).await?;
        *self.current.write().await = refreshed.clone();

        tracing::info!(
            backing = %refreshed.origin,
            expiry = ?refreshed.expiry,
            "Access token refreshed"
        );

        Ok(refreshed)
    }

    /// Runs the store's blocking write off the async workers.
    async fn persist(&self, record: &CredentialRecord) -> Result<(), StoreError> {
        let store = Arc::clone(&self.store);
        let record = record.clone();
        tokio::task::spawn_blocking(move || store.save(&record))
            .await
            .map_err(|e| StoreError::Interrupted(e.to_string()))?
    }
}
