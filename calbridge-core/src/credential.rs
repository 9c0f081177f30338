//! The authorization grant used to call the calendar API.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CredentialError, StoreError};

/// The only scope calbridge needs (calendar read/write).
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens expiring within this window are treated as already expired, so a
/// token is never handed out just before the API would reject it.
pub const SAFETY_MARGIN: Duration = Duration::seconds(10);

/// How a record gets a new access token once the current one expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantKind {
    /// OAuth user consent; refreshed with the stored refresh token.
    #[default]
    #[serde(rename = "authorized_user")]
    UserConsent,
    /// Minted from service-account key material; no refresh token needed.
    ServiceAccount,
}

/// Where a record was loaded from, and where refreshes are written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backing {
    Environment,
    File,
}

impl fmt::Display for Backing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backing::Environment => write!(f, "environment"),
            Backing::File => write!(f, "file"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
    pub scopes: BTreeSet<String>,
    pub kind: GrantKind,
    pub origin: Backing,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
}

/// A new access token issued by the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    /// Lifetime in seconds; zero or negative means unknown.
    pub expires_in: i64,
    /// Google usually omits this on refresh.
    pub refresh_token: Option<String>,
}

impl CredentialRecord {
    /// A service-account record that has never been minted.
    pub fn unminted_service_account(token_uri: impl Into<String>, origin: Backing) -> Self {
        CredentialRecord {
            access_token: String::new(),
            refresh_token: None,
            expiry: None,
            scopes: BTreeSet::from([CALENDAR_SCOPE.to_string()]),
            kind: GrantKind::ServiceAccount,
            origin,
            token_uri: token_uri.into(),
            client_id: String::new(),
            client_secret: String::new(),
        }
    }

    /// Whether the access token can be used at `now`.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expiry {
            Some(expiry) => expiry - SAFETY_MARGIN > now,
            None => true,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }

    /// Copy of this record carrying the newly issued token.
    ///
    /// A non-positive `expires_in` leaves the expiry unknown; one too large
    /// to represent is rejected.
    pub fn with_grant(
        &self,
        grant: TokenGrant,
        now: DateTime<Utc>,
    ) -> Result<Self, CredentialError> {
        let expiry = if grant.expires_in > 0 {
            let expiry = Duration::try_seconds(grant.expires_in)
                .and_then(|lifetime| now.checked_add_signed(lifetime))
                .ok_or_else(|| {
                    CredentialError::RefreshFailed(format!(
                        "token endpoint returned out-of-range expires_in: {}",
                        grant.expires_in
                    ))
                })?;
            Some(expiry)
        } else {
            None
        };

        let mut next = self.clone();
        next.access_token = grant.access_token;
        next.expiry = expiry;
        if let Some(refresh_token) = grant.refresh_token.filter(|t| !t.is_empty()) {
            next.refresh_token = Some(refresh_token);
        }
        Ok(next)
    }

    pub fn from_stored(stored: StoredCredential, origin: Backing) -> Result<Self, StoreError> {
        let mut scopes: BTreeSet<String> = stored.scopes.into_iter().collect();
        if scopes.is_empty() {
            scopes.insert(CALENDAR_SCOPE.to_string());
        } else if !scopes.contains(CALENDAR_SCOPE) {
            return Err(StoreError::MissingScope {
                backing: origin,
                required: CALENDAR_SCOPE,
            });
        }

        Ok(CredentialRecord {
            access_token: stored.token,
            refresh_token: stored.refresh_token.filter(|t| !t.is_empty()),
            expiry: stored.expiry,
            scopes,
            kind: stored.kind,
            origin,
            token_uri: stored.token_uri,
            client_id: stored.client_id,
            client_secret: stored.client_secret,
        })
    }

    pub fn to_stored(&self) -> StoredCredential {
        StoredCredential {
            token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            token_uri: self.token_uri.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            scopes: self.scopes.iter().cloned().collect(),
            expiry: self.expiry,
            kind: self.kind,
        }
    }

    /// Parse the persisted JSON layout.
    pub fn from_json(json: &str, origin: Backing) -> Result<Self, StoreError> {
        let stored: StoredCredential = serde_json::from_str(json).map_err(|source| {
            StoreError::Parse {
                backing: origin,
                source,
            }
        })?;
        Self::from_stored(stored, origin)
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        serde_json::to_string(&self.to_stored()).map_err(StoreError::Serialize)
    }

    pub fn to_json_pretty(&self) -> Result<String, StoreError> {
        serde_json::to_string_pretty(&self.to_stored()).map_err(StoreError::Serialize)
    }
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// On-disk / in-env layout of a credential. Compatible with the
/// `authorized_user` JSON written by Google's client libraries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    #[serde(default)]
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default, rename = "type")]
    pub kind: GrantKind,
}
