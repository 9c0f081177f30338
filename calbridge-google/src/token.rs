//! Gets new access tokens from Google's OAuth token endpoint.

use async_trait::async_trait;
use calbridge_core::{CredentialError, CredentialRecord, TokenGrant, TokenSource};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::keys::ServiceAccountKey;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Google caps service-account assertions at one hour.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

pub struct GoogleTokenSource {
    http: reqwest::Client,
    service_account: Option<ServiceAccountKey>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(crate) struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

impl GoogleTokenSource {
    pub fn new(http: reqwest::Client, service_account: Option<ServiceAccountKey>) -> Self {
        GoogleTokenSource {
            http,
            service_account,
        }
    }

    async fn request_token(
        &self,
        token_uri: &str,
        form: &[(&str, &str)],
    ) -> Result<TokenGrant, CredentialError> {
        let response = self
            .http
            .post(token_uri)
            .form(form)
            .send()
            .await
            .map_err(|e| CredentialError::RefreshFailed(format!("request to {token_uri} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::RefreshFailed(describe_token_error(
                status.as_u16(),
                &body,
            )));
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            CredentialError::RefreshFailed(format!("unreadable token response: {e}"))
        })?;

        Ok(TokenGrant {
            access_token: body.access_token,
            expires_in: body.expires_in,
            refresh_token: body.refresh_token,
        })
    }
}

#[async_trait]
impl TokenSource for GoogleTokenSource {
    async fn refresh(&self, record: &CredentialRecord) -> Result<TokenGrant, CredentialError> {
        let refresh_token = record.refresh_token.as_deref().ok_or_else(|| {
            CredentialError::Unrecoverable("no refresh token stored".to_string())
        })?;

        self.request_token(
            &record.token_uri,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", record.client_id.as_str()),
                ("client_secret", record.client_secret.as_str()),
            ],
        )
        .await
    }

    async fn mint(&self, record: &CredentialRecord) -> Result<TokenGrant, CredentialError> {
        let key = self.service_account.as_ref().ok_or_else(|| {
            CredentialError::RefreshFailed("no service-account key configured".to_string())
        })?;

        let scopes: Vec<&str> = record.scopes.iter().map(String::as_str).collect();
        let claims = assertion_claims(key, &scopes, &record.token_uri, Utc::now().timestamp());
        let assertion = sign_assertion(key, &claims)?;

        self.request_token(
            &record.token_uri,
            &[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())],
        )
        .await
    }
}

pub(crate) fn assertion_claims(
    key: &ServiceAccountKey,
    scopes: &[&str],
    audience: &str,
    now: i64,
) -> AssertionClaims {
    AssertionClaims {
        iss: key.client_email.clone(),
        scope: scopes.join(" "),
        aud: audience.to_string(),
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    }
}

fn sign_assertion(
    key: &ServiceAccountKey,
    claims: &AssertionClaims,
) -> Result<String, CredentialError> {
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
        CredentialError::RefreshFailed(format!("invalid service-account private key: {e}"))
    })?;

    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    jsonwebtoken::encode(&header, claims, &encoding_key)
        .map_err(|e| CredentialError::RefreshFailed(format!("failed to sign assertion: {e}")))
}

/// Google answers token errors with `{"error": "...", "error_description": "..."}`.
fn describe_token_error(status: u16, body: &str) -> String {
    match serde_json::from_str::<TokenErrorBody>(body) {
        Ok(TokenErrorBody {
            error,
            error_description: Some(description),
        }) => format!("token endpoint returned {status}: {error} ({description})"),
        Ok(TokenErrorBody { error, .. }) => format!("token endpoint returned {status}: {error}"),
        Err(_) if body.trim().is_empty() => format!("token endpoint returned {status}"),
        Err(_) => format!("token endpoint returned {status}: {}", body.trim()),
    }
}
