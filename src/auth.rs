//! Service account authorisation.
//!
//! A JWT assertion naming the account and its scopes is signed with the
//! account's RSA key and exchanged at the OAuth token endpoint for a bearer
//! token. Tokens carry their expiry so the transport can mint a new one.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::{GdstoreError, Result};

pub const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Longest assertion lifetime the token endpoint accepts.
pub const ASSERTION_LIFETIME_SECS: u64 = 3600;
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Claims of the signed assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: u64,
    pub exp: u64,
}

impl Claims {
    pub fn new(config: &StoreConfig, issued_at: u64) -> Self {
        Self {
            iss: config.service_account.clone(),
            scope: config.scopes.join(" "),
            aud: config.token_uri.clone(),
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AccessToken {
    value: String,
    expires_at: Option<Instant>,
}

impl AccessToken {
    /// A token supplied from outside; it is never refreshed.
    pub fn fixed(value: impl Into<String>) -> Self {
        Self { value: value.into(), expires_at: None }
    }
    pub fn value(&self) -> &str {
        &self.value
    }
    /// False once the token is within a minute of expiring.
    pub fn is_fresh(&self) -> bool {
        self.expires_at.is_none_or(|at| Instant::now() + EXPIRY_MARGIN < at)
    }
}

pub fn sign_assertion(config: &StoreConfig, private_key_pem: &[u8], issued_at: u64) -> Result<String> {
    let key = EncodingKey::from_rsa_pem(private_key_pem)
        .map_err(|e| GdstoreError::Auth(format!("invalid private key for {}: {}", config.service_account, e)))?;
    encode(&Header::new(Algorithm::RS256), &Claims::new(config, issued_at), &key)
        .map_err(|e| GdstoreError::Auth(format!("cannot sign assertion: {}", e)))
}

async fn read_private_key(config: &StoreConfig) -> Result<Vec<u8>> {
    let path = config
        .private_key_file
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| GdstoreError::Config("no private_key_file for the service account".to_string()))?;
    tokio::fs::read(path)
        .await
        .map_err(|e| GdstoreError::Config(format!("cannot read private key file {}: {}", path, e)))
}

/// Signs an assertion for the configured service account and exchanges it for
/// a bearer token. Every failure of the exchange is an `Auth` error.
pub async fn fetch_token(client: &Client, config: &StoreConfig) -> Result<AccessToken> {
    let key = read_private_key(config).await?;
    let issued_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let assertion = sign_assertion(config, &key, issued_at)?;
    let response = client
        .post(&config.token_uri)
        .form(&[("grant_type", GRANT_TYPE), ("assertion", assertion.as_str())])
        .send()
        .await
        .map_err(|e| GdstoreError::Auth(format!("token request failed: {}", e)))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(account = %config.service_account, status = status.as_u16(), "token exchange refused");
        return Err(GdstoreError::Auth(format!("token exchange refused ({}): {}", status.as_u16(), body)));
    }
    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| GdstoreError::Auth(format!("unreadable token response: {}", e)))?;
    debug!(account = %config.service_account, expires_in = ?token.expires_in, "service account authorised");
    Ok(AccessToken {
        value: token.access_token,
        expires_at: token.expires_in.map(|secs| Instant::now() + Duration::from_secs(secs)),
    })
}
