//! Google service-account authorization.
//!
//! Implements the OAuth2 JWT bearer flow: sign an RS256 assertion with the
//! service account's private key, exchange it at the account's `token_uri`
//! and keep the returned `access_token`. Tokens are requested per strategy
//! and never cached.

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const WEBMASTERS_SCOPE: &str = "https://www.googleapis.com/auth/webmasters";
pub const INDEXING_SCOPE: &str = "https://www.googleapis.com/auth/indexing";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Cannot read service account file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid service account file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("JWT signing failed: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("Token request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Token endpoint rejected the assertion ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("Token endpoint returned no access token")]
    EmptyToken,
}

/// The fields hawk needs from a service-account key file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Claims of the signed assertion.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
}

impl ServiceAccount {
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let content = std::fs::read_to_string(path).map_err(|source| AuthError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn claims(&self, scope: &str, issued_at: i64) -> AssertionClaims {
        AssertionClaims {
            iss: self.client_email.clone(),
            scope: scope.to_string(),
            aud: self.token_uri.clone(),
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        }
    }

    /// Sign an assertion for `scope` issued at `issued_at` (epoch seconds).
    pub fn assertion(&self, scope: &str, issued_at: i64) -> Result<String, AuthError> {
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())?;
        Ok(encode(
            &Header::new(Algorithm::RS256),
            &self.claims(scope, issued_at),
            &key,
        )?)
    }
}

/// Exchange a freshly signed assertion for an access token.
pub async fn authorize(
    client: &Client,
    account: &ServiceAccount,
    scope: &str,
) -> Result<String, AuthError> {
    let assertion = account.assertion(scope, Utc::now().timestamp())?;
    tracing::debug!(token_uri = %account.token_uri, scope, "requesting access token");

    let response = client
        .post(&account.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    let token: TokenResponse = response.json().await?;
    if token.access_token.is_empty() {
        return Err(AuthError::EmptyToken);
    }
    tracing::info!(scope, "authorized");
    Ok(token.access_token)
}

/// Load the service account at `path` and authorize it for `scope`.
pub async fn authorize_file(client: &Client, path: &Path, scope: &str) -> Result<String, AuthError> {
    let account = ServiceAccount::load(path)?;
    authorize(client, &account, scope).await
}
