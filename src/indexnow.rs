//! IndexNow push notifications.
//!
//! IndexNow proves site ownership with a key hosted on the site itself. On
//! the first run hawk generates a key, uploads it as `/{key}.txt` and stores
//! it in the run state; every later run reuses it. All changed routes then
//! go out in one batched POST, and only the response status is interpreted.

use crate::config::HawkConfig;
use crate::state::{StatePatch, StateStore};
use crate::transfer::{FileTransfer, with_session};
use crate::types::{IndexNowStatus, NotifyError};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;

const JSON_UTF8: &str = "application/json; charset=utf-8";

/// Request body of an IndexNow submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexNowPayload {
    pub host: String,
    pub key: String,
    pub key_location: String,
    pub url_list: Vec<String>,
}

impl IndexNowPayload {
    pub fn new(config: &HawkConfig, key: &str, routes: &[String]) -> Self {
        Self {
            host: config.domain_name.clone(),
            key: key.to_string(),
            key_location: key_location(config, key),
            url_list: routes.to_vec(),
        }
    }
}

/// Public URL of the hosted key file.
pub fn key_location(config: &HawkConfig, key: &str) -> String {
    format!("https://{}/{}", config.domain_name, key_file_name(key))
}

pub fn key_file_name(key: &str) -> String {
    format!("{key}.txt")
}

/// 16 random bytes, hex encoded (32 characters).
pub fn make_secret_key() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

/// Return the stored key, or generate, upload and persist a new one.
///
/// The key is only persisted after the upload succeeded, so a failed upload
/// leaves no half-registered key behind.
pub fn ensure_secret_key(
    store: &StateStore,
    transfer: &dyn FileTransfer,
) -> Result<String, NotifyError> {
    if let Some(key) = store.secret_key()? {
        tracing::debug!("reusing stored IndexNow key");
        return Ok(key);
    }

    let key = make_secret_key();
    let remote = format!("/{}", key_file_name(&key));
    with_session(transfer, |t| t.upload(&mut key.as_bytes(), &remote))?;
    tracing::info!(%remote, "IndexNow key file uploaded");

    store.merge(StatePatch {
        secret_key: Some(key.clone()),
        ..StatePatch::default()
    })?;
    Ok(key)
}

/// Submit `routes` in one request and classify the response status.
pub async fn call_api(
    client: &Client,
    endpoint: &str,
    payload: &IndexNowPayload,
) -> Result<IndexNowStatus, NotifyError> {
    tracing::debug!(endpoint, urls = payload.url_list.len(), "submitting to IndexNow");

    let response = client
        .post(endpoint)
        .header(CONTENT_TYPE, JSON_UTF8)
        .json(payload)
        .send()
        .await?;

    let status = IndexNowStatus::from_code(response.status().as_u16());
    tracing::info!(?status, "IndexNow responded");
    Ok(status)
}

/// Full IndexNow flow for a set of changed routes.
pub async fn trigger(
    client: &Client,
    config: &HawkConfig,
    store: &StateStore,
    transfer: &dyn FileTransfer,
    routes: &[String],
) -> Result<IndexNowStatus, NotifyError> {
    let key = ensure_secret_key(store, transfer)?;
    let payload = IndexNowPayload::new(config, &key, routes);
    call_api(client, &config.endpoints.indexnow, &payload).await
}
