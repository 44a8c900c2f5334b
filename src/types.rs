//! Shared types for the notification strategies.
//!
//! Every remote call produces one [`NotificationResponse`]. Its status is
//! classified into a closed set ([`StatusClass`] for the Google APIs,
//! [`IndexNowStatus`] for IndexNow) so reports can group on it and `match`
//! exhaustively.

use crate::auth::AuthError;
use crate::sitemap::SitemapError;
use crate::state::StateError;
use crate::transfer::TransferError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Authorization failed: {0}")]
    Auth(#[from] AuthError),
    #[error("State error: {0}")]
    State(#[from] StateError),
    #[error("Key file upload failed: {0}")]
    Transfer(#[from] TransferError),
    #[error("Sitemap error: {0}")]
    Sitemap(#[from] SitemapError),
    #[error("No record of submission")]
    NoSubmissionRecord,
    #[error("Last submission status not found for {0}")]
    SubmissionStatusNotFound(String),
}

/// Classified status of a Google API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StatusClass {
    Ok,
    NoContent,
    BadRequest,
    Forbidden,
    TooManyRequests,
    /// Any other status. `None` when the request never got a response.
    Unexpected(Option<u16>),
}

impl StatusClass {
    pub fn from_code(code: u16) -> Self {
        match code {
            200 => StatusClass::Ok,
            204 => StatusClass::NoContent,
            400 => StatusClass::BadRequest,
            403 => StatusClass::Forbidden,
            429 => StatusClass::TooManyRequests,
            other => StatusClass::Unexpected(Some(other)),
        }
    }

    pub fn code(self) -> Option<u16> {
        match self {
            StatusClass::Ok => Some(200),
            StatusClass::NoContent => Some(204),
            StatusClass::BadRequest => Some(400),
            StatusClass::Forbidden => Some(403),
            StatusClass::TooManyRequests => Some(429),
            StatusClass::Unexpected(code) => code,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, StatusClass::Ok | StatusClass::NoContent)
    }
}

/// Outcome of one remote call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationResponse {
    /// The route or sitemap URL the call was about.
    pub url: String,
    /// Parsed JSON body, or `Value::Null` when there was none.
    pub body: Value,
    pub status: StatusClass,
}

impl NotificationResponse {
    /// `error.message` from a Google error body.
    pub fn error_message(&self) -> Option<&str> {
        self.body
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
    }
}

/// Classified IndexNow response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IndexNowStatus {
    SubmittedValidated,
    SubmittedPending,
    BadRequest,
    Forbidden,
    Unprocessable,
    TooManyRequests,
    Unexpected(u16),
}

impl IndexNowStatus {
    pub fn from_code(code: u16) -> Self {
        match code {
            200 => IndexNowStatus::SubmittedValidated,
            202 => IndexNowStatus::SubmittedPending,
            400 => IndexNowStatus::BadRequest,
            403 => IndexNowStatus::Forbidden,
            422 => IndexNowStatus::Unprocessable,
            429 => IndexNowStatus::TooManyRequests,
            other => IndexNowStatus::Unexpected(other),
        }
    }

    pub fn is_submitted(self) -> bool {
        matches!(
            self,
            IndexNowStatus::SubmittedValidated | IndexNowStatus::SubmittedPending
        )
    }

    pub fn message(self) -> String {
        match self {
            IndexNowStatus::SubmittedValidated => "URL submitted and key validated".into(),
            IndexNowStatus::SubmittedPending => {
                "URL received, key validation pending".into()
            }
            IndexNowStatus::BadRequest => "Bad request: invalid format".into(),
            IndexNowStatus::Forbidden => {
                "Forbidden: key not valid (key file not found or mismatched)".into()
            }
            IndexNowStatus::Unprocessable => {
                "Unprocessable entity: URLs don't belong to the host or key mismatch".into()
            }
            IndexNowStatus::TooManyRequests => "Too many requests: potential spam".into(),
            IndexNowStatus::Unexpected(code) => format!("Unexpected response status {code}"),
        }
    }
}

/// Search Console status of a submitted sitemap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitemapMeta {
    pub page_counts: u64,
    pub last_submitted: String,
    pub last_downloaded: String,
    pub is_pending: bool,
    pub warnings: u64,
    pub errors: u64,
}
