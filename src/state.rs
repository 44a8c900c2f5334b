//! Persisted run state.
//!
//! Hawk is a single-shot batch tool, so everything it needs to remember
//! between invocations fits in one small JSON file (`.hawk.lrs` by default):
//!
//! ```json
//! {
//!   "lastRunTimeStamp": 1718000000000,
//!   "secretKey": "9f86d081884c7d659a2feaa0c55ad015",
//!   "submittedSitemap": "https://example.com/sitemap.xml"
//! }
//! ```
//!
//! - **`lastRunTimeStamp`**: epoch milliseconds of the previous route-based
//!   run. Pages modified after it are "changed". Zero (or a missing file)
//!   means there was no previous run.
//! - **`secretKey`**: the IndexNow ownership key. Generated once, hosted at
//!   `https://{domain}/{key}.txt`, reused forever after.
//! - **`submittedSitemap`**: sitemap URL last accepted by Search Console,
//!   read back by the feedback check.
//!
//! # Reading the last run
//!
//! Reading the previous timestamp and moving the baseline to "now" are two
//! separate operations, [`StateStore::peek_last_run`] and
//! [`StateStore::advance_last_run`]. The dispatcher calls them back to back,
//! peek first, exactly once per run. [`StateStore::read_timestamp`] bundles
//! the pair for callers that want the one-step form.
//!
//! # Corruption
//!
//! The file must always be valid JSON. A present-but-unreadable file is
//! deleted and reported as [`StateError::Corrupt`], so the next run starts
//! from a clean slate (a full index) instead of failing forever. A `null`
//! field reads as its empty value; a field of the wrong type is an error but
//! leaves the file in place.
//!
//! There is no locking: two hawk processes racing on the same state file is
//! an accepted limitation.

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("State file {path} is corrupt and was removed: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Typed view of the state file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_run_time_stamp: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub secret_key: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub submitted_sitemap: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Partial record for [`StateStore::merge`]. `None` fields are left alone.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_time_stamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_sitemap: Option<String>,
}

/// Field names of the state file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKey {
    LastRunTimeStamp,
    SecretKey,
    SubmittedSitemap,
}

impl StateKey {
    pub fn as_str(self) -> &'static str {
        match self {
            StateKey::LastRunTimeStamp => "lastRunTimeStamp",
            StateKey::SecretKey => "secretKey",
            StateKey::SubmittedSitemap => "submittedSitemap",
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle on the state file. Every operation goes to disk; nothing is cached.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the typed state. `Ok(None)` when the file does not exist.
    pub fn load(&self) -> Result<Option<RunState>, StateError> {
        match self.load_raw()? {
            Some(map) => {
                let state = serde_json::from_value(Value::Object(map))?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    /// Previous `lastRunTimeStamp`, or 0 when there was no previous run.
    pub fn peek_last_run(&self) -> Result<i64, StateError> {
        Ok(self
            .load()?
            .map(|state| state.last_run_time_stamp)
            .unwrap_or(0))
    }

    /// Overwrite `lastRunTimeStamp` with `now_millis`, creating the file if
    /// needed. Other fields are preserved.
    pub fn advance_last_run(&self, now_millis: i64) -> Result<(), StateError> {
        self.merge(StatePatch {
            last_run_time_stamp: Some(now_millis),
            ..Default::default()
        })?;
        tracing::debug!(path = %self.path.display(), now_millis, "advanced last run");
        Ok(())
    }

    /// Read-then-advance: returns the previous timestamp (0 on first run) and
    /// moves the stored baseline to the current wall-clock time.
    pub fn read_timestamp(&self) -> Result<i64, StateError> {
        let previous = self.peek_last_run()?;
        self.advance_last_run(Utc::now().timestamp_millis())?;
        Ok(previous)
    }

    /// Look up a single field. Returns `0` when the file is absent and
    /// `null` when the file exists without that field.
    pub fn get(&self, key: StateKey) -> Result<Value, StateError> {
        match self.load_raw()? {
            Some(map) => Ok(map.get(key.as_str()).cloned().unwrap_or(Value::Null)),
            None => Ok(Value::from(0)),
        }
    }

    /// The stored IndexNow key, if one was issued.
    pub fn secret_key(&self) -> Result<Option<String>, StateError> {
        Ok(self
            .load()?
            .map(|state| state.secret_key)
            .filter(|key| !key.is_empty()))
    }

    /// The sitemap URL of the last accepted Search Console submission.
    pub fn submitted_sitemap(&self) -> Result<Option<String>, StateError> {
        Ok(self
            .load()?
            .map(|state| state.submitted_sitemap)
            .filter(|url| !url.is_empty()))
    }

    /// Shallow-merge `patch` into the persisted record and rewrite the file.
    ///
    /// Keys hawk does not know about are kept as they are.
    pub fn merge(&self, patch: StatePatch) -> Result<(), StateError> {
        let mut map = self.load_raw()?.unwrap_or_else(seed_record);
        if let Value::Object(fields) = serde_json::to_value(&patch)? {
            map.extend(fields);
        }
        self.save_raw(&map)
    }

    fn load_raw(&self) -> Result<Option<Map<String, Value>>, StateError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<Map<String, Value>>(&content) {
            Ok(map) => Ok(Some(map)),
            Err(source) => Err(self.discard_corrupt(source)),
        }
    }

    fn save_raw(&self, map: &Map<String, Value>) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Remove an unreadable state file and build the error describing it.
    fn discard_corrupt(&self, source: serde_json::Error) -> StateError {
        tracing::error!(path = %self.path.display(), error = %source, "removing corrupt state file");
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "could not remove corrupt state file");
        }
        StateError::Corrupt {
            path: self.path.clone(),
            source,
        }
    }
}

/// Fields written when the state file is created.
fn seed_record() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(StateKey::LastRunTimeStamp.as_str().into(), Value::from(0));
    map.insert(StateKey::SecretKey.as_str().into(), Value::from(""));
    map
}
