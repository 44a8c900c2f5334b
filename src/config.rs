//! Configuration module.
//!
//! Handles loading, validating, and merging `hawk.toml`. The file lives in the
//! site root (the directory whose pages are published) and every key is
//! optional: user values are merged on top of the stock defaults, unknown keys
//! are rejected, and the merged result is validated before anything runs.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! lookup_patterns = ["**/*.html", "**/*.htm"]  # Pages to publish
//! ignore_patterns = ["node_modules/**"]        # Never published
//! time_zone = "UTC"                 # IANA zone used for <lastmod> values
//! domain_name = "example.com"       # Bare host, no scheme
//! sitemap_path = "sitemap.xml"      # Relative to the site root
//! robots_path = "robots.txt"        # Relative to the site root
//! service_account_file = "gserv.json"
//! state_file = ".hawk.lrs"          # Run state (last run, IndexNow key)
//!
//! [ftp]
//! hostname = ""
//! username = ""
//! password = ""
//!
//! [endpoints]
//! indexnow = "https://api.indexnow.org/IndexNow"
//! webmasters = "https://www.googleapis.com/webmasters/v3"
//! indexing = "https://indexing.googleapis.com/v3/urlNotifications:publish"
//!
//! [indexing]
//! max_in_flight = 8                 # Concurrent Indexing API requests
//! ```
//!
//! ## Credentials from the environment
//!
//! FTP credentials are usually kept out of `hawk.toml`. The variables
//! `HAWK_FTP_HOST`, `HAWK_FTP_USER` and `HAWK_FTP_PASSWORD` override the
//! `[ftp]` table; see [`HawkConfig::with_env_credentials`].

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the config file looked up in the site root.
pub const CONFIG_FILENAME: &str = "hawk.toml";

/// Ignore pattern applied on top of any configured ones.
pub const DEPENDENCY_IGNORE: &str = "**/node_modules/**";

pub const ENV_FTP_HOST: &str = "HAWK_FTP_HOST";
pub const ENV_FTP_USER: &str = "HAWK_FTP_USER";
pub const ENV_FTP_PASSWORD: &str = "HAWK_FTP_PASSWORD";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `hawk.toml`.
///
/// Loaded once at startup and handed by reference to every component; nothing
/// reads configuration from global state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HawkConfig {
    /// Globs selecting the pages to publish, relative to the site root.
    pub lookup_patterns: Vec<String>,
    /// Globs excluded from publishing.
    pub ignore_patterns: Vec<String>,
    /// IANA time zone name used when rendering modification times.
    pub time_zone: String,
    /// Bare host name of the published site, e.g. `www.example.com`.
    pub domain_name: String,
    /// Sitemap location relative to the site root (also its public path).
    pub sitemap_path: String,
    /// Robots file location relative to the site root.
    pub robots_path: String,
    /// Google service-account key file (JSON).
    pub service_account_file: String,
    /// Run-state file relative to the site root.
    pub state_file: String,
    /// File-transfer credentials for the document root.
    pub ftp: FtpCredential,
    /// Remote API endpoints.
    pub endpoints: EndpointsConfig,
    /// Google Indexing API fan-out settings.
    pub indexing: IndexingConfig,
}

impl Default for HawkConfig {
    fn default() -> Self {
        Self {
            lookup_patterns: vec!["**/*.html".to_string(), "**/*.htm".to_string()],
            ignore_patterns: vec!["node_modules/**".to_string()],
            time_zone: "UTC".to_string(),
            domain_name: "example.com".to_string(),
            sitemap_path: "sitemap.xml".to_string(),
            robots_path: "robots.txt".to_string(),
            service_account_file: "gserv.json".to_string(),
            state_file: ".hawk.lrs".to_string(),
            ftp: FtpCredential::default(),
            endpoints: EndpointsConfig::default(),
            indexing: IndexingConfig::default(),
        }
    }
}

impl HawkConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let domain = self.domain_name.trim();
        if domain.is_empty() {
            return Err(ConfigError::Validation("domain_name must be set".into()));
        }
        if domain.contains("://") || domain.contains('/') {
            return Err(ConfigError::Validation(format!(
                "domain_name must be a bare host (got {domain:?})"
            )));
        }
        if self.time_zone.parse::<Tz>().is_err() {
            return Err(ConfigError::Validation(format!(
                "time_zone {:?} is not a known IANA zone",
                self.time_zone
            )));
        }
        if self.lookup_patterns.is_empty() {
            return Err(ConfigError::Validation(
                "lookup_patterns must not be empty".into(),
            ));
        }
        for pattern in self.lookup_patterns.iter().chain(&self.ignore_patterns) {
            globset::Glob::new(pattern).map_err(|e| {
                ConfigError::Validation(format!("invalid glob pattern {pattern:?}: {e}"))
            })?;
        }
        if self.sitemap_path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "sitemap_path must not be empty".into(),
            ));
        }
        if self.indexing.max_in_flight == 0 {
            return Err(ConfigError::Validation(
                "indexing.max_in_flight must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// The configured time zone. Falls back to UTC for an unparsable name,
    /// which [`validate`](Self::validate) already rejects.
    pub fn zone(&self) -> Tz {
        self.time_zone.parse().unwrap_or(Tz::UTC)
    }

    /// Public URL of the sitemap, e.g. `https://example.com/sitemap.xml`.
    pub fn sitemap_url(&self) -> String {
        format!(
            "https://{}/{}",
            self.domain_name,
            self.sitemap_path.trim_start_matches('/')
        )
    }

    /// Search Console property identifier for a domain property.
    pub fn site_url(&self) -> String {
        format!("sc-domain:{}", self.domain_name)
    }

    /// Apply FTP credentials from `HAWK_FTP_*` environment variables.
    pub fn with_env_credentials(self) -> Self {
        self.with_credentials_from(|key| std::env::var(key).ok())
    }

    /// Apply FTP credential overrides from an arbitrary lookup.
    ///
    /// Empty values are ignored so an unset variable never blanks a value
    /// coming from `hawk.toml`.
    pub fn with_credentials_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(host) = non_empty(ENV_FTP_HOST) {
            self.ftp.hostname = host;
        }
        if let Some(user) = non_empty(ENV_FTP_USER) {
            self.ftp.username = user;
        }
        if let Some(pass) = non_empty(ENV_FTP_PASSWORD) {
            self.ftp.password = pass;
        }
        self
    }
}

/// Credentials for the FTP server hosting the document root.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FtpCredential {
    /// `host` or `host:port` (port 21 when omitted).
    pub hostname: String,
    pub username: String,
    pub password: String,
}

impl FtpCredential {
    pub fn is_complete(&self) -> bool {
        !self.hostname.is_empty() && !self.username.is_empty()
    }
}

impl std::fmt::Debug for FtpCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtpCredential")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Remote API endpoints. Overridable so a local mock server can stand in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointsConfig {
    /// IndexNow submission URL.
    pub indexnow: String,
    /// Search Console (webmasters v3) API base.
    pub webmasters: String,
    /// Indexing API publish URL.
    pub indexing: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            indexnow: "https://api.indexnow.org/IndexNow".to_string(),
            webmasters: "https://www.googleapis.com/webmasters/v3".to_string(),
            indexing: "https://indexing.googleapis.com/v3/urlNotifications:publish".to_string(),
        }
    }
}

/// Google Indexing API fan-out settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexingConfig {
    /// Maximum number of publish requests in flight together.
    pub max_in_flight: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self { max_in_flight: 8 }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(HawkConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely, so a user
///   `lookup_patterns` list replaces the stock list rather than extending it.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<HawkConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: HawkConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `hawk.toml` from the given site root.
pub fn load_config(root: &Path) -> Result<HawkConfig, ConfigError> {
    load_config_file(&root.join(CONFIG_FILENAME))
}

/// Load a config file from an explicit path, falling back to stock defaults
/// when it does not exist.
pub fn load_config_file(path: &Path) -> Result<HawkConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `hawk.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Hawk Configuration
# ==================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Globs selecting the pages to publish, relative to the site root.
lookup_patterns = ["**/*.html", "**/*.htm"]

# Globs that are never published. Dependency directories (node_modules)
# are always skipped in addition to these.
ignore_patterns = ["node_modules/**"]

# IANA time zone used for <lastmod> values and report timestamps.
time_zone = "UTC"

# Bare host name of the published site (no scheme, no path).
domain_name = "example.com"

# Output files, relative to the site root.
sitemap_path = "sitemap.xml"
robots_path = "robots.txt"

# Google service-account key file, used by the g-index and g-webmaster
# strategies.
service_account_file = "gserv.json"

# Run state: last run time, IndexNow key, last submitted sitemap.
state_file = ".hawk.lrs"

# ---------------------------------------------------------------------------
# FTP access to the document root (sitemap and IndexNow key uploads).
# Prefer HAWK_FTP_HOST / HAWK_FTP_USER / HAWK_FTP_PASSWORD in the
# environment or a .env file over storing credentials here.
# ---------------------------------------------------------------------------
[ftp]
hostname = ""
username = ""
password = ""

# ---------------------------------------------------------------------------
# Remote API endpoints
# ---------------------------------------------------------------------------
[endpoints]
indexnow = "https://api.indexnow.org/IndexNow"
webmasters = "https://www.googleapis.com/webmasters/v3"
indexing = "https://indexing.googleapis.com/v3/urlNotifications:publish"

# ---------------------------------------------------------------------------
# Google Indexing API
# ---------------------------------------------------------------------------
[indexing]
# Maximum number of publish requests in flight together.
max_in_flight = 8
"##
}
