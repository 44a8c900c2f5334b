//! Strategy dispatch.
//!
//! [`Hawk`] owns everything one invocation needs: the validated config, the
//! site root, an HTTP client, the file transfer and the state store. Its
//! [`hawk`](Hawk::hawk) entry point routes a run through one [`Strategy`]:
//!
//! | Strategy | Input | Flow |
//! |---|---|---|
//! | `IndexNow` | changed routes | key check → one batched POST |
//! | `GWebmaster` | whole sitemap | sitemap + robots → authorize → PUT |
//! | `GWebmaster2` | whole sitemap | as `GWebmaster`, then feedback |
//! | `GIndex` | changed routes | authorize → one POST per route |
//!
//! Route-based strategies read the previous run's timestamp and then move it
//! to now, in that order, before anything else happens. When nothing changed
//! the run stops with [`RunOutcome::NothingToDo`].

use crate::auth::{self, AuthError, INDEXING_SCOPE, WEBMASTERS_SCOPE};
use crate::changes::{self, Detection};
use crate::config::{ConfigError, HawkConfig};
use crate::google::{self, IndexingReport};
use crate::indexnow;
use crate::routes::{RouteCollector, ScanError};
use crate::sitemap::{self, RobotsUpdate, SitemapError};
use crate::state::{StateError, StateStore};
use crate::transfer::{FileTransfer, FtpTransfer, TransferError};
use crate::types::{IndexNowStatus, NotificationResponse, NotifyError, SitemapMeta};
use chrono::Utc;
use reqwest::Client;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HawkError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("State error: {0}")]
    State(#[from] StateError),
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("Sitemap error: {0}")]
    Sitemap(#[from] SitemapError),
    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),
    #[error("Authorization failed: {0}")]
    Auth(#[from] AuthError),
    #[error("{0}")]
    Notify(#[from] NotifyError),
}

/// Notification strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Strategy {
    /// Push changed routes to IndexNow (Bing, Yandex, Seznam, ...).
    IndexNow,
    /// Submit the sitemap to Google Search Console.
    #[value(name = "g-webmaster")]
    GWebmaster,
    /// Submit the sitemap, then report its Search Console status.
    #[value(name = "g-webmaster2")]
    GWebmaster2,
    /// Publish changed routes to the Google Indexing API.
    #[value(name = "g-index")]
    GIndex,
}

/// What a completed run did, for reporting.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    IndexNow {
        routes: Vec<String>,
        status: IndexNowStatus,
    },
    Webmaster {
        sitemap_status: String,
        robots: RobotsUpdate,
        submission: NotificationResponse,
        feedback: Option<SitemapMeta>,
    },
    Indexing {
        routes: Vec<String>,
        report: IndexingReport,
    },
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(Report),
    /// No route changed since the previous run; nothing was sent.
    NothingToDo,
}

pub struct Hawk {
    config: HawkConfig,
    root: PathBuf,
    client: Client,
    transfer: Box<dyn FileTransfer>,
    store: StateStore,
}

impl Hawk {
    /// A dispatcher uploading over FTP with the configured credentials.
    pub fn new(config: HawkConfig, root: impl Into<PathBuf>) -> Self {
        let transfer = Box::new(FtpTransfer::new(config.ftp.clone()));
        Self::with_transfer(config, root, transfer)
    }

    pub fn with_transfer(
        config: HawkConfig,
        root: impl Into<PathBuf>,
        transfer: Box<dyn FileTransfer>,
    ) -> Self {
        let root = root.into();
        let store = StateStore::new(root.join(&config.state_file));
        Self {
            config,
            root,
            client: Client::new(),
            transfer,
            store,
        }
    }

    pub fn config(&self) -> &HawkConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Run one strategy. Extra lookup/ignore patterns add to the configured
    /// ones; `prettify` only affects the sitemap layout.
    pub async fn hawk(
        &self,
        strategy: Strategy,
        lookup_patterns: &[String],
        ignore_patterns: &[String],
        prettify: bool,
    ) -> Result<RunOutcome, HawkError> {
        tracing::info!(?strategy, root = %self.root.display(), "run started");

        let report = match strategy {
            Strategy::IndexNow => {
                let Detection::Changed(routes) =
                    self.changed_routes(lookup_patterns, ignore_patterns)?
                else {
                    return Ok(RunOutcome::NothingToDo);
                };
                let status = indexnow::trigger(
                    &self.client,
                    &self.config,
                    &self.store,
                    &*self.transfer,
                    &routes,
                )
                .await?;
                Report::IndexNow { routes, status }
            }
            Strategy::GWebmaster => {
                self.google_webmaster(lookup_patterns, ignore_patterns, prettify, false)
                    .await?
            }
            Strategy::GWebmaster2 => {
                self.google_webmaster(lookup_patterns, ignore_patterns, prettify, true)
                    .await?
            }
            Strategy::GIndex => {
                let Detection::Changed(routes) =
                    self.changed_routes(lookup_patterns, ignore_patterns)?
                else {
                    return Ok(RunOutcome::NothingToDo);
                };
                let token = self.authorize(INDEXING_SCOPE).await?;
                let report =
                    google::job_media_index(&self.client, &self.config, &token, &routes).await;
                Report::Indexing { routes, report }
            }
        };

        Ok(RunOutcome::Completed(report))
    }

    /// Routes changed since the previous run. Moves the stored baseline to
    /// now whether or not anything changed.
    pub fn changed_routes(
        &self,
        lookup_patterns: &[String],
        ignore_patterns: &[String],
    ) -> Result<Detection, HawkError> {
        let last_run = self.store.peek_last_run()?;
        self.store.advance_last_run(Utc::now().timestamp_millis())?;

        let collector = RouteCollector::new(&self.config, &self.root);
        let detection =
            changes::changed_since(&collector, last_run, lookup_patterns, ignore_patterns)?;
        if detection == Detection::NoChanges {
            tracing::info!(last_run, "no routes were updated");
        }
        Ok(detection)
    }

    /// Write the sitemap, uploading it when `upload` is set.
    pub fn make_sitemap(
        &self,
        lookup_patterns: &[String],
        ignore_patterns: &[String],
        prettify: bool,
        upload: bool,
    ) -> Result<String, HawkError> {
        let transfer = upload.then_some(&*self.transfer);
        Ok(sitemap::make_sitemap(
            &self.config,
            &self.root,
            lookup_patterns,
            ignore_patterns,
            prettify,
            transfer,
        )?)
    }

    pub fn make_robots(&self) -> Result<RobotsUpdate, HawkError> {
        Ok(sitemap::make_robots(&self.config, &self.root)?)
    }

    async fn google_webmaster(
        &self,
        lookup_patterns: &[String],
        ignore_patterns: &[String],
        prettify: bool,
        check_feedback: bool,
    ) -> Result<Report, HawkError> {
        let sitemap_status = self.make_sitemap(lookup_patterns, ignore_patterns, prettify, true)?;
        let robots = self.make_robots()?;

        let token = self.authorize(WEBMASTERS_SCOPE).await?;
        let submission =
            google::webmaster_index(&self.client, &self.config, &self.store, &token).await?;

        let feedback = if check_feedback {
            let token = self.authorize(WEBMASTERS_SCOPE).await?;
            Some(google::webmaster_feedback(&self.client, &self.config, &self.store, &token).await?)
        } else {
            None
        };

        Ok(Report::Webmaster {
            sitemap_status,
            robots,
            submission,
            feedback,
        })
    }

    async fn authorize(&self, scope: &str) -> Result<String, HawkError> {
        let key_file = self.root.join(&self.config.service_account_file);
        Ok(auth::authorize_file(&self.client, &key_file, scope).await?)
    }
}
