//! Page discovery and route generation.
//!
//! Walks the site root, selects pages with the configured lookup/ignore
//! globs, and turns each page into a [`RouteMeta`]: its public URL plus its
//! modification time in the configured zone.
//!
//! ## Route Rules
//!
//! ```text
//! index.html             → https://example.com/
//! about.html             → https://example.com/about
//! blog/index.html        → https://example.com/blog
//! blog/first-post.htm    → https://example.com/blog/first-post
//! ```
//!
//! The extension is dropped, separators become `/`, and `index` pages
//! collapse to their directory.
//!
//! ## Pattern Semantics
//!
//! Patterns are matched against paths relative to the root using `/` as
//! separator. `*` stays within one path segment, `**` crosses segments, and
//! `**/*.html` also matches pages at the root. Caller patterns are added to
//! the configured ones. Anything under a `node_modules` directory is always
//! skipped.
//!
//! ## Enumeration Order
//!
//! Entries are visited depth-first, sorted by file name, so two runs over the
//! same tree produce routes in the same order.

use crate::config::{DEPENDENCY_IGNORE, HawkConfig};
use chrono::{DateTime, SecondsFormat};
use chrono_tz::Tz;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use walkdir::WalkDir;

/// Modification time written when the filesystem time cannot be rendered.
pub const NULL_TIMESTAMP: &str = "null";

/// Directory names never descended into.
const DEPENDENCY_DIRS: &[&str] = &["node_modules"];

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] globset::Error),
}

/// A discovered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMeta {
    /// Public URL, e.g. `https://example.com/blog`.
    pub route: String,
    /// RFC 3339 timestamp in the configured zone, or [`NULL_TIMESTAMP`].
    pub modified_time: String,
}

impl RouteMeta {
    /// Modification time in epoch milliseconds. `None` for the `"null"`
    /// sentinel or any other unparsable value.
    pub fn modified_millis(&self) -> Option<i64> {
        DateTime::parse_from_rfc3339(&self.modified_time)
            .ok()
            .map(|t| t.timestamp_millis())
    }
}

/// Discovers pages under a site root.
pub struct RouteCollector<'a> {
    config: &'a HawkConfig,
    root: &'a Path,
}

impl<'a> RouteCollector<'a> {
    pub fn new(config: &'a HawkConfig, root: &'a Path) -> Self {
        Self { config, root }
    }

    /// Every page matching the lookup patterns and none of the ignore
    /// patterns, as paths relative to the root.
    pub fn lookup_files(
        &self,
        lookup_patterns: &[String],
        ignore_patterns: &[String],
    ) -> Result<Vec<PathBuf>, ScanError> {
        let dependency_ignore = DEPENDENCY_IGNORE.to_string();
        let lookup = build_globset(self.config.lookup_patterns.iter().chain(lookup_patterns))?;
        let ignore = build_globset(
            self.config
                .ignore_patterns
                .iter()
                .chain(ignore_patterns)
                .chain(std::iter::once(&dependency_ignore)),
        )?;

        let mut files = Vec::new();
        let walker = WalkDir::new(self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_dependency_dir(e));

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = match entry.path().strip_prefix(self.root) {
                Ok(r) => r.to_path_buf(),
                Err(_) => continue,
            };
            let key = slash_path(&relative);
            if lookup.is_match(&key) && !ignore.is_match(&key) {
                files.push(relative);
            }
        }

        tracing::debug!(root = %self.root.display(), count = files.len(), "looked up pages");
        Ok(files)
    }

    /// Discover all pages and attach their routes and modification times.
    pub fn collect(
        &self,
        lookup_patterns: &[String],
        ignore_patterns: &[String],
    ) -> Result<Vec<RouteMeta>, ScanError> {
        let zone = self.config.zone();
        let mut routes = Vec::new();

        for relative in self.lookup_files(lookup_patterns, ignore_patterns)? {
            let modified = std::fs::metadata(self.root.join(&relative))
                .and_then(|m| m.modified())
                .ok()
                .and_then(|t| format_modified(t, zone));

            if modified.is_none() {
                tracing::warn!(page = %relative.display(), "modification time unavailable");
            }

            routes.push(RouteMeta {
                route: route_url(&self.config.domain_name, &relative),
                modified_time: modified.unwrap_or_else(|| NULL_TIMESTAMP.to_string()),
            });
        }

        Ok(routes)
    }
}

/// Web path for a page relative to the site root, without leading slash.
///
/// - `index.html` → `""`
/// - `blog/index.html` → `"blog"`
/// - `blog/post.htm` → `"blog/post"`
pub fn route_path(relative: &Path) -> String {
    let path = slash_path(&relative.with_extension(""));
    if path == "index" {
        String::new()
    } else if let Some(parent) = path.strip_suffix("/index") {
        parent.to_string()
    } else {
        path
    }
}

/// Public URL for a page relative to the site root.
pub fn route_url(domain: &str, relative: &Path) -> String {
    format!("https://{}/{}", domain, route_path(relative))
}

/// Render a filesystem time in `zone` as RFC 3339 with millisecond precision.
pub fn format_modified(time: SystemTime, zone: Tz) -> Option<String> {
    let since_epoch = time.duration_since(UNIX_EPOCH).ok()?;
    let secs = i64::try_from(since_epoch.as_secs()).ok()?;
    let utc = DateTime::from_timestamp(secs, since_epoch.subsec_nanos())?;
    Some(
        utc.with_timezone(&zone)
            .to_rfc3339_opts(SecondsFormat::Millis, false),
    )
}

/// Path rendered with `/` separators regardless of platform.
fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn is_dependency_dir(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| DEPENDENCY_DIRS.contains(&name))
}

fn build_globset<'p>(patterns: impl IntoIterator<Item = &'p String>) -> Result<GlobSet, ScanError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(GlobBuilder::new(pattern).literal_separator(true).build()?);
    }
    Ok(builder.build()?)
}
