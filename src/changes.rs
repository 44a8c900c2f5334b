//! Change detection.
//!
//! A route is "changed" when its page was modified strictly after the
//! previous run. The very first run (timestamp `0`) treats every route as
//! changed. Routes whose modification time could not be read are never
//! changed on a later run.

use crate::routes::{RouteCollector, RouteMeta, ScanError};

/// Result of comparing the site against the previous run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// Nothing was modified since the previous run.
    NoChanges,
    /// Changed routes, in collection order. Never empty.
    Changed(Vec<String>),
}

impl Detection {
    pub fn routes(&self) -> &[String] {
        match self {
            Detection::NoChanges => &[],
            Detection::Changed(routes) => routes,
        }
    }
}

/// Routes modified after `last_run` (epoch millis).
pub fn changed_since(
    collector: &RouteCollector<'_>,
    last_run: i64,
    lookup_patterns: &[String],
    ignore_patterns: &[String],
) -> Result<Detection, ScanError> {
    let routes = collector.collect(lookup_patterns, ignore_patterns)?;
    Ok(select_changed(&routes, last_run))
}

/// Pure filtering step of [`changed_since`].
pub fn select_changed(routes: &[RouteMeta], last_run: i64) -> Detection {
    let changed: Vec<String> = routes
        .iter()
        .filter(|meta| {
            last_run == 0 || meta.modified_millis().is_some_and(|millis| millis > last_run)
        })
        .map(|meta| meta.route.clone())
        .collect();

    tracing::debug!(last_run, total = routes.len(), changed = changed.len(), "detected changes");

    if changed.is_empty() {
        Detection::NoChanges
    } else {
        Detection::Changed(changed)
    }
}
