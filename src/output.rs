//! CLI output formatting for run reports.
//!
//! # Output Format
//!
//! ## Change-based strategies
//!
//! ```text
//! Updated routes:
//! https://example.com/about
//! https://example.com/blog
//!
//! IndexNow: URL submitted and key validated
//! ```
//!
//! ## Indexing API
//!
//! ```text
//! Successfully reported routes:
//! https://example.com/about
//!
//! Google response: 1 of 2 failed
//!
//! BAD_REQUEST
//! Affected routes:
//!     https://example.com/blog | Reason: Invalid URL
//! ```
//!
//! ## Webmaster
//!
//! ```text
//! Sitemap created and uploaded | sitemap link added to existing robots.txt
//!
//! Sitemap submitted
//!     Submitted link: https://example.com/sitemap.xml
//!
//! Sitemap status
//!     Pages: 42
//!     Last submitted: 09:05:07 PM - Jun 9, 2024
//!     ...
//! ```
//!
//! # Architecture
//!
//! Every report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::dispatcher::{Report, RunOutcome};
use crate::google::IndexingReport;
use crate::sitemap::RobotsUpdate;
use crate::types::{IndexNowStatus, NotificationResponse, SitemapMeta, StatusClass};

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn affected_routes(lines: &mut Vec<String>, responses: &[&NotificationResponse]) {
    lines.push("Affected routes:".to_string());
    for response in responses {
        lines.push(format!("{}{}", indent(1), response.url));
    }
}

// ============================================================================
// Change detection
// ============================================================================

pub fn format_updated_routes(routes: &[String]) -> Vec<String> {
    let mut lines = vec!["Updated routes:".to_string()];
    lines.extend(routes.iter().cloned());
    lines
}

pub fn format_nothing_to_do() -> Vec<String> {
    vec!["No routes were updated".to_string()]
}

// ============================================================================
// IndexNow
// ============================================================================

pub fn format_indexnow(status: IndexNowStatus) -> Vec<String> {
    vec![format!("IndexNow: {}", status.message())]
}

// ============================================================================
// Sitemap and robots
// ============================================================================

pub fn format_sitemap_robots(sitemap_status: &str, robots: RobotsUpdate) -> Vec<String> {
    vec![format!("{sitemap_status} | {robots}")]
}

/// Outcome of a sitemap submission.
///
/// ```text
/// Forbidden | Reason: User does not have sufficient permission
///     Failed link: https://example.com/sitemap.xml
/// ```
pub fn format_submission(response: &NotificationResponse) -> Vec<String> {
    let reason = response.error_message().unwrap_or("");
    match response.status {
        StatusClass::Ok | StatusClass::NoContent => vec![
            "Sitemap submitted".to_string(),
            format!("{}Submitted link: {}", indent(1), response.url),
        ],
        StatusClass::Forbidden => vec![
            format!("Forbidden | Reason: {reason}"),
            format!("{}Failed link: {}", indent(1), response.url),
        ],
        other => vec![
            "Unexpected response".to_string(),
            format!("{}Status code: {}", indent(1), status_label(other)),
            format!("{}Error message: {reason}", indent(1)),
            format!("{}Failed link: {}", indent(1), response.url),
        ],
    }
}

fn status_label(status: StatusClass) -> String {
    match status.code() {
        Some(code) => code.to_string(),
        None => "no response".to_string(),
    }
}

pub fn format_sitemap_meta(meta: &SitemapMeta) -> Vec<String> {
    let or_never = |s: &str| if s.is_empty() { "never".to_string() } else { s.to_string() };
    vec![
        "Sitemap status".to_string(),
        format!("{}Pages: {}", indent(1), meta.page_counts),
        format!("{}Last submitted: {}", indent(1), or_never(&meta.last_submitted)),
        format!("{}Last downloaded: {}", indent(1), or_never(&meta.last_downloaded)),
        format!("{}Pending: {}", indent(1), if meta.is_pending { "yes" } else { "no" }),
        format!("{}Warnings: {}", indent(1), meta.warnings),
        format!("{}Errors: {}", indent(1), meta.errors),
    ]
}

// ============================================================================
// Indexing API
// ============================================================================

/// Consolidated report of an Indexing API batch. Groups appear in a fixed
/// order; routes keep route order within a group.
pub fn format_indexing_report(report: &IndexingReport) -> Vec<String> {
    let mut lines = Vec::new();

    let succeeded = report.group(StatusClass::Ok);
    if !succeeded.is_empty() {
        lines.push("Successfully reported routes:".to_string());
        lines.extend(succeeded.iter().map(|r| r.url.clone()));
    }

    if report.all_succeeded() {
        return lines;
    }

    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "Google response: {} of {} failed",
        report.failed(),
        report.total()
    ));

    let bad_request = report.group(StatusClass::BadRequest);
    if !bad_request.is_empty() {
        lines.push(String::new());
        lines.push("BAD_REQUEST".to_string());
        lines.push("Affected routes:".to_string());
        for response in bad_request {
            lines.push(format!(
                "{}{} | Reason: {}",
                indent(1),
                response.url,
                response.error_message().unwrap_or("")
            ));
        }
    }

    let forbidden = report.group(StatusClass::Forbidden);
    if !forbidden.is_empty() {
        lines.push(String::new());
        lines.push("FORBIDDEN - Ownership verification failed".to_string());
        affected_routes(&mut lines, &forbidden);
    }

    let too_many = report.group(StatusClass::TooManyRequests);
    if !too_many.is_empty() {
        lines.push(String::new());
        lines.push("TOO_MANY_REQUESTS - Indexing API quota exceeded".to_string());
        affected_routes(&mut lines, &too_many);
    }

    let unexpected = report.unexpected();
    if !unexpected.is_empty() {
        lines.push(String::new());
        lines.push("UNEXPECTED".to_string());
        lines.push("Affected routes:".to_string());
        for response in unexpected {
            lines.push(format!(
                "{}{} | Status: {}",
                indent(1),
                response.url,
                status_label(response.status)
            ));
        }
    }

    lines
}

// ============================================================================
// Whole runs
// ============================================================================

pub fn format_outcome(outcome: &RunOutcome) -> Vec<String> {
    match outcome {
        RunOutcome::NothingToDo => format_nothing_to_do(),
        RunOutcome::Completed(Report::IndexNow { routes, status }) => {
            let mut lines = format_updated_routes(routes);
            lines.push(String::new());
            lines.extend(format_indexnow(*status));
            lines
        }
        RunOutcome::Completed(Report::Indexing { routes, report }) => {
            let mut lines = format_updated_routes(routes);
            lines.push(String::new());
            lines.extend(format_indexing_report(report));
            lines
        }
        RunOutcome::Completed(Report::Webmaster {
            sitemap_status,
            robots,
            submission,
            feedback,
        }) => {
            let mut lines = format_sitemap_robots(sitemap_status, *robots);
            lines.push(String::new());
            lines.extend(format_submission(submission));
            if let Some(meta) = feedback {
                lines.push(String::new());
                lines.extend(format_sitemap_meta(meta));
            }
            lines
        }
    }
}

pub fn print_outcome(outcome: &RunOutcome) {
    for line in format_outcome(outcome) {
        println!("{}", line);
    }
}
