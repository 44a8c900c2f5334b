//! Shared test utilities for the hawk test suite.
//!
//! Provides a sample site fixture, a matching config, and helpers for
//! pinning modification times and faking Google service accounts.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let site = setup_sample_site();
//! let config = test_config();
//! let routes = RouteCollector::new(&config, site.path()).collect(&[], &[]).unwrap();
//! assert_eq!(routes.len(), SAMPLE_ROUTES.len());
//! ```

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use tempfile::TempDir;

use crate::config::HawkConfig;

/// Routes of `fixtures/site/` in collection order.
pub const SAMPLE_ROUTES: [&str; 5] = [
    "https://example.com/about",
    "https://example.com/blog/first-post",
    "https://example.com/blog",
    "https://example.com/contact",
    "https://example.com/",
];

/// Private key used to sign test service-account assertions.
pub const TEST_PRIVATE_KEY: &str = include_str!("../fixtures/test-service-account-key.pem");

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/site/` to a temp directory and return it.
///
/// Tests get an isolated copy they can touch and write into without
/// affecting other tests or the source fixtures.
pub fn setup_sample_site() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Config matching the sample site.
pub fn test_config() -> HawkConfig {
    HawkConfig {
        domain_name: "example.com".into(),
        ..Default::default()
    }
}

// =========================================================================
// Modification times
// =========================================================================

/// Set a file's modification time to `millis` since the epoch.
pub fn set_mtime(path: &Path, millis: i64) {
    let time = UNIX_EPOCH + Duration::from_millis(millis as u64);
    File::options()
        .write(true)
        .open(path)
        .unwrap_or_else(|e| panic!("cannot open {}: {e}", path.display()))
        .set_modified(time)
        .unwrap();
}

/// Pin every sample page to the same modification time.
pub fn set_all_mtimes(root: &Path, millis: i64) {
    for page in [
        "index.html",
        "about.html",
        "contact.html",
        "blog/index.html",
        "blog/first-post.htm",
    ] {
        set_mtime(&root.join(page), millis);
    }
}

// =========================================================================
// Route → file resolution
// =========================================================================

/// Resolve a route back to the page it came from: strip the domain, treat
/// an empty or directory path as `index`, and try the page extensions.
pub fn resolve_route_to_file(root: &Path, route: &str, domain: &str) -> Option<PathBuf> {
    let path = route.strip_prefix(&format!("https://{domain}/"))?;
    let path = path.trim_end_matches('/');
    let candidates: Vec<String> = if path.is_empty() {
        vec!["index".into()]
    } else {
        vec![path.to_string(), format!("{path}/index")]
    };

    candidates
        .iter()
        .flat_map(|stem| ["html", "htm"].map(|ext| root.join(format!("{stem}.{ext}"))))
        .find(|candidate| candidate.is_file())
}

// =========================================================================
// Google service accounts
// =========================================================================

/// Service-account key JSON whose token endpoint is `token_uri`.
pub fn service_account_json(token_uri: &str) -> String {
    serde_json::json!({
        "type": "service_account",
        "project_id": "hawk-tests",
        "private_key_id": "0123456789abcdef",
        "private_key": TEST_PRIVATE_KEY,
        "client_email": "hawk@hawk-tests.iam.gserviceaccount.com",
        "token_uri": token_uri,
    })
    .to_string()
}

/// Write a service-account key file into `dir` and return its path.
pub fn write_service_account(dir: &Path, token_uri: &str) -> PathBuf {
    let path = dir.join("gserv.json");
    std::fs::write(&path, service_account_json(token_uri)).unwrap();
    path
}
