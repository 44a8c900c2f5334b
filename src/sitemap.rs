//! Sitemap and robots file generation.
//!
//! The sitemap is always a full snapshot of every discovered route, never an
//! incremental one:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="..." xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
//!     <url>
//!         <loc>https://example.com/about</loc>
//!         <lastmod>2024-06-10T09:30:00.000+00:00</lastmod>
//!     </url>
//! </urlset>
//! ```
//!
//! The robots file carries exactly one `sitemap:` directive, always on the
//! first line. Rebuilding it any number of times gives byte-identical output.

use crate::config::HawkConfig;
use crate::routes::{NULL_TIMESTAMP, RouteCollector, RouteMeta, ScanError};
use crate::transfer::{FileTransfer, TransferError, with_session};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str = "http://www.sitemaps.org/schemas/sitemap/0.9 http://www.sitemaps.org/schemas/sitemap/0.9/sitemap.xsd";
const INDENT: usize = 4;

/// Robots directive prefix, matched case-insensitively.
const SITEMAP_DIRECTIVE: &str = "sitemap:";

#[derive(Error, Debug)]
pub enum SitemapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("XML error: {0}")]
    Xml(String),
    #[error("Sitemap upload failed: {0}")]
    Upload(#[from] TransferError),
}

fn xml_error(e: impl std::fmt::Display) -> SitemapError {
    SitemapError::Xml(e.to_string())
}

// =============================================================================
// Sitemap
// =============================================================================

/// Serialize routes into a sitemap document.
///
/// `prettify` only changes whitespace. Routes without a readable
/// modification time get no `<lastmod>` element.
pub fn build_sitemap_xml(routes: &[RouteMeta], prettify: bool) -> Result<String, SitemapError> {
    let mut writer = if prettify {
        Writer::new_with_indent(Vec::new(), b' ', INDENT)
    } else {
        Writer::new(Vec::new())
    };

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;

    let urlset = BytesStart::new("urlset").with_attributes([
        ("xmlns:xsi", XSI_NS),
        ("xsi:schemaLocation", SCHEMA_LOCATION),
        ("xmlns", SITEMAP_NS),
    ]);
    writer.write_event(Event::Start(urlset)).map_err(xml_error)?;

    for meta in routes {
        writer
            .write_event(Event::Start(BytesStart::new("url")))
            .map_err(xml_error)?;
        write_text_element(&mut writer, "loc", &meta.route)?;
        if meta.modified_time != NULL_TIMESTAMP {
            write_text_element(&mut writer, "lastmod", &meta.modified_time)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("url")))
            .map_err(xml_error)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("urlset")))
        .map_err(xml_error)?;

    String::from_utf8(writer.into_inner()).map_err(xml_error)
}

fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    text: &str,
) -> Result<(), SitemapError> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_error)?;
    Ok(())
}

/// Read the `<loc>` values back out of a sitemap document, in order.
pub fn parse_sitemap_routes(xml: &str) -> Result<Vec<String>, SitemapError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut routes = Vec::new();
    let mut in_loc = false;
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) if e.local_name().as_ref() == b"loc" => in_loc = true,
            Event::End(e) if e.local_name().as_ref() == b"loc" => in_loc = false,
            Event::Text(e) if in_loc => routes.push(e.unescape().map_err(xml_error)?.into_owned()),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(routes)
}

/// Build the sitemap for the site rooted at `root` and write it to
/// `sitemap_path`. With a transfer, the file is also uploaded to the
/// document root; an upload failure is an error.
pub fn make_sitemap(
    config: &HawkConfig,
    root: &Path,
    lookup_patterns: &[String],
    ignore_patterns: &[String],
    prettify: bool,
    upload: Option<&dyn FileTransfer>,
) -> Result<String, SitemapError> {
    let routes = RouteCollector::new(config, root).collect(lookup_patterns, ignore_patterns)?;
    let xml = build_sitemap_xml(&routes, prettify)?;

    let local = root.join(&config.sitemap_path);
    if let Some(parent) = local.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&local, xml)?;
    tracing::info!(path = %local.display(), routes = routes.len(), "sitemap written");

    match upload {
        Some(transfer) => {
            let remote = remote_path(&config.sitemap_path);
            with_session(transfer, |t| t.upload_file(&local, &remote))?;
            Ok("Sitemap created and uploaded".to_string())
        }
        None => Ok("Sitemap created".to_string()),
    }
}

/// Destination on the document root for a site-relative path.
pub fn remote_path(relative: &str) -> String {
    format!("/{}", relative.trim_start_matches('/'))
}

// =============================================================================
// Robots
// =============================================================================

/// What [`make_robots`] did to the robots file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotsUpdate {
    /// No robots file existed; one was created.
    Created,
    /// Existing directives were replaced by the fresh one.
    Replaced,
    /// The directive was added on top of an existing file.
    Prepended,
}

impl RobotsUpdate {
    pub fn message(self) -> &'static str {
        match self {
            RobotsUpdate::Created => "robots.txt created and sitemap link added",
            RobotsUpdate::Replaced => "sitemap link updated in existing robots.txt",
            RobotsUpdate::Prepended => "sitemap link added to existing robots.txt",
        }
    }
}

impl std::fmt::Display for RobotsUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// The directive line pointing at the configured sitemap, with newline.
pub fn sitemap_directive(config: &HawkConfig) -> String {
    format!("sitemap: {}\n", config.sitemap_url())
}

/// Merge a fresh directive into existing robots content.
///
/// Every line starting with `sitemap:` (any case) is removed outright and
/// the fresh directive becomes the first line.
pub fn merge_robots(directive: &str, existing: &str) -> (String, RobotsUpdate) {
    let mut kept = String::with_capacity(existing.len());
    let mut had_directive = false;

    for line in existing.split_inclusive('\n') {
        if is_sitemap_directive(line) {
            had_directive = true;
        } else {
            kept.push_str(line);
        }
    }

    let update = if had_directive {
        RobotsUpdate::Replaced
    } else {
        RobotsUpdate::Prepended
    };
    (format!("{directive}{kept}"), update)
}

fn is_sitemap_directive(line: &str) -> bool {
    line.get(..SITEMAP_DIRECTIVE.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(SITEMAP_DIRECTIVE))
}

/// Ensure the robots file under `root` points at the sitemap.
pub fn make_robots(config: &HawkConfig, root: &Path) -> Result<RobotsUpdate, SitemapError> {
    let path = root.join(&config.robots_path);
    let directive = sitemap_directive(config);

    let (content, update) = if path.exists() {
        let existing = fs::read_to_string(&path)?;
        merge_robots(&directive, &existing)
    } else {
        (directive, RobotsUpdate::Created)
    };

    fs::write(&path, content)?;
    tracing::info!(path = %path.display(), ?update, "robots file written");
    Ok(update)
}
