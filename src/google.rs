//! Google Search Console and Indexing API strategies.
//!
//! ## Webmaster submission
//!
//! The sitemap is registered with a Search Console domain property:
//!
//! ```text
//! PUT {webmasters}/sites/sc-domain%3Aexample.com/sitemaps/https%3A%2F%2Fexample.com%2Fsitemap.xml
//! ```
//!
//! A successful submission records the sitemap URL in the run state. The
//! feedback check later lists the property's sitemaps and reports the entry
//! matching that recorded URL.
//!
//! ## Job/media indexing
//!
//! The Indexing API takes one `{url, type: "URL_UPDATED"}` POST per route.
//! Requests run concurrently, at most `max_in_flight` at a time, and the
//! responses are put back in route order before grouping, so reports never
//! depend on which request finished first. A route whose request fails in
//! transport lands in the unexpected bucket; it never aborts the batch.

use crate::config::HawkConfig;
use crate::state::{StatePatch, StateStore};
use crate::types::{NotificationResponse, NotifyError, SitemapMeta, StatusClass};
use chrono::DateTime;
use chrono_tz::Tz;
use futures::stream::{self, StreamExt};
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;

/// Display format for Search Console times, e.g. `09:05:07 PM - Jun 9, 2024`.
pub const FEEDBACK_TIME_FORMAT: &str = "%I:%M:%S %p - %b %-d, %Y";

const URL_UPDATED: &str = "URL_UPDATED";

/// Indexing API request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexingPayload<'a> {
    pub url: &'a str,
    #[serde(rename = "type")]
    pub kind: &'a str,
}

// =============================================================================
// Webmaster submission
// =============================================================================

/// URL of the sitemap resource for the configured property.
pub fn sitemap_resource_url(config: &HawkConfig) -> String {
    format!(
        "{}/{}",
        sitemaps_collection_url(config),
        urlencoding::encode(&config.sitemap_url())
    )
}

/// URL of the property's sitemap collection.
pub fn sitemaps_collection_url(config: &HawkConfig) -> String {
    format!(
        "{}/sites/{}/sitemaps",
        config.endpoints.webmasters.trim_end_matches('/'),
        urlencoding::encode(&config.site_url())
    )
}

/// Submit the configured sitemap. The outcome is reported, not raised: only
/// transport and state failures are errors. On success the sitemap URL is
/// recorded as the last submission.
pub async fn webmaster_index(
    client: &Client,
    config: &HawkConfig,
    store: &StateStore,
    token: &str,
) -> Result<NotificationResponse, NotifyError> {
    let sitemap_url = config.sitemap_url();
    tracing::debug!(%sitemap_url, "submitting sitemap");

    let response = client
        .put(sitemap_resource_url(config))
        .bearer_auth(token)
        .send()
        .await?;
    let response = into_notification(sitemap_url, response).await;

    if response.status.is_success() {
        store.merge(StatePatch {
            submitted_sitemap: Some(response.url.clone()),
            ..StatePatch::default()
        })?;
        tracing::info!(url = %response.url, "sitemap submitted");
    } else {
        tracing::warn!(url = %response.url, status = ?response.status, "sitemap submission rejected");
    }
    Ok(response)
}

/// Search Console status of the last recorded submission.
pub async fn webmaster_feedback(
    client: &Client,
    config: &HawkConfig,
    store: &StateStore,
    token: &str,
) -> Result<SitemapMeta, NotifyError> {
    let submitted = store
        .submitted_sitemap()?
        .ok_or(NotifyError::NoSubmissionRecord)?;

    let listing: Value = client
        .get(sitemaps_collection_url(config))
        .bearer_auth(token)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let entry = listing
        .get("sitemap")
        .and_then(Value::as_array)
        .and_then(|entries| {
            entries
                .iter()
                .find(|e| e.get("path").and_then(Value::as_str) == Some(submitted.as_str()))
        })
        .ok_or_else(|| NotifyError::SubmissionStatusNotFound(submitted.clone()))?;

    Ok(sitemap_meta(entry, config.zone()))
}

/// Build a [`SitemapMeta`] from one entry of a `sitemaps.list` response.
///
/// Search Console encodes counts as strings; numbers are accepted too.
pub fn sitemap_meta(entry: &Value, zone: Tz) -> SitemapMeta {
    let time = |field: &str| {
        entry
            .get(field)
            .and_then(Value::as_str)
            .map(|iso| convert_time_in_zone(iso, zone))
            .unwrap_or_default()
    };

    SitemapMeta {
        page_counts: entry
            .get("contents")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("submitted"))
            .map(as_count)
            .unwrap_or(0),
        last_submitted: time("lastSubmitted"),
        last_downloaded: time("lastDownloaded"),
        is_pending: entry
            .get("isPending")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        warnings: entry.get("warnings").map(as_count).unwrap_or(0),
        errors: entry.get("errors").map(as_count).unwrap_or(0),
    }
}

fn as_count(value: &Value) -> u64 {
    match value {
        Value::String(s) => s.parse().unwrap_or(0),
        other => other.as_u64().unwrap_or(0),
    }
}

/// Render an RFC 3339 time in `zone` with [`FEEDBACK_TIME_FORMAT`].
/// Unparsable input gives an empty string.
pub fn convert_time_in_zone(iso: &str, zone: Tz) -> String {
    DateTime::parse_from_rfc3339(iso)
        .map(|t| t.with_timezone(&zone).format(FEEDBACK_TIME_FORMAT).to_string())
        .unwrap_or_default()
}

// =============================================================================
// Job/media indexing
// =============================================================================

/// Responses of an Indexing API batch, in route order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexingReport {
    pub responses: Vec<NotificationResponse>,
}

impl IndexingReport {
    /// Responses with `status`, in route order.
    pub fn group(&self, status: StatusClass) -> Vec<&NotificationResponse> {
        self.responses.iter().filter(|r| r.status == status).collect()
    }

    /// Responses outside the 200/400/403/429 groups.
    pub fn unexpected(&self) -> Vec<&NotificationResponse> {
        self.responses
            .iter()
            .filter(|r| {
                !matches!(
                    r.status,
                    StatusClass::Ok
                        | StatusClass::BadRequest
                        | StatusClass::Forbidden
                        | StatusClass::TooManyRequests
                )
            })
            .collect()
    }

    pub fn total(&self) -> usize {
        self.responses.len()
    }

    pub fn succeeded(&self) -> usize {
        self.group(StatusClass::Ok).len()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }
}

/// Publish `URL_UPDATED` for each route with bounded concurrency.
pub async fn job_media_index(
    client: &Client,
    config: &HawkConfig,
    token: &str,
    routes: &[String],
) -> IndexingReport {
    let endpoint = config.endpoints.indexing.as_str();
    let max_in_flight = config.indexing.max_in_flight.max(1);
    tracing::debug!(routes = routes.len(), max_in_flight, "publishing to Indexing API");

    let mut indexed: Vec<(usize, NotificationResponse)> = stream::iter(routes.iter().enumerate())
        .map(|(position, route)| async move {
            (position, publish(client, endpoint, token, route).await)
        })
        .buffer_unordered(max_in_flight)
        .collect()
        .await;
    indexed.sort_by_key(|(position, _)| *position);

    let report = IndexingReport {
        responses: indexed.into_iter().map(|(_, response)| response).collect(),
    };
    tracing::info!(
        total = report.total(),
        succeeded = report.succeeded(),
        "Indexing API batch finished"
    );
    report
}

/// One Indexing API call. Transport failures become an unexpected response.
pub async fn publish(client: &Client, endpoint: &str, token: &str, route: &str) -> NotificationResponse {
    let payload = IndexingPayload {
        url: route,
        kind: URL_UPDATED,
    };

    match client
        .post(endpoint)
        .bearer_auth(token)
        .json(&payload)
        .send()
        .await
    {
        Ok(response) => into_notification(route.to_string(), response).await,
        Err(e) => {
            tracing::warn!(route, error = %e, "Indexing API request failed");
            NotificationResponse {
                url: route.to_string(),
                body: Value::String(e.to_string()),
                status: StatusClass::Unexpected(None),
            }
        }
    }
}

/// Classify a response and keep its JSON body (`Null` when absent or not JSON).
async fn into_notification(url: String, response: Response) -> NotificationResponse {
    let status = StatusClass::from_code(response.status().as_u16());
    let body = response
        .bytes()
        .await
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or(Value::Null);
    tracing::debug!(%url, ?status, "response received");
    NotificationResponse { url, body, status }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> HawkConfig {
        let mut config = test_config();
        config.endpoints.webmasters = format!("{}/webmasters/v3", server.uri());
        config.endpoints.indexing = format!("{}/v3/urlNotifications:publish", server.uri());
        config
    }

    fn routes() -> Vec<String> {
        SAMPLE_ROUTES.iter().map(|r| r.to_string()).collect()
    }

    // =========================================================================
    // URLs and time formatting
    // =========================================================================

    #[test]
    fn sitemap_resource_url_encodes_both_segments() {
        let config = test_config();
        assert_eq!(
            sitemap_resource_url(&config),
            "https://www.googleapis.com/webmasters/v3/sites/sc-domain%3Aexample.com/sitemaps/https%3A%2F%2Fexample.com%2Fsitemap.xml"
        );
    }

    #[test]
    fn convert_time_uses_zone_and_twelve_hour_clock() {
        let kolkata = chrono_tz::Asia::Kolkata;
        assert_eq!(
            convert_time_in_zone("2024-06-09T15:35:07.000Z", kolkata),
            "09:05:07 PM - Jun 9, 2024"
        );
        assert_eq!(
            convert_time_in_zone("2024-06-09T00:00:00Z", Tz::UTC),
            "12:00:00 AM - Jun 9, 2024"
        );
        assert_eq!(convert_time_in_zone("", Tz::UTC), "");
    }

    #[test]
    fn sitemap_meta_reads_string_counts() {
        let entry = json!({
            "path": "https://example.com/sitemap.xml",
            "lastSubmitted": "2024-06-09T15:35:07.000Z",
            "isPending": true,
            "warnings": "2",
            "errors": "0",
            "contents": [{"type": "web", "submitted": "42", "indexed": "0"}],
        });
        assert_eq!(
            sitemap_meta(&entry, Tz::UTC),
            SitemapMeta {
                page_counts: 42,
                last_submitted: "03:35:07 PM - Jun 9, 2024".into(),
                last_downloaded: String::new(),
                is_pending: true,
                warnings: 2,
                errors: 0,
            }
        );
    }

    // =========================================================================
    // Webmaster submission and feedback
    // =========================================================================

    #[tokio::test]
    async fn successful_submission_is_recorded() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(
                "/webmasters/v3/sites/sc-domain%3Aexample.com/sitemaps/https%3A%2F%2Fexample.com%2Fsitemap.xml",
            ))
            .and(header("authorization", "Bearer t0k"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let store = StateStore::new(tmp.path().join(".hawk.lrs"));
        let response = webmaster_index(&Client::new(), &config_for(&server), &store, "t0k")
            .await
            .unwrap();

        assert_eq!(response.status, StatusClass::NoContent);
        assert_eq!(
            store.submitted_sitemap().unwrap().as_deref(),
            Some("https://example.com/sitemap.xml")
        );
    }

    #[tokio::test]
    async fn forbidden_submission_keeps_reason_and_is_not_recorded() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "User does not have sufficient permission"}
            })))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let store = StateStore::new(tmp.path().join(".hawk.lrs"));
        let response = webmaster_index(&Client::new(), &config_for(&server), &store, "t")
            .await
            .unwrap();

        assert_eq!(response.status, StatusClass::Forbidden);
        assert_eq!(
            response.error_message(),
            Some("User does not have sufficient permission")
        );
        assert_eq!(store.submitted_sitemap().unwrap(), None);
    }

    #[tokio::test]
    async fn feedback_without_submission_record_fails() {
        let server = MockServer::start().await;
        let tmp = TempDir::new().unwrap();
        let store = StateStore::new(tmp.path().join(".hawk.lrs"));

        let result = webmaster_feedback(&Client::new(), &config_for(&server), &store, "t").await;
        assert!(matches!(result, Err(NotifyError::NoSubmissionRecord)));
    }

    #[tokio::test]
    async fn feedback_reports_matching_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/webmasters/v3/sites/sc-domain%3Aexample.com/sitemaps"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sitemap": [
                    {"path": "https://example.com/old.xml", "warnings": "9", "errors": "9"},
                    {
                        "path": "https://example.com/sitemap.xml",
                        "lastSubmitted": "2024-06-09T15:35:07.000Z",
                        "lastDownloaded": "2024-06-09T16:00:00.000Z",
                        "isPending": false,
                        "warnings": "0",
                        "errors": "1",
                        "contents": [{"submitted": "5"}]
                    }
                ]
            })))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let store = StateStore::new(tmp.path().join(".hawk.lrs"));
        store
            .merge(StatePatch {
                submitted_sitemap: Some("https://example.com/sitemap.xml".into()),
                ..StatePatch::default()
            })
            .unwrap();

        let meta = webmaster_feedback(&Client::new(), &config_for(&server), &store, "t")
            .await
            .unwrap();
        assert_eq!(meta.page_counts, 5);
        assert_eq!(meta.errors, 1);
        assert_eq!(meta.last_downloaded, "04:00:00 PM - Jun 9, 2024");
    }

    #[tokio::test]
    async fn feedback_without_matching_entry_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sitemap": []})))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let store = StateStore::new(tmp.path().join(".hawk.lrs"));
        store
            .merge(StatePatch {
                submitted_sitemap: Some("https://example.com/sitemap.xml".into()),
                ..StatePatch::default()
            })
            .unwrap();

        let result = webmaster_feedback(&Client::new(), &config_for(&server), &store, "t").await;
        assert!(matches!(result, Err(NotifyError::SubmissionStatusNotFound(url)) if url.ends_with("sitemap.xml")));
    }

    // =========================================================================
    // Job/media indexing
    // =========================================================================

    #[tokio::test]
    async fn one_publish_request_per_route() {
        let server = MockServer::start().await;
        for route in SAMPLE_ROUTES {
            Mock::given(method("POST"))
                .and(path("/v3/urlNotifications:publish"))
                .and(body_json(json!({"url": route, "type": "URL_UPDATED"})))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
                .expect(1)
                .mount(&server)
                .await;
        }

        let report = job_media_index(&Client::new(), &config_for(&server), "t", &routes()).await;
        assert!(report.all_succeeded());
        assert_eq!(report.total(), SAMPLE_ROUTES.len());
    }

    #[tokio::test]
    async fn responses_keep_route_order_regardless_of_completion() {
        let server = MockServer::start().await;
        // Earlier routes answer slower, so they complete last.
        for (i, route) in SAMPLE_ROUTES.iter().enumerate() {
            let delay = Duration::from_millis(20 * (SAMPLE_ROUTES.len() - i) as u64);
            Mock::given(method("POST"))
                .and(body_json(json!({"url": route, "type": "URL_UPDATED"})))
                .respond_with(ResponseTemplate::new(200).set_delay(delay))
                .mount(&server)
                .await;
        }

        let report = job_media_index(&Client::new(), &config_for(&server), "t", &routes()).await;
        let urls: Vec<&str> = report.responses.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, SAMPLE_ROUTES);
    }

    #[tokio::test]
    async fn mixed_statuses_are_grouped() {
        let server = MockServer::start().await;
        let statuses: [u16; 5] = [200, 400, 403, 429, 500];
        for (route, status) in SAMPLE_ROUTES.iter().zip(statuses) {
            Mock::given(method("POST"))
                .and(body_json(json!({"url": route, "type": "URL_UPDATED"})))
                .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                    "error": {"code": status, "message": format!("status {status}")}
                })))
                .mount(&server)
                .await;
        }

        let mut config = config_for(&server);
        config.indexing.max_in_flight = 2;
        let report = job_media_index(&Client::new(), &config, "t", &routes()).await;

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 4);
        assert_eq!(report.group(StatusClass::BadRequest)[0].url, SAMPLE_ROUTES[1]);
        assert_eq!(
            report.group(StatusClass::BadRequest)[0].error_message(),
            Some("status 400")
        );
        assert_eq!(report.group(StatusClass::Forbidden)[0].url, SAMPLE_ROUTES[2]);
        assert_eq!(report.group(StatusClass::TooManyRequests)[0].url, SAMPLE_ROUTES[3]);
        assert_eq!(report.unexpected()[0].status, StatusClass::Unexpected(Some(500)));
    }

    #[tokio::test]
    async fn transport_failure_lands_in_unexpected_bucket() {
        let config = HawkConfig {
            endpoints: crate::config::EndpointsConfig {
                indexing: "http://127.0.0.1:9/publish".into(),
                ..Default::default()
            },
            ..test_config()
        };
        let report = job_media_index(&Client::new(), &config, "t", &routes()[..1]).await;
        assert_eq!(report.responses[0].status, StatusClass::Unexpected(None));
        assert!(!report.all_succeeded());
    }
}
