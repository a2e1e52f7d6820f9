//! Authenticated HTTP client for the FDR schema-events API.
//!
//! Wraps a `reqwest::Client` with a bearer token and maps HTTP statuses onto
//! the [`FdrError`] taxonomy: 401 is an authentication error, 403 a
//! permission error, anything else unsuccessful is a retryable transport
//! error.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument};
use url::Url;

use fdrdict_shared::{CatalogEntry, Credentials, FdrError, FetchConfig, Result};

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("fdrdict/", env!("CARGO_PKG_VERSION"));

const TOKEN_PATH: &str = "oauth2/token";
const QUERY_PATH: &str = "fdr/queries/schema-events/v1";
const ENTITY_PATH: &str = "fdr/entities/schema-events/v1";

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

/// One page of ids from the query endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct IdPage {
    pub ids: Vec<String>,
    /// Total the server claims to hold. Advisory only.
    pub reported_total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    meta: Meta,
    #[serde(default)]
    resources: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Default, Deserialize)]
struct Pagination {
    #[serde(default)]
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct EntityResponse {
    #[serde(default)]
    resources: Option<Vec<CatalogEntry>>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Option<Vec<ApiError>>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

// ---------------------------------------------------------------------------
// FalconClient
// ---------------------------------------------------------------------------

/// A client holding a bearer token for the schema-events endpoints.
///
/// Cheap to clone: the underlying connection pool is shared.
#[derive(Clone)]
pub struct FalconClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl std::fmt::Debug for FalconClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FalconClient")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"<redacted>")
            .finish()
    }
}

impl FalconClient {
    /// Exchange client credentials for a bearer token.
    ///
    /// Rejected credentials (400, 401, 403 from the token endpoint) surface as
    /// [`FdrError::Authentication`].
    #[instrument(skip_all, fields(base_url = %config.base_url))]
    pub async fn authenticate(config: &FetchConfig, credentials: &Credentials) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FdrError::transport(format!("failed to build HTTP client: {e}")))?;

        let url = endpoint(&config.base_url, TOKEN_PATH)?;
        let response = http
            .post(url.as_str())
            .form(&[
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| FdrError::transport(format!("{url}: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FdrError::transport(format!("{url}: body read failed: {e}")))?;

        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Err(FdrError::Authentication(format!(
                "token request rejected (HTTP {}): {}",
                status.as_u16(),
                error_message(&body)
            )));
        }
        if !status.is_success() {
            return Err(FdrError::Transport {
                message: format!("{url}: HTTP {status}"),
                status: Some(status.as_u16()),
                retry_after: None,
            });
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| FdrError::Authentication(format!("malformed token response: {e}")))?;

        info!("authenticated");

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            token: token.access_token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetch one page of ids from the query endpoint.
    pub async fn query_page(&self, limit: u32, offset: u64) -> Result<IdPage> {
        let mut url = endpoint(&self.base_url, QUERY_PATH)?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());

        let body = self.get(&url).await?;
        let parsed: QueryResponse = serde_json::from_str(&body)
            .map_err(|e| FdrError::parse(format!("{url}: invalid query response: {e}")))?;

        let ids = parsed
            .resources
            .unwrap_or_default()
            .into_iter()
            .map(|value| match value {
                Value::String(s) => Ok(s),
                Value::Number(n) => Ok(n.to_string()),
                other => Err(FdrError::parse(format!("{url}: unexpected id {other}"))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(IdPage {
            ids,
            reported_total: parsed.meta.pagination.and_then(|p| p.total),
        })
    }

    /// Fetch the full record for one id.
    pub async fn get_entry(&self, id: &str) -> Result<CatalogEntry> {
        let mut url = endpoint(&self.base_url, ENTITY_PATH)?;
        url.query_pairs_mut().append_pair("ids", id);

        let body = self.get(&url).await?;
        // A body that does not decode is treated like a dropped connection.
        let parsed: EntityResponse = serde_json::from_str(&body)
            .map_err(|e| FdrError::transport(format!("{url}: undecodable entity response: {e}")))?;

        parsed
            .resources
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| FdrError::DetailFetch {
                id: id.to_string(),
                message: "no resource returned".into(),
            })
    }

    async fn get(&self, url: &Url) -> Result<String> {
        debug!(%url, "GET");

        let response = self
            .http
            .get(url.as_str())
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| FdrError::transport(format!("{url}: {e}")))?;

        let status = response.status();
        let retry_after = retry_after_hint(response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| FdrError::transport(format!("{url}: body read failed: {e}")))?;

        classify(url, status, retry_after, &body)?;
        Ok(body)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn endpoint(base: &Url, path: &str) -> Result<Url> {
    base.join(path)
        .map_err(|e| FdrError::config(format!("invalid API base URL {base}: {e}")))
}

/// Map a non-success status onto the error taxonomy.
fn classify(
    url: &Url,
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    let detail = error_message(body);
    match status {
        StatusCode::UNAUTHORIZED => Err(FdrError::Authentication(format!(
            "{url}: HTTP 401: {detail}"
        ))),
        StatusCode::FORBIDDEN => Err(FdrError::Permission(format!(
            "{url}: HTTP 403: {detail}. The API client needs the FDR read scope"
        ))),
        _ => Err(FdrError::Transport {
            message: format!("{url}: HTTP {status}"),
            status: Some(status.as_u16()),
            retry_after,
        }),
    }
}

/// First message from an API error body, or the status-less fallback.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.errors)
        .and_then(|errors| errors.into_iter().map(|e| e.message).find(|m| !m.is_empty()))
        .unwrap_or_else(|| "no error detail".to_string())
}

/// How long the server asked us to wait, if it said so.
///
/// `X-RateLimit-RetryAfter` carries an absolute epoch second; `Retry-After`
/// carries a relative number of seconds.
fn retry_after_hint(headers: &HeaderMap) -> Option<Duration> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
    };

    if let Some(epoch) = header("x-ratelimit-retryafter") {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        return Some(Duration::from_secs(epoch.saturating_sub(now)));
    }
    header("retry-after").map(Duration::from_secs)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use reqwest::header::HeaderValue;

    pub(crate) const TEST_TOKEN: &str = "test-token";

    pub(crate) fn test_config(server: &wiremock::MockServer) -> FetchConfig {
        FetchConfig {
            base_url: Url::parse(&server.uri()).unwrap(),
            page_size: 200,
            max_detail_retries: 2,
            worker_concurrency: 4,
            retry_base_delay: Duration::from_millis(1),
            retry_multiplier: 2.0,
            retry_max_delay: Duration::from_millis(5),
            request_timeout: Duration::from_secs(5),
        }
    }

    pub(crate) fn test_credentials() -> Credentials {
        Credentials {
            client_id: "id".into(),
            client_secret: "secret".into(),
        }
    }

    pub(crate) async fn mount_token(server: &wiremock::MockServer) {
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/oauth2/token"))
            .respond_with(wiremock::ResponseTemplate::new(201).set_body_json(
                serde_json::json!({
                    "access_token": TEST_TOKEN,
                    "token_type": "bearer",
                    "expires_in": 1799
                }),
            ))
            .mount(server)
            .await;
    }

    pub(crate) async fn connected(server: &wiremock::MockServer) -> FalconClient {
        mount_token(server).await;
        FalconClient::authenticate(&test_config(server), &test_credentials())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_authenticate_sends_form_credentials() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/oauth2/token"))
            .and(wiremock::matchers::body_string_contains("client_id=id"))
            .and(wiremock::matchers::body_string_contains("client_secret=secret"))
            .respond_with(
                wiremock::ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({"access_token": "abc"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = FalconClient::authenticate(&test_config(&server), &test_credentials())
            .await
            .unwrap();
        assert_eq!(client.token, "abc");
        assert!(!format!("{client:?}").contains("abc"));
    }

    #[tokio::test]
    async fn test_authenticate_rejected() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/oauth2/token"))
            .respond_with(wiremock::ResponseTemplate::new(401).set_body_json(
                serde_json::json!({"errors": [{"code": 401, "message": "access denied, invalid client"}]}),
            ))
            .mount(&server)
            .await;

        let err = FalconClient::authenticate(&test_config(&server), &test_credentials())
            .await
            .unwrap_err();
        match err {
            FdrError::Authentication(msg) => assert!(msg.contains("invalid client")),
            other => panic!("expected authentication error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_query_page_parses_ids_and_total() {
        let server = wiremock::MockServer::start().await;
        let client = connected(&server).await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/fdr/queries/schema-events/v1"))
            .and(wiremock::matchers::query_param("limit", "3"))
            .and(wiremock::matchers::query_param("offset", "6"))
            .and(wiremock::matchers::header("authorization", "Bearer test-token"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(
                serde_json::json!({
                    "meta": {"pagination": {"offset": 6, "limit": 3, "total": 8}},
                    "resources": ["7", 8]
                }),
            ))
            .mount(&server)
            .await;

        let page = client.query_page(3, 6).await.unwrap();
        assert_eq!(page.ids, vec!["7".to_string(), "8".to_string()]);
        assert_eq!(page.reported_total, Some(8));
    }

    #[tokio::test]
    async fn test_query_page_null_resources_is_empty() {
        let server = wiremock::MockServer::start().await;
        let client = connected(&server).await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/fdr/queries/schema-events/v1"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"meta": {}, "resources": null})),
            )
            .mount(&server)
            .await;

        let page = client.query_page(10, 0).await.unwrap();
        assert!(page.ids.is_empty());
        assert_eq!(page.reported_total, None);
    }

    #[tokio::test]
    async fn test_status_classification() {
        let server = wiremock::MockServer::start().await;
        let client = connected(&server).await;

        for (id, status) in [("401", 401), ("403", 403), ("500", 500), ("429", 429)] {
            wiremock::Mock::given(wiremock::matchers::method("GET"))
                .and(wiremock::matchers::path("/fdr/entities/schema-events/v1"))
                .and(wiremock::matchers::query_param("ids", id))
                .respond_with(
                    wiremock::ResponseTemplate::new(status).insert_header("Retry-After", "2"),
                )
                .mount(&server)
                .await;
        }

        assert!(matches!(
            client.get_entry("401").await,
            Err(FdrError::Authentication(_))
        ));
        assert!(matches!(
            client.get_entry("403").await,
            Err(FdrError::Permission(_))
        ));
        assert!(matches!(
            client.get_entry("500").await,
            Err(FdrError::Transport {
                status: Some(500),
                ..
            })
        ));
        match client.get_entry("429").await {
            Err(FdrError::Transport {
                status,
                retry_after,
                ..
            }) => {
                assert_eq!(status, Some(429));
                assert_eq!(retry_after, Some(Duration::from_secs(2)));
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_entry_returns_first_resource() {
        let server = wiremock::MockServer::start().await;
        let client = connected(&server).await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/fdr/entities/schema-events/v1"))
            .and(wiremock::matchers::query_param("ids", "42"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(
                serde_json::json!({
                    "resources": [{
                        "id": "42",
                        "name": "DnsRequest",
                        "description": "A DNS lookup was made.",
                        "platform": "windows",
                        "fields": []
                    }]
                }),
            ))
            .mount(&server)
            .await;

        let entry = client.get_entry("42").await.unwrap();
        assert_eq!(entry.name, "DnsRequest");
        assert_eq!(entry.platform, "windows");
    }

    #[tokio::test]
    async fn test_get_entry_empty_resources() {
        let server = wiremock::MockServer::start().await;
        let client = connected(&server).await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/fdr/entities/schema-events/v1"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"resources": []})),
            )
            .mount(&server)
            .await;

        let err = client.get_entry("9").await.unwrap_err();
        assert!(matches!(err, FdrError::DetailFetch { ref id, .. } if id == "9"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_get_entry_garbled_body_is_retryable() {
        let server = wiremock::MockServer::start().await;
        let client = connected(&server).await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/fdr/entities/schema-events/v1"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("{\"resources\": [{\"id\""))
            .mount(&server)
            .await;

        let err = client.get_entry("9").await.unwrap_err();
        assert!(matches!(err, FdrError::Transport { status: None, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_retry_after_hint_prefers_epoch_header() {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-RateLimit-RetryAfter",
            HeaderValue::from_str(&(now + 30).to_string()).unwrap(),
        );
        headers.insert("Retry-After", HeaderValue::from_static("1"));

        let hint = retry_after_hint(&headers).unwrap();
        assert!(hint >= Duration::from_secs(28) && hint <= Duration::from_secs(30));
    }

    #[test]
    fn test_retry_after_hint_past_epoch_is_zero() {
        let mut headers = HeaderMap::new();
        headers.insert("X-RateLimit-RetryAfter", HeaderValue::from_static("1000"));
        assert_eq!(retry_after_hint(&headers), Some(Duration::ZERO));
        assert_eq!(retry_after_hint(&HeaderMap::new()), None);
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"errors":[{"code":403,"message":"access denied, authorization failed"}]}"#;
        assert_eq!(error_message(body), "access denied, authorization failed");
        assert_eq!(error_message("<html>"), "no error detail");
    }
}
