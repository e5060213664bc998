use crate::error::{FetchError, Result};
use crate::listing::{ListingPage, ListingSummary, unwrap_workflow_envelope};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://api.n8n.io";
pub const DEFAULT_ROWS_PER_PAGE: u32 = 100;
const USER_AGENT: &str = concat!("tmplsync/", env!("CARGO_PKG_VERSION"));

/// Client for the public template search and detail endpoints.
///
/// Requests are issued one at a time. Connection-level failures, including a
/// body cut off mid-stream, are retried with a fixed delay; a complete HTTP
/// response is not, whatever its status.
pub struct TemplateClient {
    client: Client,
    api_base: Url,
    max_attempts: u32,
    listing_retry_delay: Duration,
    detail_retry_delay: Duration,
}

impl TemplateClient {
    pub fn new(api_base: &str) -> Result<Self> {
        Self::with_timeout(api_base, 60)
    }

    pub fn with_timeout(api_base: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs / 2))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            api_base: parse_base(api_base)?,
            max_attempts: 3,
            listing_retry_delay: Duration::from_secs(2),
            detail_retry_delay: Duration::from_secs(1),
        })
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_retry_delays(mut self, listing: Duration, detail: Duration) -> Self {
        self.listing_retry_delay = listing;
        self.detail_retry_delay = detail;
        self
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    /// Public page URL for a template, used as the record's source URL.
    pub fn template_page_url(id: &str) -> String {
        format!("https://n8n.io/workflows/{}", id)
    }

    /// Fetch one page of the search listing.
    pub async fn fetch_page(&self, page: u32, rows: u32) -> Result<ListingPage> {
        let url = self.endpoint("templates/search")?;
        let query = [("page", page.to_string()), ("rows", rows.to_string())];
        let (status, body) = self
            .get_with_retry(&url, &query, self.listing_retry_delay)
            .await?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        ListingPage::from_slice(&body)
            .map_err(|e| FetchError::ParseError(format!("listing page {}: {}", page, e)))
    }

    /// Page through the whole listing. Stops on an empty page or once the
    /// advertised total has been collected.
    pub async fn fetch_all_listings(&self, rows_per_page: u32) -> Result<Vec<ListingSummary>> {
        let rows = rows_per_page.max(1);
        let mut out = Vec::new();
        let mut page = 1;

        loop {
            let data = self.fetch_page(page, rows).await?;
            let fetched = data.workflows.len();
            out.extend(data.workflows);
            debug!(
                "Listing page {} returned {} rows ({} / {})",
                page,
                fetched,
                out.len(),
                data.total_workflows
            );

            if fetched == 0 || out.len() >= data.total_workflows {
                break;
            }
            page += 1;
        }

        info!("Fetched {} listing entries", out.len());
        Ok(out)
    }

    /// Raw detail response for one template.
    ///
    /// `Ok(None)` when the API answers with a non-200 status or a body that
    /// is not JSON.
    pub async fn fetch_detail_payload(&self, template_id: &str) -> Result<Option<Value>> {
        let url = self.endpoint(&format!("templates/workflows/{}", template_id))?;
        let (status, body) = self
            .get_with_retry(&url, &[], self.detail_retry_delay)
            .await?;

        if status != StatusCode::OK {
            debug!("Detail {} returned {}", template_id, status);
            return Ok(None);
        }

        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                debug!("Detail {} is not JSON: {}", template_id, e);
                Ok(None)
            }
        }
    }

    /// The workflow graph (`nodes`, `connections`, ...) of one template.
    pub async fn fetch_workflow(&self, template_id: &str) -> Result<Option<Value>> {
        Ok(self
            .fetch_detail_payload(template_id)
            .await?
            .as_ref()
            .and_then(unwrap_workflow_envelope))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.api_base
            .join(path)
            .map_err(|e| FetchError::InvalidUrl(format!("{}{}: {}", self.api_base, path, e)))
    }

    /// GET `url` and read the whole body. A connection that drops while the
    /// body is streaming is retried like a failed connect.
    async fn get_with_retry(
        &self,
        url: &Url,
        query: &[(&str, String)],
        delay: Duration,
    ) -> Result<(StatusCode, Vec<u8>)> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let sent = self
                .client
                .get(url.clone())
                .query(query)
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .await;

            // A body cut off after the headers is always retried.
            let (err, transient) = match sent {
                Ok(response) => {
                    let status = response.status();
                    match response.bytes().await {
                        Ok(body) => return Ok((status, body.to_vec())),
                        Err(e) => (FetchError::from(e), true),
                    }
                }
                Err(e) => {
                    let err = FetchError::from(e);
                    let transient = err.is_transient();
                    (err, transient)
                }
            };

            if !transient {
                return Err(err);
            }
            if attempt >= self.max_attempts {
                return Err(FetchError::RetriesExhausted {
                    url: url.to_string(),
                    attempts: attempt,
                    last_error: err.to_string(),
                });
            }
            warn!(
                "Request to {} failed (attempt {}/{}): {}",
                url, attempt, self.max_attempts, err
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Parse a base URL and make sure `join` appends rather than replaces the
/// last path segment.
pub(crate) fn parse_base(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", raw, e)))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn listing_row(id: u64) -> Value {
        json!({ "id": id, "name": format!("Template {}", id), "description": "d", "totalViews": id * 10 })
    }

    #[test]
    fn base_url_keeps_path_prefix() {
        let base = parse_base("http://localhost:9000/api").unwrap();
        assert_eq!(
            base.join("templates/search").unwrap().as_str(),
            "http://localhost:9000/api/templates/search"
        );
        assert!(parse_base("not a url").is_err());
    }

    #[tokio::test]
    async fn test_fetch_all_listings_paginates_until_total() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/templates/search"))
            .and(query_param("page", "1"))
            .and(query_param("rows", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalWorkflows": 3,
                "workflows": [listing_row(1), listing_row(2)]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/templates/search"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalWorkflows": 3,
                "workflows": [listing_row(3)]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = TemplateClient::new(&mock_server.uri()).unwrap();
        let listings = client.fetch_all_listings(2).await.unwrap();

        assert_eq!(listings.len(), 3);
        assert_eq!(listings[2].id, 3);
        assert_eq!(listings[2].total_views, 30);
    }

    #[tokio::test]
    async fn test_fetch_all_listings_stops_on_empty_page() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/templates/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalWorkflows": 500,
                "workflows": []
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = TemplateClient::new(&mock_server.uri()).unwrap();
        let listings = client.fetch_all_listings(50).await.unwrap();
        assert!(listings.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_page_server_error_is_reported() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/templates/search"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let client = TemplateClient::new(&mock_server.uri()).unwrap();
        let err = client.fetch_page(1, 10).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_fetch_workflow_unwraps_envelope() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/templates/workflows/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "workflow": {
                    "name": "Forty two",
                    "workflow": {
                        "nodes": [{ "type": "n8n-nodes-base.slack" }],
                        "connections": {}
                    }
                }
            })))
            .mount(&mock_server)
            .await;

        let client = TemplateClient::new(&mock_server.uri()).unwrap();
        let workflow = client.fetch_workflow("42").await.unwrap().unwrap();
        assert_eq!(workflow["nodes"][0]["type"], "n8n-nodes-base.slack");
    }

    #[tokio::test]
    async fn test_fetch_workflow_missing_template_is_none() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/templates/workflows/404"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/templates/workflows/500"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&mock_server)
            .await;

        let client = TemplateClient::new(&mock_server.uri()).unwrap();
        assert!(client.fetch_workflow("404").await.unwrap().is_none());
        assert!(client.fetch_workflow("500").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_host_exhausts_retries() {
        // Nothing listens on port 9 locally.
        let client = TemplateClient::with_timeout("http://127.0.0.1:9", 2)
            .unwrap()
            .with_retry_delays(Duration::from_millis(1), Duration::from_millis(1));

        let err = client.fetch_workflow("1").await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::RetriesExhausted { attempts: 3, .. }
        ));
    }

    #[tokio::test]
    async fn test_fetch_all_listings_keeps_rows_with_null_fields() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/templates/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalWorkflows": 3,
                "workflows": [
                    { "id": 1, "name": "ok" },
                    { "id": 2, "name": null, "totalViews": null },
                    { "name": "no id at all" }
                ]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = TemplateClient::new(&mock_server.uri()).unwrap();
        let listings = client.fetch_all_listings(50).await.unwrap();

        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].name, "ok");
        assert_eq!(listings[1].id, 2);
        assert_eq!(listings[1].name, "");
    }

    /// Raw HTTP server whose first response declares more body than it sends
    /// before closing the socket. Later connections get the full body.
    async fn truncating_server(body: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = connections.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;

                let sent = if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    &body[..body.len() / 2]
                } else {
                    body
                };
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    sent
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}", addr), connections)
    }

    #[tokio::test]
    async fn test_listing_body_cut_off_mid_stream_is_retried() {
        let (base, connections) =
            truncating_server(r#"{"totalWorkflows":1,"workflows":[{"id":9,"name":"Nine"}]}"#).await;
        let client = TemplateClient::with_timeout(&base, 5)
            .unwrap()
            .with_retry_delays(Duration::from_millis(1), Duration::from_millis(1));

        let listings = client.fetch_all_listings(10).await.unwrap();

        assert_eq!(listings, vec![ListingSummary::new(9, "Nine")]);
        assert_eq!(connections.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_detail_body_cut_off_mid_stream_is_retried() {
        let (base, connections) = truncating_server(
            r#"{"workflow":{"workflow":{"nodes":[{"type":"n8n-nodes-base.cron"}],"connections":{}}}}"#,
        )
        .await;
        let client = TemplateClient::with_timeout(&base, 5)
            .unwrap()
            .with_retry_delays(Duration::from_millis(1), Duration::from_millis(1));

        let workflow = client.fetch_workflow("5").await.unwrap().unwrap();

        assert_eq!(workflow["nodes"][0]["type"], "n8n-nodes-base.cron");
        assert_eq!(connections.load(Ordering::SeqCst), 2);
    }
}
