//! Remote record-set client

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::error::SourceError;

/// Where raw record-set documents come from
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch and parse the remote document
    async fn fetch(&self) -> Result<Value, SourceError>;

    /// Endpoint description for logs and the admin page
    fn endpoint(&self) -> &str;
}

/// HTTP source configuration
#[derive(Clone, Debug)]
pub struct HttpSourceConfig {
    /// Endpoint URL, fetched with a plain GET
    pub url: String,
    /// Request timeout
    pub timeout: Duration,
    /// User-Agent header value
    pub user_agent: String,
    /// Skip TLS certificate verification
    pub skip_tls_verify: bool,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            url: "https://miusage.com/v1/challenge/1/".to_string(),
            timeout: Duration::from_secs(5),
            user_agent: concat!("tabula/", env!("CARGO_PKG_VERSION")).to_string(),
            skip_tls_verify: false,
        }
    }
}

/// Fetches the record-set document over HTTP
pub struct HttpSource {
    config: HttpSourceConfig,
    client: Client,
}

impl HttpSource {
    /// Create a new HTTP source
    pub fn new(config: HttpSourceConfig) -> Result<Self, SourceError> {
        validate_endpoint(&config.url)?;

        let mut builder = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone());

        if config.skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build()?;

        info!("Created HTTP source for {}", config.url);

        Ok(Self { config, client })
    }
}

/// Only absolute http(s) URLs with a host are accepted
fn validate_endpoint(url_str: &str) -> Result<(), SourceError> {
    let url = Url::parse(url_str).map_err(|e| SourceError::InvalidUrl(format!("{url_str}: {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(SourceError::InvalidUrl(format!(
                "scheme '{}' is not allowed, use http or https",
                scheme
            )));
        }
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(SourceError::InvalidUrl(format!("{url_str}: missing host")));
    }

    Ok(())
}

#[async_trait]
impl RecordSource for HttpSource {
    async fn fetch(&self) -> Result<Value, SourceError> {
        debug!("Fetching record set: {}", self.config.url);

        let response = self
            .client
            .get(&self.config.url)
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            return Err(SourceError::UpstreamError {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body = response.bytes().await?;
        debug!("Received {} bytes from {}", body.len(), self.config.url);

        Ok(serde_json::from_slice(&body)?)
    }

    fn endpoint(&self) -> &str {
        &self.config.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::StatusCode, routing::get};
    use std::net::SocketAddr;

    /// Serve a router on an ephemeral port and return its base URL
    async fn spawn_upstream(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn source_for(url: String) -> HttpSource {
        HttpSource::new(HttpSourceConfig {
            url,
            ..HttpSourceConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_parses_json_body() {
        let base = spawn_upstream(Router::new().route(
            "/data",
            get(|| async { r#"{"title":"T","data":{"headers":[],"rows":{}}}"# }),
        ))
        .await;

        let source = source_for(format!("{}/data", base));
        let value = source.fetch().await.unwrap();

        assert_eq!(value["title"], "T");
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_json_body() {
        let base = spawn_upstream(Router::new().route(
            "/data",
            get(|| async { "<html>maintenance</html>" }),
        ))
        .await;

        let source = source_for(format!("{}/data", base));
        let err = source.fetch().await.unwrap_err();

        assert!(matches!(err, SourceError::Parse(_)));
    }

    #[tokio::test]
    async fn test_fetch_reports_upstream_status() {
        let base = spawn_upstream(Router::new().route(
            "/data",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "{}") }),
        ))
        .await;

        let source = source_for(format!("{}/data", base));
        let err = source.fetch().await.unwrap_err();

        assert!(matches!(err, SourceError::UpstreamError { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        // Bind then drop to get a port with nothing listening
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source = source_for(format!("http://{}/data", addr));
        let err = source.fetch().await.unwrap_err();

        assert!(matches!(err, SourceError::Http(_)));
    }

    #[test]
    fn test_new_rejects_bad_endpoints() {
        for url in ["not a url", "ftp://example.com/data", "file:///etc/passwd"] {
            let result = HttpSource::new(HttpSourceConfig {
                url: url.to_string(),
                ..HttpSourceConfig::default()
            });
            assert!(
                matches!(result, Err(SourceError::InvalidUrl(_))),
                "{} should be rejected",
                url
            );
        }
    }
}
