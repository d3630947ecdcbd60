use anyhow::{Context, Result};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Method, StatusCode, Url};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::error::ErrorResponse;

/// Characters escaped inside a single path segment
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_');

/// Thin JSON-over-HTTP client shared by the gateway and registry clients.
///
/// Requests are never retried: a failed call surfaces immediately and the
/// orchestrator decides what to do with it.
#[derive(Clone)]
pub struct HttpClient {
    base_url: Url,
    http: reqwest::Client,
    token: Option<String>,
    user_agent: String,
}

impl HttpClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url).context("Invalid base URL")?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url,
            http,
            token,
            user_agent: format!("planb/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Join escaped path segments and query pairs onto the base URL
    pub fn build_url(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url> {
        let path = segments
            .iter()
            .map(|s| utf8_percent_encode(s, SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/");
        let mut url = self.base_url.join(&path).with_context(|| {
            format!("Failed to join base_url={} with path={}", self.base_url, path)
        })?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Send one request. A 404 yields `None`, any other non-success status
    /// is an error carrying the server's explanation.
    pub async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
    ) -> Result<Option<Vec<u8>>> {
        let req_id = Uuid::new_v4().to_string();
        let mut req = self.http.request(method.clone(), url.clone());
        req = req.header("user-agent", &self.user_agent);
        req = req.header("x-request-id", &req_id);
        if let Some(token) = &self.token {
            req = req.header("authorization", format!("Bearer {}", token));
        }
        if let Some(b) = body {
            req = req.json(b);
        }

        debug!("HTTP {} {} (request {})", method, url, req_id);
        let resp = req.send().await.context("Request failed")?;
        let status = resp.status();

        if status.is_success() {
            let bytes = resp.bytes().await.context("Failed to read response body")?;
            return Ok(Some(bytes.to_vec()));
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let bytes = resp.bytes().await.unwrap_or_default();
        match serde_json::from_slice::<ErrorResponse>(&bytes) {
            Ok(e) => anyhow::bail!(
                "HTTP {} {} failed: status={} {} request_id={}",
                method,
                url,
                status.as_u16(),
                e.summary(),
                e.request_id.unwrap_or(req_id)
            ),
            Err(_) => anyhow::bail!(
                "HTTP {} {} failed: status={} body={} request_id={}",
                method,
                url,
                status.as_u16(),
                String::from_utf8_lossy(&bytes),
                req_id
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> HttpClient {
        HttpClient::new(base, None, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_base_url_keeps_path_prefix() {
        let client = client("https://gateway.example.org/cloud");
        let url = client.build_url(&["api", "regions", "eu-west-1"], &[]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://gateway.example.org/cloud/api/regions/eu-west-1"
        );
    }

    #[test]
    fn test_segments_are_escaped() {
        let client = client("http://127.0.0.1:8080");
        let url = client
            .build_url(&["api", "hosted-zones", "db/example.org."], &[])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8080/api/hosted-zones/db%2Fexample.org."
        );
    }

    #[test]
    fn test_query_pairs() {
        let client = client("http://127.0.0.1:8080/");
        let url = client
            .build_url(&["api", "images"], &[("pattern", "*Taupage-AMI-*")])
            .unwrap();
        assert_eq!(url.query(), Some("pattern=*Taupage-AMI-*"));
    }
}
