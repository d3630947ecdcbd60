use anyhow::{Context, Result};
use async_trait::async_trait;
use planb_orchestrator::error::ProviderError;
use planb_orchestrator::provider::{ArtifactResolver, ProviderResult};
use reqwest::Method;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::http_client::HttpClient;

pub const DEFAULT_REGISTRY_URL: &str = "https://registry.opensource.zalan.do";

/// Artifacts are published under this team
const TEAM: &str = "stups";

#[derive(Debug, Clone, Deserialize)]
struct ArtifactTag {
    name: String,
}

/// Docker registry client used to find the latest artifact tag
pub struct RegistryClient {
    client: HttpClient,
    host: String,
}

impl RegistryClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = HttpClient::new(base_url, None, timeout)?;
        let url = client.base_url();
        let name = url.host_str().context("Registry URL has no host")?;
        // default ports are not reported, so only explicit ones are kept
        let host = match url.port() {
            Some(port) => format!("{}:{}", name, port),
            None => name.to_string(),
        };
        Ok(Self { client, host })
    }

    /// Host name, plus port when one was given, used in image references
    pub fn host(&self) -> &str {
        &self.host
    }
}

/// The registry lists tags oldest first
fn latest_tag(tags: Vec<ArtifactTag>) -> Option<String> {
    tags.into_iter().last().map(|t| t.name)
}

#[async_trait]
impl ArtifactResolver for RegistryClient {
    async fn latest_version(&self, artifact_name: &str) -> ProviderResult<Option<String>> {
        let fail = |e: anyhow::Error| ProviderError::new("latest_version", &self.host, format!("{:#}", e));

        let url = self
            .client
            .build_url(&["teams", TEAM, "artifacts", artifact_name, "tags"], &[])
            .map_err(fail)?;
        debug!("Looking up tags of {} at {}", artifact_name, url);

        let Some(bytes) = self.client.send(Method::GET, url, None).await.map_err(fail)? else {
            return Ok(None);
        };
        let tags: Vec<ArtifactTag> = serde_json::from_slice(&bytes)
            .context("Failed to parse artifact tags")
            .map_err(fail)?;
        Ok(latest_tag(tags))
    }
}
