//! Release feed client.
//!
//! Queries a GitHub-style "latest release" endpoint and turns its
//! `tag_name` (for example `release/v18.8.4`) into a [`Version`].

use crate::config::ReleaseConfig;
use crate::error::{Result, SkillError};
use crate::version::{Version, parse_release_tag};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Source of the latest published core version.
#[async_trait]
pub trait ReleaseFeed: Send + Sync {
    /// Fetch and parse the latest release.
    async fn latest_version(&self) -> Result<Version>;
}

/// Body of the latest-release endpoint; only the tag is needed.
#[derive(Debug, Deserialize)]
struct ReleaseBody {
    tag_name: String,
}

/// HTTP release feed backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpReleaseFeed {
    client: reqwest::Client,
    url: String,
    tag_prefix: String,
}

impl HttpReleaseFeed {
    /// Build a feed client from the release section of the skill config.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &ReleaseConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SkillError::Release(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: config.feed_url.clone(),
            tag_prefix: config.tag_prefix.clone(),
        })
    }

    /// Endpoint this feed queries.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ReleaseFeed for HttpReleaseFeed {
    async fn latest_version(&self) -> Result<Version> {
        let resp = self
            .client
            .get(&self.url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| SkillError::Release(format!("request to {} failed: {e}", self.url)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SkillError::Release(format!(
                "{} returned HTTP {status}",
                self.url
            )));
        }

        let body: ReleaseBody = resp
            .json()
            .await
            .map_err(|e| SkillError::Release(format!("invalid release body: {e}")))?;

        tracing::debug!(tag = %body.tag_name, "latest release tag");
        parse_release_tag(&body.tag_name, &self.tag_prefix)
    }
}
