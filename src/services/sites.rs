//! Site-creation collaborator.
//!
//! A won tender becomes a project site through whichever implementation is
//! wired in: the remote site service over HTTP, or an in-process registry.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, instrument};
use url::Url;
use uuid::Uuid;

use crate::domain::{CreatedSite, SiteDraft};

#[async_trait]
pub trait SiteCreator: Send + Sync {
    async fn create_site(&self, draft: &SiteDraft) -> Result<CreatedSite>;
}

/// Client for the external site service.
#[derive(Clone)]
pub struct HttpSiteClient {
    client: Client,
    sites_url: Url,
    token: Option<String>,
}

/// Error response from the site service.
#[derive(Debug, Deserialize)]
struct SiteErrorResponse {
    message: String,
}

/// Site service responses may arrive bare or wrapped in `data`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SiteCreatedBody {
    Wrapped { data: CreatedSite },
    Bare(CreatedSite),
}

impl HttpSiteClient {
    pub fn new(base_url: &Url, token: Option<String>, timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        let mut base = base_url.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let sites_url = base.join("sites").context("Invalid site service URL")?;

        tracing::info!(sites_url = %sites_url, "Site service client initialized");

        Ok(Self {
            client,
            sites_url,
            token,
        })
    }
}

#[async_trait]
impl SiteCreator for HttpSiteClient {
    #[instrument(skip(self, draft), fields(tender_id = %draft.source_tender_id))]
    async fn create_site(&self, draft: &SiteDraft) -> Result<CreatedSite> {
        let mut req = self.client.post(self.sites_url.clone()).json(draft);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        debug!(url = %self.sites_url, "Site service request");

        let response = req.send().await.map_err(|e| {
            error!(error = %e, "Site service request failed");
            anyhow!("site service unavailable: {}", e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<SiteErrorResponse>()
                .await
                .map(|body| body.message)
                .unwrap_or_else(|_| format!("site service error: {}", status));
            error!(status = %status, message = %message, "Site service rejected draft");
            return Err(anyhow!(message));
        }

        let body = response
            .json::<SiteCreatedBody>()
            .await
            .context("Invalid site service response")?;

        Ok(match body {
            SiteCreatedBody::Wrapped { data } => data,
            SiteCreatedBody::Bare(site) => site,
        })
    }
}

/// Keeps created sites in memory; the default when no site service is configured.
#[derive(Debug, Default)]
pub struct InMemorySiteRegistry {
    sites: RwLock<Vec<(Uuid, SiteDraft)>>,
}

impl InMemorySiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sites(&self) -> Vec<(Uuid, SiteDraft)> {
        self.sites.read().clone()
    }
}

#[async_trait]
impl SiteCreator for InMemorySiteRegistry {
    async fn create_site(&self, draft: &SiteDraft) -> Result<CreatedSite> {
        let site_id = Uuid::new_v4();
        self.sites.write().push((site_id, draft.clone()));
        tracing::info!(site_id = %site_id, tender_id = %draft.source_tender_id, "Site registered");
        Ok(CreatedSite { site_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_site_accepts_wrapped_and_bare_bodies() {
        let id = Uuid::new_v4();

        let wrapped: SiteCreatedBody =
            serde_json::from_value(serde_json::json!({ "data": { "id": id } })).unwrap();
        assert!(matches!(wrapped, SiteCreatedBody::Wrapped { data } if data.site_id == id));

        let bare: SiteCreatedBody =
            serde_json::from_value(serde_json::json!({ "site_id": id })).unwrap();
        assert!(matches!(bare, SiteCreatedBody::Bare(site) if site.site_id == id));
    }

    #[test]
    fn sites_url_keeps_base_path() {
        let base = Url::parse("https://ops.example.com/api/v1").unwrap();
        let client = HttpSiteClient::new(&base, None, 5).unwrap();
        assert_eq!(client.sites_url.as_str(), "https://ops.example.com/api/v1/sites");
    }
}
