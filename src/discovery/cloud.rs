use async_trait::async_trait;
use url::Url;

use hue::legacy_api::ApiDiscoveryEntry;

use crate::discovery::BridgeLocator;
use crate::error::ApiResult;

/// Asks the vendor discovery service which bridges share our public address.
pub struct CloudLocator {
    http: reqwest::Client,
    url: Url,
}

impl CloudLocator {
    #[must_use]
    pub const fn new(http: reqwest::Client, url: Url) -> Self {
        Self { http, url }
    }
}

#[async_trait]
impl BridgeLocator for CloudLocator {
    fn name(&self) -> &'static str {
        "cloud"
    }

    async fn locate(&self) -> ApiResult<Option<String>> {
        let response = self.http.get(self.url.clone()).send().await?;
        let entries: Vec<ApiDiscoveryEntry> = response.error_for_status()?.json().await?;

        log::debug!("Cloud discovery returned {} bridges", entries.len());

        // the advertised port is https; the v1 api is plain http on port 80
        Ok(entries.into_iter().next().map(|entry| entry.internalipaddress))
    }
}
