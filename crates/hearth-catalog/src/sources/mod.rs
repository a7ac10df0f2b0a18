//! The tiers of the catalog fallback chain.

mod scrape;
mod static_list;
mod structured;

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::entry::CatalogEntry;
use crate::error::CatalogError;

pub use scrape::ScrapeSource;
pub use static_list::static_catalog;
pub use structured::StructuredSource;

/// One network source of catalog entries.
#[async_trait]
pub trait CatalogTier: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    /// Fetch and normalize every entry this tier can see.
    async fn fetch(&self) -> Result<Vec<CatalogEntry>, CatalogError>;
}

/// GET `url` and return the body of a successful response.
pub(crate) async fn fetch_text(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<String, CatalogError> {
    debug!("Fetching {}", url);
    let response = client.get(url).timeout(timeout).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CatalogError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response.text().await?)
}
