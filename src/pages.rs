use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use url::Url;
use uuid::Uuid;

use crate::configuration::DownloadSettings;
use crate::mangadex::AtHomeServer;
use crate::mangadex_client::{get_as, Transport};

/// Turns a chapter id into its page URLs through the at-home manifest.
pub struct PageResolver<T: ?Sized> {
    transport: Arc<T>,
    base_url: String,
}

impl<T: Transport + ?Sized> PageResolver<T> {
    pub fn new(transport: Arc<T>, base_url: &str) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Page URLs in reading order. Empty when the manifest can't be fetched
    /// or is missing its base URL, hash or page list.
    pub async fn resolve_pages(&self, chapter_id: Uuid) -> Vec<Url> {
        let raw = format!("{}/at-home/server/{}", self.base_url, chapter_id);
        let url = match Url::parse(&raw) {
            Ok(url) => url,
            Err(e) => {
                warn!("Invalid at-home url {}: {}", raw, e);
                return Vec::new();
            }
        };

        let server: AtHomeServer = match get_as(self.transport.as_ref(), url).await {
            Ok(server) => server,
            Err(e) => {
                warn!("Error getting chapter pages for {}: {}", chapter_id, e);
                return Vec::new();
            }
        };

        server.page_urls().unwrap_or_default()
    }
}

/// Downloads single pages with a fixed number of attempts.
pub struct PageFetcher<T: ?Sized> {
    transport: Arc<T>,
    attempts: u32,
    retry_delay: Duration,
    timeout: Duration,
}

impl<T: Transport + ?Sized> PageFetcher<T> {
    pub fn new(transport: Arc<T>, settings: &DownloadSettings) -> Self {
        Self {
            transport,
            attempts: settings.attempts.max(1),
            retry_delay: settings.retry_delay(),
            timeout: settings.timeout(),
        }
    }

    /// Raw page bytes, or `None` once every attempt has failed.
    pub async fn fetch_page(&self, url: &Url) -> Option<Vec<u8>> {
        let mut attempt = 1;
        loop {
            match self.transport.get_bytes(url.clone(), self.timeout).await {
                Ok(bytes) => {
                    debug!("Fetched {} ({} bytes)", url, bytes.len());
                    return Some(bytes);
                }
                Err(e) => warn!("Attempt {} failed for page {}: {}", attempt, url, e),
            }
            if attempt >= self.attempts {
                return None;
            }
            attempt += 1;
            sleep(self.retry_delay).await;
        }
    }
}
