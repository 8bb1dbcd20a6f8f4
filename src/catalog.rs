//! Paginated catalog queries.
//!
//! Every listing endpoint goes through [`CatalogClient::paginate`], which
//! walks an offset/limit cursor until the service reports the end of the
//! data, and hands back whatever it managed to collect. Listings never fail:
//! a transport or decode error ends the walk early and is reported through
//! [`Completeness`] instead.

use log::{debug, info, warn};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::time::sleep;
use url::Url;
use uuid::Uuid;

use crate::configuration::{ListingSettings, PaginationSettings};
use crate::mangadex::{ChapterRecord, Collection, Entity, MangaRecord, Record};
use crate::mangadex_client::{get_as, Transport, TransportError};

const SEARCH_INCLUDES: [&str; 3] = ["cover_art", "author", "artist"];
const SEARCH_LANGUAGES: [&str; 1] = ["en"];
const SEARCH_STATUSES: [&str; 4] = ["ongoing", "completed", "hiatus", "cancelled"];
const SEARCH_RATINGS: [&str; 3] = ["safe", "suggestive", "erotica"];
const FEED_RATINGS: [&str; 4] = ["safe", "suggestive", "erotica", "pornographic"];

/// Why a listing stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completeness {
    /// The service signalled the end of the data.
    Complete,
    /// The safety cap was reached first.
    Truncated,
    /// A request or decode failed; the reason is kept for display.
    Interrupted(String),
}

#[derive(Debug, Clone)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub completeness: Completeness,
}

impl<T> Listing<T> {
    pub fn is_complete(&self) -> bool {
        self.completeness == Completeness::Complete
    }
}

impl fmt::Display for Completeness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completeness::Complete => write!(f, "complete"),
            Completeness::Truncated => write!(f, "truncated at the safety limit"),
            Completeness::Interrupted(reason) => write!(f, "interrupted: {}", reason),
        }
    }
}

/// A listing endpoint: path, fixed query parameters and its paging limits.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub path: String,
    pub query: Vec<(String, String)>,
    pub paging: PaginationSettings,
}

impl Endpoint {
    pub fn new(path: impl Into<String>, paging: PaginationSettings) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
            paging,
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn params<I, S>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for value in values {
            self.query.push((key.to_string(), value.into()));
        }
        self
    }
}

pub struct CatalogClient<T: ?Sized> {
    transport: Arc<T>,
    base_url: String,
    listing: ListingSettings,
}

impl<T: Transport + ?Sized> CatalogClient<T> {
    pub fn new(transport: Arc<T>, base_url: &str, listing: ListingSettings) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            listing,
        }
    }

    pub fn listing_settings(&self) -> &ListingSettings {
        &self.listing
    }

    pub async fn search(&self, query: &str) -> Listing<MangaRecord> {
        let endpoint = Endpoint::new("/manga", self.listing.search)
            .param("title", query)
            .params("includes[]", SEARCH_INCLUDES)
            .params("availableTranslatedLanguage[]", SEARCH_LANGUAGES)
            .params("status[]", SEARCH_STATUSES)
            .params("contentRating[]", SEARCH_RATINGS);

        let found = self.paginate(&endpoint, |_: &MangaRecord| true).await;
        info!("Found {} manga total for '{}'", found.items.len(), query);
        found
    }

    /// Chapters in `languages`, dropping zero page chapters that have no
    /// external reading URL.
    pub async fn list_chapters(&self, manga_id: Uuid, languages: &[String]) -> Listing<ChapterRecord> {
        info!("Loading chapters for manga {}", manga_id);
        let endpoint = self.feed(manga_id, languages, self.listing.chapters);
        let chapters = self.paginate(&endpoint, ChapterRecord::is_readable).await;
        info!("Total chapters loaded: {}", chapters.items.len());
        chapters
    }

    /// Every chapter in `languages`, whatever its page count.
    pub async fn list_all_chapters(
        &self,
        manga_id: Uuid,
        languages: &[String],
    ) -> Listing<ChapterRecord> {
        info!("Loading all chapters ({}) for manga {}", languages.join(", "), manga_id);
        let endpoint = self.feed(manga_id, languages, self.listing.all_chapters);
        let chapters = self.paginate(&endpoint, |_: &ChapterRecord| true).await;
        info!("Total chapters loaded (all languages): {}", chapters.items.len());
        chapters
    }

    pub async fn get_manga(&self, manga_id: Uuid) -> Result<MangaRecord, TransportError> {
        let url = self.url(&format!("/manga/{}", manga_id), &[])?;
        let entity: Entity<MangaRecord> = get_as(self.transport.as_ref(), url).await?;
        Ok(entity.data)
    }

    pub async fn get_chapter(&self, chapter_id: Uuid) -> Result<ChapterRecord, TransportError> {
        let url = self.url(&format!("/chapter/{}", chapter_id), &[])?;
        let entity: Entity<ChapterRecord> = get_as(self.transport.as_ref(), url).await?;
        Ok(entity.data)
    }

    fn feed(&self, manga_id: Uuid, languages: &[String], paging: PaginationSettings) -> Endpoint {
        Endpoint::new(format!("/manga/{}/feed", manga_id), paging)
            .param("order[chapter]", "asc")
            .params("translatedLanguage[]", languages.iter().cloned())
            .params("contentRating[]", FEED_RATINGS)
    }

    /// Walk `endpoint` page by page and keep the records accepted by `keep`.
    ///
    /// Stops on an empty batch, once the raw records seen reach the reported
    /// total, or on a batch shorter than the page size. Never returns more
    /// than `paging.max_items` records, and never reads past that many raw
    /// records either, so filtered or repeated batches can't keep it going.
    /// Records whose id was already seen in this walk are dropped.
    pub async fn paginate<R, F>(&self, endpoint: &Endpoint, keep: F) -> Listing<R>
    where
        R: Record + serde::de::DeserializeOwned,
        F: Fn(&R) -> bool,
    {
        let paging = endpoint.paging;
        let limit = paging.page_size.max(1);
        let mut items: Vec<R> = Vec::new();
        let mut seen: HashSet<Uuid> = HashSet::new();
        let mut offset: u32 = 0;

        let completeness = loop {
            let page = match self.fetch_page(endpoint, limit, offset).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("Listing {} stopped at offset {}: {}", endpoint.path, offset, e);
                    break Completeness::Interrupted(e.to_string());
                }
            };

            let batch_len = page.data.len() as u32;
            if batch_len == 0 {
                break Completeness::Complete;
            }

            for record in page.data {
                if keep(&record) && seen.insert(record.id()) {
                    items.push(record);
                }
            }
            offset += batch_len;
            debug!(
                "{}: {} kept after {} of {} records",
                endpoint.path,
                items.len(),
                offset,
                page.total
            );

            let exhausted = offset >= page.total || batch_len < limit;
            let capped = items.len() > paging.max_items
                || (!exhausted && (items.len() == paging.max_items || offset as usize >= paging.max_items));
            if capped {
                warn!(
                    "Reached safety limit of {} records for {}",
                    paging.max_items, endpoint.path
                );
                items.truncate(paging.max_items);
                break Completeness::Truncated;
            }
            if exhausted {
                break Completeness::Complete;
            }

            sleep(paging.delay()).await;
        };

        Listing {
            items,
            completeness,
        }
    }

    async fn fetch_page<R>(
        &self,
        endpoint: &Endpoint,
        limit: u32,
        offset: u32,
    ) -> Result<Collection<R>, TransportError>
    where
        R: serde::de::DeserializeOwned,
    {
        let mut query = endpoint.query.clone();
        query.push(("limit".into(), limit.to_string()));
        query.push(("offset".into(), offset.to_string()));
        let url = self.url(&endpoint.path, &query)?;
        get_as(self.transport.as_ref(), url).await
    }

    fn url(&self, path: &str, query: &[(String, String)]) -> Result<Url, TransportError> {
        let raw = format!("{}{}", self.base_url, path);
        let mut url = Url::parse(&raw).map_err(|_| TransportError::InvalidUrl(raw))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }
}
