use serde::Deserialize;
use url::Url;

/// Page manifest returned by `/at-home/server/{chapterId}`.
///
/// Every field is optional so a partial manifest decodes and is rejected by
/// [`AtHomeServer::page_urls`] instead of failing the decode.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AtHomeServer {
    pub base_url: Option<String>,
    pub chapter: Option<AtHomeChapter>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AtHomeChapter {
    pub hash: Option<String>,
    pub data: Vec<String>,
}

impl AtHomeServer {
    /// Full-quality page URLs in reading order, or `None` when the manifest
    /// lacks a base URL, a hash or any page.
    pub fn page_urls(&self) -> Option<Vec<Url>> {
        let base_url = self.base_url.as_deref().filter(|b| !b.is_empty())?;
        let chapter = self.chapter.as_ref()?;
        let hash = chapter.hash.as_deref().filter(|h| !h.is_empty())?;
        if chapter.data.is_empty() {
            return None;
        }

        let base_url = base_url.trim_end_matches('/');
        chapter
            .data
            .iter()
            .map(|filename| {
                Url::parse(&format!(
                    "{base_url}/{quality_mode}/{chapter_hash}/{page_filename}",
                    quality_mode = "data",
                    chapter_hash = hash,
                    page_filename = filename
                ))
                .ok()
            })
            .collect()
    }
}
