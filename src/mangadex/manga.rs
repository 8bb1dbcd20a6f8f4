use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::Record;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct MangaRecord {
    pub id: Uuid,
    #[serde(default)]
    pub attributes: MangaAttributes,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MangaAttributes {
    /// Language code to display title.
    pub title: BTreeMap<String, String>,
    pub status: Option<String>,
    pub content_rating: Option<String>,
}

impl MangaRecord {
    /// English title, else the first title available.
    pub fn display_title(&self) -> &str {
        let titles = &self.attributes.title;
        titles
            .get("en")
            .or_else(|| titles.values().next())
            .map(String::as_str)
            .unwrap_or("Unknown Title")
    }
}

impl Record for MangaRecord {
    fn id(&self) -> Uuid {
        self.id
    }
}
