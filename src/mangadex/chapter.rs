use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::Record;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ChapterRecord {
    pub id: Uuid,
    #[serde(default)]
    pub attributes: ChapterAttributes,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ChapterAttributes {
    pub volume: Option<String>,
    pub chapter: Option<String>,
    pub title: Option<String>,
    pub pages: Option<u32>,
    pub translated_language: String,
    pub external_url: Option<String>,
}

impl ChapterRecord {
    /// Chapter label used for filenames and history.
    pub fn label(&self) -> &str {
        self.attributes.chapter.as_deref().unwrap_or("Unknown")
    }

    pub fn external_url(&self) -> Option<&str> {
        self.attributes
            .external_url
            .as_deref()
            .filter(|u| !u.is_empty())
    }

    /// Chapters hosted elsewhere legitimately report zero pages; only a zero
    /// page chapter with nowhere to read it is dropped.
    pub fn is_readable(&self) -> bool {
        self.attributes.pages != Some(0) || self.external_url().is_some()
    }
}

impl Record for ChapterRecord {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl fmt::Display for ChapterRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let attrs = &self.attributes;
        if let Some(volume) = attrs.volume.as_deref().filter(|v| !v.is_empty()) {
            write!(f, "Vol.{}", volume)?;
        }
        write!(f, "Ch.{}", attrs.chapter.as_deref().unwrap_or("N/A"))?;
        if let Some(title) = attrs.title.as_deref().filter(|t| !t.is_empty()) {
            write!(f, ": {}", title)?;
        }
        if let Some(pages) = attrs.pages {
            write!(f, " ({}p)", pages)?;
        }
        if attrs.translated_language != "en" {
            write!(f, " [{}]", attrs.translated_language.to_uppercase())?;
        }
        Ok(())
    }
}
