//! Records returned by the MangaDex REST API.

pub mod at_home;
pub mod chapter;
pub mod manga;

pub use at_home::AtHomeServer;
pub use chapter::{ChapterAttributes, ChapterRecord};
pub use manga::{MangaAttributes, MangaRecord};

use serde::Deserialize;
use uuid::Uuid;

/// Anything the pagination helper can deduplicate.
pub trait Record {
    fn id(&self) -> Uuid;
}

/// One page of a collection endpoint.
#[derive(Deserialize, Debug)]
pub struct Collection<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub total: u32,
}

/// Single entity endpoints wrap their payload in `data`.
#[derive(Deserialize, Debug)]
pub struct Entity<T> {
    pub data: T,
}
