use config::{Config, ConfigError, Environment};
use resolve_path::PathResolveExt;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct Settings {
    pub output_directory: String,
    pub history_file: String,
    pub api: ApiSettings,
    pub listing: ListingSettings,
    pub download: DownloadSettings,
    pub mangadex_manga: Vec<MangaDexManga>,
}

#[derive(Deserialize, Debug, PartialEq, Eq)]
pub struct MangaDexManga {
    pub uuid: Uuid,
    pub directory: Option<String>,
    pub name: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub user_agent: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ListingSettings {
    pub search: PaginationSettings,
    pub chapters: PaginationSettings,
    pub all_chapters: PaginationSettings,
    /// Languages requested by the filtered chapter listing.
    pub languages: Vec<String>,
    /// Languages requested by the permissive, all-languages listing.
    pub all_languages: Vec<String>,
}

/// Page size, inter-page delay and accumulation ceiling of one paginated call.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationSettings {
    pub page_size: u32,
    pub delay_ms: u64,
    pub max_items: usize,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DownloadSettings {
    pub attempts: u32,
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
    pub jpeg_quality: u8,
    /// Where per-page scratch files go; the system temp dir when unset.
    pub scratch_directory: Option<String>,
}

impl Settings {
    pub fn new(config_file: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(config::File::with_name(config_file).required(false))
            .add_source(Environment::with_prefix("MANGA_DL").separator("__"))
            .build()?;
        builder.try_deserialize()
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_directory.resolve().into_owned()
    }

    pub fn history_path(&self) -> PathBuf {
        self.history_file.resolve().into_owned()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_directory: ".".into(),
            history_file: "history.json".into(),
            api: ApiSettings::default(),
            listing: ListingSettings::default(),
            download: DownloadSettings::default(),
            mangadex_manga: Vec::new(),
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.mangadex.org".into(),
            user_agent: "MangaDex Downloader/1.0".into(),
        }
    }
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            search: PaginationSettings::new(100, 100, 10_000),
            chapters: PaginationSettings::new(500, 200, 5_000),
            all_chapters: PaginationSettings::new(500, 300, 10_000),
            languages: vec!["en".into()],
            all_languages: ["en", "id", "ja", "es", "fr", "de", "ru"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl PaginationSettings {
    pub const fn new(page_size: u32, delay_ms: u64, max_items: usize) -> Self {
        Self {
            page_size,
            delay_ms,
            max_items,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            attempts: 3,
            retry_delay_ms: 1_000,
            timeout_secs: 30,
            jpeg_quality: 95,
            scratch_directory: None,
        }
    }
}

impl DownloadSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn scratch_path(&self) -> Option<PathBuf> {
        self.scratch_directory
            .as_ref()
            .map(|dir| dir.resolve().into_owned())
    }
}
