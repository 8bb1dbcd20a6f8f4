use chrono::{Local, NaiveDateTime};
use log::{debug, error, warn};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DownloadHistoryEntry {
    pub manga_title: String,
    #[serde(default = "unknown_label", deserialize_with = "chapter_label")]
    pub chapter_number: String,
    pub file_path: String,
    pub download_date: NaiveDateTime,
}

fn unknown_label() -> String {
    "Unknown".to_string()
}

/// Older logs store unlabelled chapters as `null` and some store numbers.
fn chapter_label<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(label)) => label,
        Some(Value::Number(number)) => number.to_string(),
        _ => unknown_label(),
    })
}

impl DownloadHistoryEntry {
    pub fn now(manga_title: &str, chapter_number: &str, file_path: &Path) -> Self {
        Self {
            manga_title: manga_title.to_string(),
            chapter_number: chapter_number.to_string(),
            file_path: file_path.display().to_string(),
            download_date: Local::now().naive_local(),
        }
    }
}

/// Append-only download log stored as a single JSON array.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All readable entries. A missing or corrupt file is an empty history,
    /// and elements that aren't entries are skipped.
    pub fn load(&self) -> Vec<DownloadHistoryEntry> {
        let raw = match self.read_raw() {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                debug!("Ignoring unreadable history {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };
        raw.into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Skipping history element: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Failures are logged, a download is never failed over its history.
    pub fn append(&self, entry: DownloadHistoryEntry) {
        if let Err(e) = self.try_append(entry) {
            error!("Error saving history {}: {}", self.path.display(), e);
        }
    }

    /// Existing elements are written back untouched. A file that isn't a
    /// JSON array is moved aside before a new one is started.
    fn try_append(&self, entry: DownloadHistoryEntry) -> anyhow::Result<()> {
        let mut entries = match self.read_raw() {
            Ok(Some(raw)) => raw,
            Ok(None) => Vec::new(),
            Err(e) => {
                let backup = self.backup_path();
                warn!(
                    "History {} is corrupt ({}), moving it to {}",
                    self.path.display(),
                    e,
                    backup.display()
                );
                fs::rename(&self.path, &backup)?;
                Vec::new()
            }
        };
        entries.push(serde_json::to_value(entry)?);
        let json = serde_json::to_string_pretty(&entries)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    /// The stored array, `None` when there is no file yet.
    fn read_raw(&self) -> anyhow::Result<Option<Vec<Value>>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn backup_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".bak");
        PathBuf::from(name)
    }
}
