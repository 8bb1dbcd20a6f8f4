pub mod cli;
pub mod filename;
pub mod history;
pub mod pdf;

pub use cli::Cli;
pub use filename::{language_name, sanitize_filename};
pub use history::{DownloadHistoryEntry, HistoryLog};
pub use pdf::{PdfPage, PdfWriter};
