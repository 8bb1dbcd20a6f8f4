use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(clap::Parser)]
#[command(about = "Download MangaDex chapters as PDF files")]
pub struct Cli {
    #[arg(short, long, default_value = "manga")]
    pub config_file: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Search titles
    Search { query: String },
    /// List the chapters of a title
    Chapters {
        manga_id: Uuid,
        /// Every chapter in every configured language, including ones
        /// without pages
        #[arg(short, long)]
        all_languages: bool,
        /// Languages to list, overrides the configuration
        #[arg(short, long = "language")]
        languages: Vec<String>,
    },
    /// Download one chapter as a PDF
    Download {
        manga_id: Uuid,
        chapter_id: Uuid,
        /// Directory for the PDF, defaults to the configured output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Download every missing chapter of the configured titles
    Update,
    /// Show previously downloaded chapters
    History,
}

impl Cli {
    pub fn new() -> Self {
        Cli::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clap_test() {
        use clap::CommandFactory;
        Cli::command().debug_assert()
    }

    #[test]
    fn parses_chapter_listing() {
        let cli = Cli::try_parse_from([
            "manga-pdf",
            "chapters",
            "69060a67-1d4e-4110-9d29-838bfd99917f",
            "-l",
            "en",
            "--language",
            "id",
        ])
        .unwrap();

        assert_eq!("manga", cli.config_file);
        assert_eq!(
            Command::Chapters {
                manga_id: uuid::uuid!("69060a67-1d4e-4110-9d29-838bfd99917f"),
                all_languages: false,
                languages: vec!["en".into(), "id".into()],
            },
            cli.command
        );
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(Cli::try_parse_from(["manga-pdf", "download", "nope", "nope"]).is_err());
    }
}
