use anyhow::Context;
use log::{debug, error, info, warn};
use resolve_path::PathResolveExt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::assembler::{AssemblyEvent, ChapterAssembler, ChapterJob};
use crate::catalog::{CatalogClient, Listing};
use crate::configuration::Settings;
use crate::mangadex::ChapterRecord;
use crate::mangadex_client::HttpTransport;
use crate::models::cli::Command;
use crate::models::{language_name, sanitize_filename, HistoryLog};
use crate::worker::{Dispatcher, OperationKind};

/// Everything a command needs, sharing one HTTP session.
pub struct App {
    settings: Settings,
    catalog: Arc<CatalogClient<HttpTransport>>,
    assembler: Arc<ChapterAssembler<HttpTransport>>,
    history: HistoryLog,
    dispatcher: Dispatcher,
}

pub async fn run(settings: Settings, command: Command) -> anyhow::Result<()> {
    let app = App::new(settings)?;
    match command {
        Command::Search { query } => app.search(query).await,
        Command::Chapters {
            manga_id,
            all_languages,
            languages,
        } => app.chapters(manga_id, all_languages, languages).await,
        Command::Download {
            manga_id,
            chapter_id,
            output,
        } => app.download(manga_id, chapter_id, output).await,
        Command::Update => app.update().await,
        Command::History => {
            app.show_history();
            Ok(())
        }
    }
}

impl App {
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let transport = Arc::new(HttpTransport::new(&settings.api)?);
        let history = HistoryLog::new(settings.history_path());
        let catalog = CatalogClient::new(
            transport.clone(),
            &settings.api.base_url,
            settings.listing.clone(),
        );
        let assembler = ChapterAssembler::new(transport, &settings.api.base_url, &settings.download)
            .with_history(history.clone());

        Ok(Self {
            settings,
            catalog: Arc::new(catalog),
            assembler: Arc::new(assembler),
            history,
            dispatcher: Dispatcher::new(),
        })
    }

    async fn search(&self, query: String) -> anyhow::Result<()> {
        let catalog = self.catalog.clone();
        let found = self
            .dispatcher
            .try_spawn(OperationKind::Catalog, async move { catalog.search(&query).await })?
            .await?;

        for manga in &found.items {
            let status = manga.attributes.status.as_deref().unwrap_or("unknown");
            println!("{}  {}  [{}]", manga.id, manga.display_title(), status);
        }
        report_incomplete(&found);
        Ok(())
    }

    async fn chapters(
        &self,
        manga_id: Uuid,
        all_languages: bool,
        languages: Vec<String>,
    ) -> anyhow::Result<()> {
        let listing = self.catalog.listing_settings();
        let languages = match (languages.is_empty(), all_languages) {
            (false, _) => languages,
            (true, true) => listing.all_languages.clone(),
            (true, false) => listing.languages.clone(),
        };
        info!(
            "Languages: {}",
            languages
                .iter()
                .map(|code| language_name(code))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let chapters = self.load_chapters(manga_id, languages, all_languages).await?;

        for chapter in &chapters.items {
            println!("{}  {}", chapter.id, chapter);
        }
        report_incomplete(&chapters);
        Ok(())
    }

    async fn download(
        &self,
        manga_id: Uuid,
        chapter_id: Uuid,
        output: Option<PathBuf>,
    ) -> anyhow::Result<()> {
        let manga = self
            .catalog
            .get_manga(manga_id)
            .await
            .with_context(|| format!("Unable to retrieve manga {}", manga_id))?;
        let chapter = self
            .catalog
            .get_chapter(chapter_id)
            .await
            .with_context(|| format!("Unable to retrieve chapter {}", chapter_id))?;

        let job = ChapterJob::new(manga.display_title(), &chapter);
        let output_dir = output.unwrap_or_else(|| self.settings.output_path());
        let path = self.download_chapter(job, output_dir).await?;
        println!("{}", path.display());
        Ok(())
    }

    /// Download every configured title's chapters that aren't on disk yet.
    async fn update(&self) -> anyhow::Result<()> {
        let base_path = self.settings.output_path();
        info!("Output Directory: {}", base_path.display());
        fs::create_dir_all(&base_path)?;

        for manga in &self.settings.mangadex_manga {
            // Use title from config or the catalog's title
            let manga_title = match &manga.name {
                Some(name) => name.clone(),
                None => match self.catalog.get_manga(manga.uuid).await {
                    Ok(record) => record.display_title().to_string(),
                    Err(e) => {
                        error!("Unable to retrieve manga {}: {}, skipping", manga.uuid, e);
                        continue;
                    }
                },
            };
            info!("Checking Manga: {}", manga_title);

            // If override path on manga's config use it
            let manga_dir = sanitize_filename(&manga_title);
            let manga_path = match &manga.directory {
                Some(dir) => dir.resolve().join(&manga_dir),
                None => base_path.join(&manga_dir),
            };

            let languages = self.settings.listing.languages.clone();
            let chapters = self.load_chapters(manga.uuid, languages, false).await?;
            report_incomplete(&chapters);

            for chapter in missing_chapters(&chapters.items, &manga_title, &manga_path) {
                let job = ChapterJob::new(&manga_title, chapter);
                if let Err(e) = self.download_chapter(job, manga_path.clone()).await {
                    error!("Error creating chapter {}: {}", chapter.label(), e);
                }
            }
        }

        info!("Finished!");
        Ok(())
    }

    /// List chapters on the catalog slot.
    async fn load_chapters(
        &self,
        manga_id: Uuid,
        languages: Vec<String>,
        all_languages: bool,
    ) -> anyhow::Result<Listing<ChapterRecord>> {
        let catalog = self.catalog.clone();
        let chapters = self
            .dispatcher
            .try_spawn(OperationKind::Catalog, async move {
                if all_languages {
                    catalog.list_all_chapters(manga_id, &languages).await
                } else {
                    catalog.list_chapters(manga_id, &languages).await
                }
            })?
            .await?;
        Ok(chapters)
    }

    /// Run one assembly on the assembly slot, printing its events as they
    /// arrive.
    async fn download_chapter(&self, job: ChapterJob, output_dir: PathBuf) -> anyhow::Result<PathBuf> {
        let (tx, mut rx) = mpsc::unbounded_channel::<AssemblyEvent>();
        let assembler = self.assembler.clone();
        let task = self
            .dispatcher
            .try_spawn(OperationKind::Assembly, async move {
                assembler.assemble_chapter(&job, &output_dir, &tx).await
            })?;

        while let Some(event) = rx.recv().await {
            match event {
                AssemblyEvent::Progress(percent) => debug!("{}%", percent),
                AssemblyEvent::Status(message) => info!("{}", message),
            }
        }

        Ok(task.await??)
    }

    fn show_history(&self) {
        let entries = self.history.load();
        if entries.is_empty() {
            println!("No downloads recorded in {}", self.history.path().display());
        }
        for entry in entries {
            println!(
                "{}  {} chapter {}  {}",
                entry.download_date.format("%Y-%m-%d %H:%M"),
                entry.manga_title,
                entry.chapter_number,
                entry.file_path
            );
        }
    }
}

fn report_incomplete<T>(listing: &Listing<T>) {
    if !listing.is_complete() {
        warn!(
            "Listing may be incomplete ({} items, {})",
            listing.items.len(),
            listing.completeness
        );
    }
}

/// Chapters whose PDF isn't in `dir` yet.
fn missing_chapters<'a>(
    chapters: &'a [ChapterRecord],
    manga_title: &str,
    dir: &Path,
) -> Vec<&'a ChapterRecord> {
    chapters
        .iter()
        .filter(|chapter| {
            let job = ChapterJob::new(manga_title, chapter);
            let exists = dir.join(job.filename()).exists();
            if exists {
                debug!("Chapter {} exists, skipping", chapter.label());
            }
            !exists
        })
        .collect()
}
