//! Chapter download and PDF assembly.

use image::{codecs::jpeg::JpegEncoder, ColorType, DynamicImage};
use log::{debug, info, warn};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{NamedTempFile, TempDir};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::configuration::DownloadSettings;
use crate::mangadex::ChapterRecord;
use crate::mangadex_client::Transport;
use crate::models::filename::chapter_filename;
use crate::models::pdf::{ColorSpace, PdfPage, PdfWriter};
use crate::models::{DownloadHistoryEntry, HistoryLog};
use crate::pages::{PageFetcher, PageResolver};

/// Share of the progress bar covered by page downloads.
const DOWNLOAD_SHARE: usize = 80;
const ASSEMBLY_PROGRESS: u8 = 90;
const DONE_PROGRESS: u8 = 100;

#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    #[error("No pages found for this chapter")]
    NoPagesFound,
    #[error("No pages were successfully downloaded")]
    NoPagesDownloaded,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Pdf(#[from] lopdf::Error),
}

/// What to download and how to name it.
#[derive(Debug, Clone)]
pub struct ChapterJob {
    pub chapter_id: Uuid,
    pub manga_title: String,
    pub chapter_label: String,
}

impl ChapterJob {
    pub fn new(manga_title: &str, chapter: &ChapterRecord) -> Self {
        Self {
            chapter_id: chapter.id,
            manga_title: manga_title.to_string(),
            chapter_label: chapter.label().to_string(),
        }
    }

    pub fn filename(&self) -> String {
        chapter_filename(&self.manga_title, &self.chapter_label)
    }
}

/// Receives progress (0-100) and human readable status lines.
pub trait ProgressSink: Send + Sync {
    fn progress(&self, _percent: u8) {}

    fn status(&self, _message: &str) {}
}

/// No reporting.
impl ProgressSink for () {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyEvent {
    Progress(u8),
    Status(String),
}

impl ProgressSink for UnboundedSender<AssemblyEvent> {
    fn progress(&self, percent: u8) {
        // The receiver going away only means nobody is watching
        let _ = self.send(AssemblyEvent::Progress(percent));
    }

    fn status(&self, message: &str) {
        let _ = self.send(AssemblyEvent::Status(message.to_string()));
    }
}

/// A normalised page waiting in the scratch directory.
struct StagedPage {
    path: PathBuf,
    width: u32,
    height: u32,
    color: ColorSpace,
}

pub struct ChapterAssembler<T: ?Sized> {
    resolver: PageResolver<T>,
    fetcher: PageFetcher<T>,
    jpeg_quality: u8,
    scratch_dir: Option<PathBuf>,
    history: Option<HistoryLog>,
}

impl<T: Transport + ?Sized> ChapterAssembler<T> {
    pub fn new(transport: Arc<T>, base_url: &str, settings: &DownloadSettings) -> Self {
        Self {
            resolver: PageResolver::new(transport.clone(), base_url),
            fetcher: PageFetcher::new(transport, settings),
            jpeg_quality: settings.jpeg_quality,
            scratch_dir: settings.scratch_path(),
            history: None,
        }
    }

    pub fn with_history(mut self, history: HistoryLog) -> Self {
        self.history = Some(history);
        self
    }

    /// Download `job` into a single PDF inside `output_dir`.
    ///
    /// Pages that fail to download or decode are skipped. Fails when the
    /// chapter has no pages or none of them survived, and when the PDF can't
    /// be written. Every failure is also reported as an `Error: ...` status.
    pub async fn assemble_chapter(
        &self,
        job: &ChapterJob,
        output_dir: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<PathBuf, AssembleError> {
        match self.assemble(job, output_dir, sink).await {
            Ok(path) => Ok(path),
            Err(e) => {
                sink.status(&format!("Error: {}", e));
                Err(e)
            }
        }
    }

    async fn assemble(
        &self,
        job: &ChapterJob,
        output_dir: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<PathBuf, AssembleError> {
        sink.status(&format!(
            "Getting page URLs for Chapter {}...",
            job.chapter_label
        ));
        let page_urls = self.resolver.resolve_pages(job.chapter_id).await;
        if page_urls.is_empty() {
            return Err(AssembleError::NoPagesFound);
        }
        let total = page_urls.len();
        sink.status(&format!("Found {} pages. Starting download...", total));

        // Dropped on every return below, taking the page files with it
        let scratch = self.scratch()?;
        let mut staged = Vec::with_capacity(total);

        for (i, url) in page_urls.iter().enumerate() {
            sink.status(&format!("Downloading page {}/{}...", i + 1, total));
            sink.progress((DOWNLOAD_SHARE * i / total) as u8);

            let Some(bytes) = self.fetcher.fetch_page(url).await else {
                warn!("Failed to download page {}", i + 1);
                continue;
            };
            match self.stage_page(&bytes, scratch.path(), i + 1) {
                Ok(page) => staged.push(page),
                Err(e) => warn!("Error processing page {}: {}", i + 1, e),
            }
        }

        if staged.is_empty() {
            return Err(AssembleError::NoPagesDownloaded);
        }
        if staged.len() < total {
            warn!(
                "Chapter {}: {} of {} pages missing",
                job.chapter_label,
                total - staged.len(),
                total
            );
        }

        sink.status("Creating PDF...");
        sink.progress(ASSEMBLY_PROGRESS);

        let mut pdf = PdfWriter::new();
        for page in &staged {
            pdf.add_page(PdfPage {
                jpeg: fs::read(&page.path)?,
                width: page.width,
                height: page.height,
                color: page.color,
            })?;
        }

        let filename = job.filename();
        fs::create_dir_all(output_dir)?;
        let pdf_path = output_dir.join(&filename);
        let page_count = pdf.page_count();
        write_atomically(pdf, &pdf_path)?;
        info!("Wrote {} pages to {}", page_count, pdf_path.display());

        sink.progress(DONE_PROGRESS);
        sink.status(&format!("PDF saved: {}", filename));

        if let Some(history) = &self.history {
            history.append(DownloadHistoryEntry::now(
                &job.manga_title,
                &job.chapter_label,
                &pdf_path,
            ));
        }

        Ok(pdf_path)
    }

    fn scratch(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("manga-pdf-");
        match &self.scratch_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                builder.tempdir_in(dir)
            }
            None => builder.tempdir(),
        }
    }

    fn stage_page(&self, bytes: &[u8], scratch: &Path, number: usize) -> anyhow::Result<StagedPage> {
        let page = normalize_page(bytes, self.jpeg_quality)?;
        let path = scratch.join(format!("page_{:03}.jpg", number));
        fs::write(&path, &page.jpeg)?;
        debug!("Staged page {} as {}", number, path.display());
        Ok(StagedPage {
            path,
            width: page.width,
            height: page.height,
            color: page.color,
        })
    }
}

/// Decode a page and re-encode it as a JPEG the PDF can embed as is.
///
/// Grayscale stays grayscale; alpha, palette and high bit depth images become
/// 8 bit RGB.
pub fn normalize_page(bytes: &[u8], quality: u8) -> image::ImageResult<PdfPage> {
    let img = image::load_from_memory(bytes)?;
    let (img, color) = match img.color() {
        ColorType::L8 => (img, ColorSpace::Gray),
        ColorType::L16 => (DynamicImage::ImageLuma8(img.to_luma8()), ColorSpace::Gray),
        ColorType::Rgb8 => (img, ColorSpace::Rgb),
        _ => (DynamicImage::ImageRgb8(img.to_rgb8()), ColorSpace::Rgb),
    };

    let mut jpeg = Vec::new();
    img.write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, quality))?;
    Ok(PdfPage {
        jpeg,
        width: img.width(),
        height: img.height(),
        color,
    })
}

/// Write next to `path` first so a failed write never leaves a partial PDF.
fn write_atomically(pdf: PdfWriter, path: &Path) -> Result<(), AssembleError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(dir)?;
    {
        let mut out = BufWriter::new(file.as_file_mut());
        pdf.write_to(&mut out)?;
        out.flush()?;
    }
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mangadex_client::testing::ScriptedTransport;
    use crate::models::pdf::tests::image_widths;
    use image::{GrayImage, ImageFormat, RgbaImage};
    use lopdf::Document;
    use serde_json::json;
    use std::io::Cursor;
    use std::sync::Mutex;

    const BASE: &str = "https://uploads.example.org";

    #[derive(Default)]
    struct Recorder {
        progress: Mutex<Vec<u8>>,
        status: Mutex<Vec<String>>,
    }

    impl ProgressSink for Recorder {
        fn progress(&self, percent: u8) {
            self.progress.lock().unwrap().push(percent);
        }

        fn status(&self, message: &str) {
            self.status.lock().unwrap().push(message.to_string());
        }
    }

    fn png(img: DynamicImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn rgba_png(width: u32) -> Vec<u8> {
        png(DynamicImage::ImageRgba8(RgbaImage::new(width, 10)))
    }

    fn page_url(n: usize) -> String {
        format!("{}/data/hash/{}.png", BASE, n)
    }

    fn manifest(pages: usize) -> serde_json::Value {
        let data: Vec<String> = (1..=pages).map(|n| format!("{}.png", n)).collect();
        json!({ "result": "ok", "baseUrl": BASE, "chapter": { "hash": "hash", "data": data } })
    }

    fn settings(scratch: &Path) -> DownloadSettings {
        DownloadSettings {
            attempts: 2,
            retry_delay_ms: 0,
            scratch_directory: Some(scratch.display().to_string()),
            ..DownloadSettings::default()
        }
    }

    fn job() -> ChapterJob {
        ChapterJob {
            chapter_id: Uuid::new_v4(),
            manga_title: "Attack on Titan: Final Season?".into(),
            chapter_label: "139".into(),
        }
    }

    fn is_empty_dir(dir: &Path) -> bool {
        fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn failed_page_is_skipped_in_order() {
        let out = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .push_json(Some(manifest(3)))
            .push_bytes(&page_url(1), Some(rgba_png(11)))
            .push_bytes(&page_url(2), None)
            .push_bytes(&page_url(3), Some(rgba_png(33)));
        let assembler = ChapterAssembler::new(transport.clone(), "https://api.example.org", &settings(scratch.path()));
        let recorder = Recorder::default();

        let path = assembler
            .assemble_chapter(&job(), out.path(), &recorder)
            .await
            .unwrap();

        assert_eq!(
            out.path().join("Attack on Titan_ Final Season__chapter_139.pdf"),
            path
        );
        let doc = Document::load(&path).unwrap();
        assert_eq!(vec![11, 33], image_widths(&doc));
        assert_eq!(2, transport.requests_to(&page_url(2)));

        let status = recorder.status.lock().unwrap();
        assert!(status.iter().all(|s| !s.starts_with("Error")));
        assert_eq!("PDF saved: Attack on Titan_ Final Season__chapter_139.pdf", status.last().unwrap());
        assert!(is_empty_dir(scratch.path()));
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_completes() {
        let out = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(Some(manifest(4)));
        for n in 1..=4 {
            transport.push_bytes(&page_url(n), Some(rgba_png(8)));
        }
        let assembler = ChapterAssembler::new(transport, "https://api.example.org", &settings(scratch.path()));
        let recorder = Recorder::default();

        assembler
            .assemble_chapter(&job(), out.path(), &recorder)
            .await
            .unwrap();

        let progress = recorder.progress.lock().unwrap().clone();
        assert_eq!(vec![0, 20, 40, 60, 90, 100], progress);
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn empty_manifest_fails_before_fetching() {
        let out = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(Some(json!({ "result": "ok", "baseUrl": BASE })));
        let assembler = ChapterAssembler::new(transport.clone(), "https://api.example.org", &settings(scratch.path()));
        let recorder = Recorder::default();

        let err = assembler
            .assemble_chapter(&job(), out.path(), &recorder)
            .await
            .unwrap_err();

        assert!(matches!(err, AssembleError::NoPagesFound));
        assert_eq!(1, transport.requests().len());
        assert_eq!(
            "Error: No pages found for this chapter",
            recorder.status.lock().unwrap().last().unwrap()
        );
        assert!(recorder.progress.lock().unwrap().is_empty());
        assert!(is_empty_dir(out.path()));
    }

    #[tokio::test]
    async fn nothing_downloaded_fails_and_cleans_up() {
        let out = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .push_json(Some(manifest(2)))
            .push_bytes(&page_url(1), None)
            .push_bytes(&page_url(2), Some(b"definitely not an image".to_vec()));
        let assembler = ChapterAssembler::new(transport, "https://api.example.org", &settings(scratch.path()));

        let err = assembler
            .assemble_chapter(&job(), out.path(), &())
            .await
            .unwrap_err();

        assert!(matches!(err, AssembleError::NoPagesDownloaded));
        assert!(is_empty_dir(out.path()));
        assert!(is_empty_dir(scratch.path()));
    }

    #[tokio::test]
    async fn appends_history_on_success() {
        let out = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let history = HistoryLog::new(out.path().join("history.json"));
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .push_json(Some(manifest(1)))
            .push_bytes(&page_url(1), Some(rgba_png(5)));
        let assembler = ChapterAssembler::new(transport, "https://api.example.org", &settings(scratch.path()))
            .with_history(history.clone());

        let path = assembler
            .assemble_chapter(&job(), &out.path().join("nested"), &())
            .await
            .unwrap();

        let entries = history.load();
        assert_eq!(1, entries.len());
        assert_eq!("Attack on Titan: Final Season?", entries[0].manga_title);
        assert_eq!("139", entries[0].chapter_number);
        assert_eq!(path.display().to_string(), entries[0].file_path);
    }

    #[tokio::test]
    async fn channel_sink_forwards_events() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.progress(40);
        tx.status("Creating PDF...");
        drop(tx);

        assert_eq!(Some(AssemblyEvent::Progress(40)), rx.recv().await);
        assert_eq!(Some(AssemblyEvent::Status("Creating PDF...".into())), rx.recv().await);
        assert_eq!(None, rx.recv().await);
    }

    #[test]
    fn alpha_becomes_rgb_and_gray_stays_gray() {
        let rgb = normalize_page(&rgba_png(7), 95).unwrap();
        assert_eq!(ColorSpace::Rgb, rgb.color);
        assert_eq!((7, 10), (rgb.width, rgb.height));
        let decoded = image::load_from_memory(&rgb.jpeg).unwrap();
        assert_eq!(ColorType::Rgb8, decoded.color());

        let gray = normalize_page(&png(DynamicImage::ImageLuma8(GrayImage::new(4, 6))), 95).unwrap();
        assert_eq!(ColorSpace::Gray, gray.color);
        assert_eq!((4, 6), (gray.width, gray.height));
    }

    #[test]
    fn garbage_is_not_an_image() {
        assert!(normalize_page(b"<html>rate limited</html>", 95).is_err());
    }
}
