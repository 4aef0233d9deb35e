use anyhow::{Context, Result, anyhow};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::app_config::Config;
use crate::errors::PipelineError;
use crate::file_utils::{FileManager, FileType, book_id_from_title, format_duration, title_from_path};
use crate::pipeline::{
    BookOutput, BookProcessor, CancellationFlag, MetadataOverrides, ProcessingObserver,
    export_partial,
};
use crate::state::ResumeOutcome;
use crate::synthesis::{BackendFactory, BackendProbe};
use crate::text::DetectedChapter;
use crate::timing::{BookTimingMap, ChapterTiming};

// @module: Application controller for book processing

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {prefix} ({percent}%) {msg} {eta}";
const BAR_FALLBACK_TEMPLATE: &str = "{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}";

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(BAR_TEMPLATE)
        .or_else(|_| ProgressStyle::default_bar().template(BAR_FALLBACK_TEMPLATE))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░")
}

/// Progress bars for one book: chapters on top, sentences of the current chapter below
struct ProgressObserver {
    chapters: ProgressBar,
    sentences: ProgressBar,
}

impl ProgressObserver {
    fn new(multi_progress: &MultiProgress) -> Self {
        let chapters = multi_progress.add(ProgressBar::new(0));
        chapters.set_style(bar_style());
        chapters.set_prefix("chapters");

        let sentences = multi_progress.add(ProgressBar::new(0));
        sentences.set_style(bar_style());
        sentences.set_prefix("sentences");

        Self { chapters, sentences }
    }
}

impl ProcessingObserver for ProgressObserver {
    fn on_book_start(&self, title: &str, total_chapters: usize, _outcome: &ResumeOutcome) {
        self.chapters.set_length(total_chapters as u64);
        self.chapters.set_message(title.to_string());
    }

    fn on_chapter_restored(&self, _number: usize, _timing: &ChapterTiming) {
        self.chapters.inc(1);
    }

    fn on_chapter_start(&self, chapter: &DetectedChapter, sentence_count: usize) {
        self.sentences.reset();
        self.sentences.set_length(sentence_count as u64);
        self.sentences.set_message(chapter.title.clone());
    }

    fn on_sentence_done(&self, _chapter: usize, done: usize, _total: usize) {
        self.sentences.set_position(done as u64);
    }

    fn on_chapter_complete(&self, _number: usize, _timing: &ChapterTiming) {
        self.chapters.inc(1);
    }

    fn on_chapter_skipped(&self, _number: usize) {
        self.chapters.inc(1);
    }

    fn on_book_complete(&self, _output: &BookOutput) {
        self.sentences.finish_and_clear();
        self.chapters.finish_with_message("done");
    }
}

impl Drop for ProgressObserver {
    fn drop(&mut self) {
        if !self.sentences.is_finished() {
            self.sentences.abandon();
        }
        if !self.chapters.is_finished() {
            self.chapters.abandon();
        }
    }
}

/// Counts from a folder run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Books left resumable by cancellation
    pub cancelled: usize,
}

/// Exit status used when a second interrupt forces the process down
pub const INTERRUPT_EXIT_CODE: i32 = 130;

/// What the interrupt handler does on the n-th Ctrl-C
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// Finish the current chapter, checkpoint, then stop
    Cancel,
    /// Leave now; the last checkpoint is still on disk
    Exit,
}

impl InterruptAction {
    pub fn after(received: usize) -> Self {
        if received <= 1 {
            InterruptAction::Cancel
        } else {
            InterruptAction::Exit
        }
    }
}

/// Main application controller for book processing
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Stop request shared with every processor
    cancel: CancellationFlag,
    // @field: Chapters left out of single-book runs
    skip_chapters: BTreeSet<usize>,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;
        Ok(Self {
            config,
            cancel: CancellationFlag::new(),
            skip_chapters: BTreeSet::new(),
        })
    }

    // @method: Leave these chapter numbers out of `run`
    pub fn with_skip_chapters<I: IntoIterator<Item = usize>>(mut self, chapters: I) -> Self {
        self.skip_chapters = chapters.into_iter().collect();
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Stop at the next chapter boundary on Ctrl-C; a second Ctrl-C exits immediately
    pub fn install_interrupt_handler(&self) {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let mut received = 0;
            while tokio::signal::ctrl_c().await.is_ok() {
                received += 1;
                match InterruptAction::after(received) {
                    InterruptAction::Cancel => {
                        warn!("Interrupt received, stopping after the current chapter (Ctrl-C again to quit)");
                        cancel.cancel();
                    }
                    InterruptAction::Exit => {
                        error!("Second interrupt received, exiting without waiting for the current chapter");
                        std::process::exit(INTERRUPT_EXIT_CODE);
                    }
                }
            }
        });
    }

    /// Output directory used when none is given: `<parent>/<book id>`
    pub fn default_output_dir(input_file: &Path, overrides: &MetadataOverrides) -> PathBuf {
        let title = overrides
            .title
            .clone()
            .unwrap_or_else(|| title_from_path(input_file));
        let mut book_id = book_id_from_title(&title);
        if book_id.is_empty() {
            book_id = "book".to_string();
        }
        input_file
            .parent()
            .unwrap_or(Path::new("."))
            .join(book_id)
    }

    /// Output directory for every book of a folder run, in the same order as `books`.
    ///
    /// Books whose titles map to the same directory get their extension appended
    /// (`notes-txt`, `notes-md`), then a counter if that is still taken.
    pub fn folder_output_dirs(books: &[PathBuf], output_root: Option<&Path>) -> Vec<PathBuf> {
        let overrides = MetadataOverrides::default();
        let defaults: Vec<PathBuf> = books
            .iter()
            .map(|book| {
                let default_dir = Self::default_output_dir(book, &overrides);
                match output_root {
                    Some(root) => root.join(default_dir.file_name().unwrap_or(book.as_os_str())),
                    None => default_dir,
                }
            })
            .collect();

        let mut shared: HashMap<&Path, usize> = HashMap::new();
        for dir in &defaults {
            *shared.entry(dir.as_path()).or_default() += 1;
        }

        let mut taken: HashSet<PathBuf> = HashSet::new();
        let mut dirs = Vec::with_capacity(books.len());
        for (book, default_dir) in books.iter().zip(&defaults) {
            let mut base = default_dir.clone();
            if shared[default_dir.as_path()] > 1 {
                if let Some(ext) = book.extension() {
                    let name = default_dir
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default();
                    base.set_file_name(format!("{}-{}", name, ext.to_string_lossy().to_lowercase()));
                }
            }

            let mut candidate = base.clone();
            let mut counter = 2;
            while taken.contains(&candidate) {
                let name = base
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                candidate.set_file_name(format!("{}-{}", name, counter));
                counter += 1;
            }
            if candidate != *default_dir {
                warn!("{:?} shares an output directory with another book, using {:?}", book, candidate);
            }
            taken.insert(candidate.clone());
            dirs.push(candidate);
        }
        dirs
    }

    fn processor(&self) -> Result<BookProcessor> {
        Ok(BookProcessor::new(self.config.clone())?.with_cancellation(self.cancel.clone()))
    }

    /// Probe every configured backend
    pub async fn probe_backends(&self) -> Vec<BackendProbe> {
        BackendFactory::from_config(&self.config.synthesis)
            .probe_all()
            .await
    }

    /// Run the main workflow for one book
    pub async fn run(
        &self,
        input_file: PathBuf,
        output_dir: PathBuf,
        overrides: MetadataOverrides,
    ) -> Result<BookOutput> {
        let multi_progress = MultiProgress::new();
        self.run_with_progress(&input_file, &output_dir, &overrides, &self.skip_chapters, &multi_progress)
            .await
    }

    async fn run_with_progress(
        &self,
        input_file: &Path,
        output_dir: &Path,
        overrides: &MetadataOverrides,
        skip_chapters: &BTreeSet<usize>,
        multi_progress: &MultiProgress,
    ) -> Result<BookOutput> {
        let start_time = Instant::now();

        if !input_file.is_file() {
            return Err(anyhow!("Input file does not exist: {:?}", input_file));
        }
        FileManager::ensure_dir(output_dir)?;

        let observer = Arc::new(ProgressObserver::new(multi_progress));
        let processor = self
            .processor()?
            .with_observer(observer)
            .with_skip_chapters(skip_chapters.iter().copied());

        let output = match processor.process_book(input_file, output_dir, overrides).await {
            Ok(output) => output,
            Err(e) if e.is_resumable() => {
                warn!("Progress saved in {:?}; run again to resume", output_dir);
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            "Book written to {:?} in {} ({} synthesized, {} restored, {} skipped)",
            output.output_dir,
            format_duration(start_time.elapsed().as_secs_f64()),
            output.synthesized.len(),
            output.restored.len(),
            output.skipped.len()
        );
        Ok(output)
    }

    /// Process every text file under `input_dir`, one output directory per book
    pub async fn run_folder(&self, input_dir: PathBuf, output_root: Option<PathBuf>) -> Result<FolderSummary> {
        let start_time = Instant::now();

        if !input_dir.is_dir() {
            return Err(anyhow!("Input directory does not exist: {:?}", input_dir));
        }

        let books = FileManager::find_files(&input_dir, &FileType::TEXT_EXTENSIONS)?;
        if books.is_empty() {
            return Err(anyhow!("No text files found in directory: {:?}", input_dir));
        }

        let multi_progress = MultiProgress::new();
        let folder_pb = multi_progress.add(ProgressBar::new(books.len() as u64));
        folder_pb.set_style(bar_style());
        folder_pb.set_prefix("books");

        let mut summary = FolderSummary::default();
        let overrides = MetadataOverrides::default();
        let output_dirs = Self::folder_output_dirs(&books, output_root.as_deref());
        let no_skips = BTreeSet::new();

        for (book, output_dir) in books.iter().zip(&output_dirs) {
            if self.cancel.is_cancelled() {
                warn!("Cancelled; {} book(s) not started", books.len() - folder_pb.position() as usize);
                break;
            }

            let file_name = book
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            folder_pb.set_message(format!("Processing: {}", file_name));

            match self
                .run_with_progress(book, output_dir, &overrides, &no_skips, &multi_progress)
                .await
            {
                Ok(_) => summary.succeeded += 1,
                Err(e) => {
                    if matches!(e.downcast_ref::<PipelineError>(), Some(PipelineError::Cancelled { .. })) {
                        summary.cancelled += 1;
                    } else {
                        summary.failed += 1;
                    }
                    error!("Failed to process {:?}: {}", book, e);
                }
            }
            folder_pb.inc(1);
        }

        folder_pb.finish_with_message("done");
        info!(
            "Processed {} book(s) in {}: {} succeeded, {} failed, {} cancelled",
            books.len(),
            format_duration(start_time.elapsed().as_secs_f64()),
            summary.succeeded,
            summary.failed,
            summary.cancelled
        );
        Ok(summary)
    }

    /// Write artifacts for the chapters completed so far in `book_dir`
    pub fn export_partial(&self, book_dir: &Path) -> Result<BookTimingMap> {
        let map = export_partial(book_dir)
            .with_context(|| format!("Failed to export partial book from {:?}", book_dir))?;
        info!(
            "Exported {} chapter(s), {}",
            map.chapter_count,
            format_duration(map.total_duration)
        );
        Ok(map)
    }
}
