/*!
 * Book processor: drives one book from source text to artifacts.
 *
 * Chapters are handled strictly in order. Each finished chapter is written
 * to the checkpoint before the next one starts, and a chapter already in the
 * checkpoint is rebuilt from its record instead of being synthesized again.
 * Cancellation is only honored between chapters.
 */

use log::{debug, error, info, warn};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::Config;
use crate::errors::PipelineError;
use crate::file_utils::{format_duration, FileManager};
use crate::state::{
    hash_file, hash_text, settings_fingerprint, BookIdentity, ChapterRecord, ProcessingState,
    ResumeOutcome, StateStore,
};
use crate::synthesis::wav::ChapterAudio;
use crate::synthesis::{AudioBackend, BackendFactory, LazyBackend, ResilientSynthesizer};
use crate::text::{ChapterDetector, ChapterFilter, DetectedChapter, NumberingGuard, SentenceSplitter, TextCleaner};
use crate::timing::{BookTimingBuilder, BookTimingMap, ChapterTiming, ChapterTimingBuilder};

use super::export::{write_artifacts, ArtifactPaths, Generation};
use super::extract::{PlainTextExtractor, TextExtractor};
use super::metadata::{BookMetadata, MetadataOverrides};
use super::observer::{CancellationFlag, NoopObserver, ProcessingObserver};

/// Directory for chapter audio inside the output directory
pub const AUDIO_DIR: &str = "audio";

/// Result of a completed book
#[derive(Debug, Clone)]
pub struct BookOutput {
    pub output_dir: PathBuf,
    pub timing: BookTimingMap,
    pub artifacts: ArtifactPaths,
    pub resume: ResumeOutcome,
    /// Chapters synthesized in this run
    pub synthesized: Vec<usize>,
    /// Chapters rebuilt from the checkpoint
    pub restored: Vec<usize>,
    /// Chapters without sentences or excluded by the caller
    pub skipped: Vec<usize>,
    /// Sentences that fell back to silence
    pub silent_sentences: usize,
}

struct ChapterResult {
    timing: ChapterTiming,
    silent_sentences: usize,
}

/// Orchestrates extraction, detection, synthesis, timing and checkpointing
pub struct BookProcessor {
    config: Config,
    backend: LazyBackend,
    synthesizer: ResilientSynthesizer,
    extractor: Arc<dyn TextExtractor>,
    cleaner: TextCleaner,
    detector: ChapterDetector,
    filter: Option<Box<dyn ChapterFilter>>,
    observer: Arc<dyn ProcessingObserver>,
    cancel: CancellationFlag,
    skip_chapters: BTreeSet<usize>,
}

impl BookProcessor {
    /// Processor using the backends listed in the configuration
    pub fn new(config: Config) -> Result<Self, PipelineError> {
        let factory = BackendFactory::from_config(&config.synthesis);
        Self::with_backends(config, factory)
    }

    /// Processor selecting from an explicit candidate list
    pub fn with_backends(config: Config, factory: BackendFactory) -> Result<Self, PipelineError> {
        Self::build(config, LazyBackend::new(factory))
    }

    /// Processor bound to one backend
    pub fn with_backend(config: Config, backend: Arc<dyn AudioBackend>) -> Result<Self, PipelineError> {
        Self::build(config, LazyBackend::ready(backend))
    }

    fn build(config: Config, backend: LazyBackend) -> Result<Self, PipelineError> {
        config
            .validate()
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        let detector = ChapterDetector::new(&config.chapters)?;
        let filter: Option<Box<dyn ChapterFilter>> = if config.chapters.stop_on_backwards_numbering {
            Some(Box::new(NumberingGuard::default()))
        } else {
            None
        };

        Ok(Self {
            synthesizer: ResilientSynthesizer::from_config(&config.synthesis),
            backend,
            extractor: Arc::new(PlainTextExtractor),
            cleaner: TextCleaner::new(),
            detector,
            filter,
            observer: Arc::new(NoopObserver),
            cancel: CancellationFlag::new(),
            skip_chapters: BTreeSet::new(),
            config,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProcessingObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Replace the post-detection chapter filter
    pub fn with_chapter_filter(mut self, filter: Box<dyn ChapterFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Leave these chapter numbers out of this run.
    ///
    /// Skipped chapters are absent from the outputs but are not written to the
    /// checkpoint, so a later run without them still synthesizes them.
    pub fn with_skip_chapters<I: IntoIterator<Item = usize>>(mut self, chapters: I) -> Self {
        self.skip_chapters = chapters.into_iter().collect();
        self
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Whether a backend has been selected yet
    pub fn backend_initialized(&self) -> bool {
        self.backend.is_initialized()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Process the book stored at `source`
    pub async fn process_book(
        &self,
        source: &Path,
        output_dir: &Path,
        overrides: &MetadataOverrides,
    ) -> Result<BookOutput, PipelineError> {
        let raw = self.extractor.extract(source).await?;
        let source_hash = hash_file(source).await?;
        let metadata = BookMetadata::resolve(source, &raw, overrides);

        self.run(&raw, metadata, source.display().to_string(), source_hash, output_dir)
            .await
    }

    /// Process in-memory text; `source_name` stands in for the file name
    pub async fn process_text(
        &self,
        text: &str,
        source_name: &str,
        output_dir: &Path,
        overrides: &MetadataOverrides,
    ) -> Result<BookOutput, PipelineError> {
        if text.trim().is_empty() {
            return Err(PipelineError::Extraction(format!("{} contains no text", source_name)));
        }
        let metadata = BookMetadata::resolve(Path::new(source_name), text, overrides);
        self.run(text, metadata, source_name.to_string(), hash_text(text), output_dir)
            .await
    }

    /// Detect chapters the way a run would, without synthesizing anything
    pub fn detect_chapters(&self, raw: &str) -> (String, Vec<DetectedChapter>) {
        let text = self.prepare_text(raw);
        let chapters = self.detector.detect_filtered(&text, self.filter.as_deref());
        (text, chapters)
    }

    fn prepare_text(&self, raw: &str) -> String {
        if self.config.cleaning.enabled {
            self.cleaner.clean(raw)
        } else {
            raw.to_string()
        }
    }

    async fn run(
        &self,
        raw: &str,
        metadata: BookMetadata,
        source_file: String,
        source_hash: String,
        output_dir: &Path,
    ) -> Result<BookOutput, PipelineError> {
        let (text, chapters) = self.detect_chapters(raw);
        if text.trim().is_empty() {
            return Err(PipelineError::Extraction(format!(
                "{} contains no text after cleaning",
                source_file
            )));
        }
        info!(
            "'{}' by {}: {} chapter(s) detected",
            metadata.title,
            metadata.author,
            chapters.len()
        );

        FileManager::ensure_dir(output_dir.join(AUDIO_DIR)).map_err(|e| PipelineError::Output {
            artifact: AUDIO_DIR.to_string(),
            message: e.to_string(),
        })?;

        let identity = BookIdentity {
            book_id: metadata.book_id.clone(),
            source_file,
            source_hash,
            settings_fingerprint: settings_fingerprint(&self.config),
            title: metadata.title.clone(),
            author: metadata.author.clone(),
        };

        let store = StateStore::in_dir(output_dir);
        let (mut state, resume) = if self.config.resume.enabled {
            store.resume_or_create(&identity, chapters.len())
        } else {
            (ProcessingState::new(&identity, chapters.len()), ResumeOutcome::Fresh)
        };
        self.observer.on_book_start(&metadata.title, chapters.len(), &resume);

        let mut book = BookTimingBuilder::new(&metadata.book_id, &metadata.title, &metadata.author);
        let mut synthesized = Vec::new();
        let mut restored = Vec::new();
        let mut skipped = Vec::new();
        let mut silent_sentences = 0;

        for chapter in &chapters {
            let number = chapter.number;

            if self.cancel.is_cancelled() {
                store.save(&mut state)?;
                info!("Cancelled before chapter {}; progress saved", number);
                return Err(PipelineError::Cancelled { next_chapter: number });
            }

            if self.skip_chapters.contains(&number) {
                info!("Skipping chapter {} ('{}')", number, chapter.title);
                self.observer.on_chapter_skipped(number);
                skipped.push(number);
                continue;
            }

            if let Some(timing) = self.restore_chapter(&mut state, chapter, output_dir) {
                self.observer.on_chapter_restored(number, &timing);
                book.add_chapter(timing);
                restored.push(number);
                continue;
            }
            if state.skipped_chapters.contains(&number) {
                skipped.push(number);
                continue;
            }

            match self.process_chapter(chapter, &text, output_dir).await {
                Ok(result) => {
                    state.record_chapter(number, ChapterRecord::from_timing(&result.timing));
                    store.save(&mut state)?;
                    info!(
                        "Chapter {} complete: {} sentences, {}",
                        number,
                        result.timing.sentence_count(),
                        format_duration(result.timing.duration)
                    );
                    self.observer.on_chapter_complete(number, &result.timing);
                    silent_sentences += result.silent_sentences;
                    book.add_chapter(result.timing);
                    synthesized.push(number);
                }
                Err(PipelineError::NoSentences { chapter: n }) => {
                    warn!("Chapter {} ('{}') has no sentences, skipping", n, chapter.title);
                    state.record_skipped(n);
                    store.save(&mut state)?;
                    self.observer.on_chapter_skipped(n);
                    skipped.push(n);
                }
                Err(e) => {
                    if let Err(save_error) = store.save(&mut state) {
                        error!("Failed to save progress after chapter failure: {}", save_error);
                    }
                    return Err(e);
                }
            }
        }

        let timing = book.build();
        let artifacts = write_artifacts(
            output_dir,
            &timing,
            Generation::from_config(&self.config.synthesis),
        )?;

        if self.config.resume.keep_completed_state {
            let archived = store.archive()?;
            debug!("Checkpoint archived to {}", archived.display());
        } else {
            store.remove()?;
        }

        info!(
            "Finished '{}': {} chapter(s), {}",
            timing.title,
            timing.chapter_count,
            format_duration(timing.total_duration)
        );
        if silent_sentences > 0 {
            warn!("{} sentence(s) were replaced with silence", silent_sentences);
        }

        let output = BookOutput {
            output_dir: output_dir.to_path_buf(),
            timing,
            artifacts,
            resume,
            synthesized,
            restored,
            skipped,
            silent_sentences,
        };
        self.observer.on_book_complete(&output);
        Ok(output)
    }

    /// Timing of a checkpointed chapter, if it can be reused as is
    fn restore_chapter(
        &self,
        state: &mut ProcessingState,
        chapter: &DetectedChapter,
        output_dir: &Path,
    ) -> Option<ChapterTiming> {
        let timing = state
            .chapter_record(chapter.number)
            .map(|record| record.to_timing(chapter.chapter_id()))?;

        if !timing.is_consistent() {
            warn!("Checkpointed timing for chapter {} is inconsistent, redoing it", chapter.number);
        } else if !output_dir.join(&timing.audio_file).is_file() {
            warn!("Audio for chapter {} is missing, redoing it", chapter.number);
        } else {
            debug!("Chapter {} restored from checkpoint", chapter.number);
            return Some(timing);
        }

        state.invalidate_chapter(chapter.number);
        None
    }

    async fn process_chapter(
        &self,
        chapter: &DetectedChapter,
        text: &str,
        output_dir: &Path,
    ) -> Result<ChapterResult, PipelineError> {
        let number = chapter.number;
        let chapter_id = chapter.chapter_id();

        let mut splitter = SentenceSplitter::new(&chapter_id);
        let sentences = splitter.split(chapter.text(text));
        if sentences.is_empty() {
            return Err(PipelineError::NoSentences { chapter: number });
        }
        self.observer.on_chapter_start(chapter, sentences.len());
        info!("Chapter {} ('{}'): {} sentences", number, chapter.title, sentences.len());

        let backend = self.backend.get().await?;
        let mut timeline = ChapterTimingBuilder::new(self.config.pacing);
        let mut audio = ChapterAudio::new(self.config.synthesis.sample_rate);
        let mut silent_sentences = 0;

        for (index, sentence) in sentences.iter().enumerate() {
            let segment = self
                .synthesizer
                .synthesize(&**backend, &sentence.text)
                .await
                .map_err(|e| PipelineError::ChapterProcessing {
                    chapter: number,
                    message: format!("{}: {}", sentence.id, e),
                })?;
            if segment.fallback {
                silent_sentences += 1;
            }

            let placement = timeline.push(sentence, segment.audio.duration_secs());
            audio.place(placement.start, &segment.audio);
            self.observer.on_sentence_done(number, index + 1, sentences.len());
        }

        audio.pad_to(timeline.cursor());
        if self.config.synthesis.normalize_audio {
            audio.normalize(self.config.synthesis.target_db);
        }

        let audio_file = format!("{}/{}.wav", AUDIO_DIR, chapter_id);
        audio
            .write(&output_dir.join(&audio_file))
            .map_err(|e| PipelineError::ChapterProcessing {
                chapter: number,
                message: format!("writing {}: {}", audio_file, e),
            })?;

        Ok(ChapterResult {
            timing: timeline.finish(chapter_id, chapter.title.clone(), audio_file),
            silent_sentences,
        })
    }
}
