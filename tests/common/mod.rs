/*!
 * Common test utilities for the readalong test suite
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

use readalong::app_config::Config;
use readalong::pipeline::{CancellationFlag, ProcessingObserver};
use readalong::timing::ChapterTiming;

/// Sentences produced for each chapter of `sample_book`, heading included
pub const SENTENCES_PER_CHAPTER: usize = 5;

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// A book with `chapters` chapters of three paragraphs each
pub fn sample_book(chapters: usize) -> String {
    let mut text = String::from("by Test Author\n\n");
    for n in 1..=chapters {
        text.push_str(&format!(
            "Chapter {n}\n\n\
             The first sentence of chapter {n}. Dr. Watson arrived at 3.30 pm sharp.\n\n\
             A new paragraph begins here. It ends here.\n\n"
        ));
    }
    text
}

/// Configuration suited to the short sample books
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.chapters.min_length = 20;
    config.synthesis.retry_count = 2;
    config.synthesis.retry_backoff_ms = 0;
    config
}

/// Cancels the shared flag once the given chapter completes
pub struct CancelAfterChapter {
    pub flag: CancellationFlag,
    pub chapter: usize,
}

impl ProcessingObserver for CancelAfterChapter {
    fn on_chapter_complete(&self, number: usize, _timing: &ChapterTiming) {
        if number == self.chapter {
            self.flag.cancel();
        }
    }
}

/// Counts observer events
#[derive(Default)]
pub struct CountingObserver {
    pub completed: AtomicUsize,
    pub restored: AtomicUsize,
    pub skipped: AtomicUsize,
    pub sentences: AtomicUsize,
}

impl CountingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn restored(&self) -> usize {
        self.restored.load(Ordering::SeqCst)
    }

    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    pub fn sentences(&self) -> usize {
        self.sentences.load(Ordering::SeqCst)
    }
}

impl ProcessingObserver for CountingObserver {
    fn on_chapter_restored(&self, _number: usize, _timing: &ChapterTiming) {
        self.restored.fetch_add(1, Ordering::SeqCst);
    }

    fn on_sentence_done(&self, _chapter: usize, _done: usize, _total: usize) {
        self.sentences.fetch_add(1, Ordering::SeqCst);
    }

    fn on_chapter_complete(&self, _number: usize, _timing: &ChapterTiming) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_chapter_skipped(&self, _number: usize) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }
}

/// Parse a JSON artifact written by the pipeline
pub fn read_json(path: &Path) -> Result<serde_json::Value> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}
