/*!
 * Progress reporting and cancellation hooks for the book processor.
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::state::ResumeOutcome;
use crate::text::DetectedChapter;
use crate::timing::ChapterTiming;

use super::processor::BookOutput;

/// Receives progress events. Every method defaults to doing nothing.
pub trait ProcessingObserver: Send + Sync {
    fn on_book_start(&self, _title: &str, _total_chapters: usize, _outcome: &ResumeOutcome) {}

    /// A chapter was rebuilt from the checkpoint
    fn on_chapter_restored(&self, _number: usize, _timing: &ChapterTiming) {}

    fn on_chapter_start(&self, _chapter: &DetectedChapter, _sentence_count: usize) {}

    /// `done` of `total` sentences in the current chapter are synthesized
    fn on_sentence_done(&self, _chapter: usize, _done: usize, _total: usize) {}

    fn on_chapter_complete(&self, _number: usize, _timing: &ChapterTiming) {}

    /// The chapter yielded no sentences
    fn on_chapter_skipped(&self, _number: usize) {}

    fn on_book_complete(&self, _output: &BookOutput) {}
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProcessingObserver for NoopObserver {}

/// Shared stop request, honored before each chapter starts
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
