/*!
 * Text analysis: cleaning, chapter detection and sentence segmentation.
 */

pub mod chapters;
pub mod cleaner;
pub mod sentences;

pub use chapters::{chapter_id, ChapterDetector, ChapterFilter, DetectedChapter, NumberingGuard};
pub use cleaner::TextCleaner;
pub use sentences::{Sentence, SentenceSplitter};
