/*!
 * Timing map construction.
 *
 * Each sentence's audio is laid end to end on a chapter timeline. A fixed
 * pause follows every sentence and an extra pause precedes the first
 * sentence of each new paragraph. The chapter duration is the end of the
 * last sentence; the trailing pause stays in the audio but is not counted.
 *
 * Serialized times are rounded to milliseconds when the entry is built, so a
 * chapter restored from a checkpoint serializes exactly as it did originally.
 */

use serde::{Deserialize, Serialize};

use crate::app_config::PacingConfig;
use crate::text::Sentence;

/// Timing map format version
pub const TIMING_VERSION: &str = "1.0";

/// Round seconds to milliseconds
pub fn round3(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

/// A sentence placed on the chapter timeline, in unrounded seconds
#[derive(Debug, Clone, PartialEq)]
pub struct TimedSegment {
    pub sentence_id: String,
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
}

impl TimedSegment {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Millisecond-rounded entry for export
    pub fn to_entry(&self, paragraph: usize) -> TimingEntry {
        TimingEntry {
            id: self.sentence_id.clone(),
            start: round3(self.start_time),
            end: round3(self.end_time),
            text: self.text.clone(),
            paragraph,
        }
    }
}

/// Serialized form of a timed sentence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingEntry {
    pub id: String,
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub paragraph: usize,
}

/// Timing for one chapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterTiming {
    pub chapter_id: String,
    pub title: String,
    pub audio_file: String,
    pub duration: f64,
    pub entries: Vec<TimingEntry>,
}

impl ChapterTiming {
    pub fn sentence_count(&self) -> usize {
        self.entries.len()
    }

    /// Entries are ordered, non-overlapping and fit inside the duration
    pub fn is_consistent(&self) -> bool {
        let ordered = self.entries.iter().all(|e| e.start <= e.end)
            && self
                .entries
                .windows(2)
                .all(|pair| pair[0].end <= pair[1].start);
        let fits = self
            .entries
            .last()
            .is_none_or(|last| self.duration >= last.end);
        ordered && fits
    }
}

/// Timing for a whole book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookTimingMap {
    pub version: String,
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub total_duration: f64,
    pub chapter_count: usize,
    pub chapters: Vec<ChapterTiming>,
}

/// Where a sentence landed on the timeline, in unrounded seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Pause inserted before the sentence
    pub leading_pause: f64,
    pub start: f64,
    pub end: f64,
}

/// Accumulates sentence durations into a chapter timeline.
///
/// Segments are kept unrounded; rounding happens once, when entries are built.
/// Negative pauses count as zero.
#[derive(Debug, Clone)]
pub struct ChapterTimingBuilder {
    sentence_pause: f64,
    paragraph_pause: f64,
    cursor: f64,
    last_paragraph: Option<usize>,
    segments: Vec<(TimedSegment, usize)>,
}

impl ChapterTimingBuilder {
    pub fn new(pacing: PacingConfig) -> Self {
        Self {
            sentence_pause: pacing.sentence_pause.max(0.0),
            paragraph_pause: pacing.paragraph_pause.max(0.0),
            cursor: 0.0,
            last_paragraph: None,
            segments: Vec::new(),
        }
    }

    /// Place the next sentence, given the duration of its audio
    pub fn push(&mut self, sentence: &Sentence, duration: f64) -> Placement {
        let leading_pause = match self.last_paragraph {
            Some(previous) if previous != sentence.paragraph_id => self.paragraph_pause,
            _ => 0.0,
        };
        self.cursor += leading_pause;

        let start = self.cursor;
        let end = start + duration.max(0.0);
        self.segments.push((
            TimedSegment {
                sentence_id: sentence.id.clone(),
                text: sentence.text.clone(),
                start_time: start,
                end_time: end,
            },
            sentence.paragraph_id,
        ));

        self.cursor = end + self.sentence_pause;
        self.last_paragraph = Some(sentence.paragraph_id);

        Placement {
            leading_pause,
            start,
            end,
        }
    }

    /// Current end of the timeline including the trailing pause
    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    /// Segments placed so far, in sentence order
    pub fn segments(&self) -> impl Iterator<Item = &TimedSegment> {
        self.segments.iter().map(|(segment, _)| segment)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn finish(
        self,
        chapter_id: impl Into<String>,
        title: impl Into<String>,
        audio_file: impl Into<String>,
    ) -> ChapterTiming {
        let duration = self.segments.last().map(|(s, _)| s.end_time).unwrap_or(0.0);
        ChapterTiming {
            chapter_id: chapter_id.into(),
            title: title.into(),
            audio_file: audio_file.into(),
            duration: round3(duration),
            entries: self
                .segments
                .iter()
                .map(|(segment, paragraph)| segment.to_entry(*paragraph))
                .collect(),
        }
    }
}

/// Collects chapter timings into the book map
#[derive(Debug, Clone)]
pub struct BookTimingBuilder {
    book_id: String,
    title: String,
    author: String,
    chapters: Vec<ChapterTiming>,
}

impl BookTimingBuilder {
    pub fn new(
        book_id: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            book_id: book_id.into(),
            title: title.into(),
            author: author.into(),
            chapters: Vec::new(),
        }
    }

    pub fn add_chapter(&mut self, chapter: ChapterTiming) {
        self.chapters.push(chapter);
    }

    pub fn build(self) -> BookTimingMap {
        let total: f64 = self.chapters.iter().map(|c| c.duration).sum();
        BookTimingMap {
            version: TIMING_VERSION.to_string(),
            book_id: self.book_id,
            title: self.title,
            author: self.author,
            total_duration: round3(total),
            chapter_count: self.chapters.len(),
            chapters: self.chapters,
        }
    }
}
