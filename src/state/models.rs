/*!
 * Checkpoint data model.
 *
 * `processing_state.json` records every chapter that has been fully
 * synthesized, with enough timing data to rebuild its timing map without
 * calling a backend again. It is keyed to the source bytes and to the
 * settings that determine chapter numbering and timing.
 */

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::timing::{ChapterTiming, TimingEntry};

/// What a checkpoint belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookIdentity {
    pub book_id: String,
    pub source_file: String,
    /// SHA-256 of the source bytes
    pub source_hash: String,
    /// SHA-256 over the settings that affect numbering and timing
    pub settings_fingerprint: String,
    pub title: String,
    pub author: String,
}

/// A completed chapter as stored in the checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterRecord {
    pub title: String,
    /// Audio file relative to the output directory
    pub audio_path: String,
    pub duration: f64,
    pub timing_entries: Vec<TimingEntry>,
}

impl ChapterRecord {
    pub fn from_timing(timing: &ChapterTiming) -> Self {
        Self {
            title: timing.title.clone(),
            audio_path: timing.audio_file.clone(),
            duration: timing.duration,
            timing_entries: timing.entries.clone(),
        }
    }

    /// Rebuild the chapter timing exactly as it was recorded
    pub fn to_timing(&self, chapter_id: impl Into<String>) -> ChapterTiming {
        ChapterTiming {
            chapter_id: chapter_id.into(),
            title: self.title.clone(),
            audio_file: self.audio_path.clone(),
            duration: self.duration,
            entries: self.timing_entries.clone(),
        }
    }
}

/// Persistent progress of one book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingState {
    pub book_id: String,
    pub source_file: String,
    #[serde(default)]
    pub source_hash: String,
    #[serde(default)]
    pub settings_fingerprint: String,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub total_chapters: usize,
    pub completed_chapters: BTreeSet<usize>,
    /// Chapters that yielded no sentences
    #[serde(default)]
    pub skipped_chapters: BTreeSet<usize>,
    pub chapter_data: BTreeMap<usize, ChapterRecord>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl ProcessingState {
    pub fn new(identity: &BookIdentity, total_chapters: usize) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            book_id: identity.book_id.clone(),
            source_file: identity.source_file.clone(),
            source_hash: identity.source_hash.clone(),
            settings_fingerprint: identity.settings_fingerprint.clone(),
            title: identity.title.clone(),
            author: identity.author.clone(),
            total_chapters,
            completed_chapters: BTreeSet::new(),
            skipped_chapters: BTreeSet::new(),
            chapter_data: BTreeMap::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Completed with recorded data
    pub fn is_chapter_complete(&self, number: usize) -> bool {
        self.completed_chapters.contains(&number) && self.chapter_data.contains_key(&number)
    }

    /// Completed or skipped
    pub fn is_chapter_covered(&self, number: usize) -> bool {
        self.is_chapter_complete(number) || self.skipped_chapters.contains(&number)
    }

    pub fn record_chapter(&mut self, number: usize, record: ChapterRecord) {
        self.skipped_chapters.remove(&number);
        self.chapter_data.insert(number, record);
        self.completed_chapters.insert(number);
    }

    pub fn record_skipped(&mut self, number: usize) {
        self.skipped_chapters.insert(number);
    }

    /// Drop a chapter so it is processed again
    pub fn invalidate_chapter(&mut self, number: usize) {
        self.completed_chapters.remove(&number);
        self.chapter_data.remove(&number);
    }

    pub fn chapter_record(&self, number: usize) -> Option<&ChapterRecord> {
        if self.completed_chapters.contains(&number) {
            self.chapter_data.get(&number)
        } else {
            None
        }
    }

    /// Every chapter is completed or skipped
    pub fn is_book_complete(&self) -> bool {
        self.total_chapters > 0 && (1..=self.total_chapters).all(|n| self.is_chapter_covered(n))
    }

    /// First chapter that still needs work
    pub fn next_pending(&self) -> Option<usize> {
        (1..=self.total_chapters).find(|n| !self.is_chapter_covered(*n))
    }

    pub fn completed_count(&self) -> usize {
        self.completed_chapters.len()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now().to_rfc3339();
    }

    /// Whether this checkpoint belongs to `identity`
    pub fn check_identity(&self, identity: &BookIdentity, total_chapters: usize) -> IdentityCheck {
        if self.source_hash != identity.source_hash {
            return IdentityCheck::SourceChanged;
        }
        if self.settings_fingerprint != identity.settings_fingerprint
            || self.total_chapters != total_chapters
        {
            return IdentityCheck::SettingsChanged;
        }
        if self.book_id != identity.book_id {
            return IdentityCheck::SettingsChanged;
        }
        IdentityCheck::Matches
    }
}

/// Outcome of comparing a checkpoint against the current run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityCheck {
    Matches,
    SourceChanged,
    SettingsChanged,
}

/// How the run's starting state was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// No usable checkpoint; starting from chapter 1
    Fresh,
    /// Checkpoint loaded
    Resumed {
        /// Chapters already completed
        completed: usize,
    },
    /// Checkpoint was for different source bytes and was discarded
    SourceChanged { old_hash: String, new_hash: String },
    /// Checkpoint was made with settings that renumber chapters or shift timings
    SettingsChanged,
    /// Checkpoint could not be parsed and was discarded
    Corrupted { reason: String },
}

impl ResumeOutcome {
    pub fn is_resumed(&self) -> bool {
        matches!(self, ResumeOutcome::Resumed { .. })
    }
}
