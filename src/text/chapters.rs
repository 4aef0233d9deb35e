/*!
 * Chapter boundary detection.
 *
 * Headings are located with an ordered list of multi-line regexes. Every
 * match start becomes a candidate boundary; candidates are sorted by offset,
 * duplicates at the same offset collapse onto the earliest pattern, and each
 * span runs to the next boundary. Spans shorter than the configured minimum
 * are discarded, and a text with no surviving span becomes a single
 * "Full Text" chapter.
 */

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::app_config::ChapterConfig;
use crate::errors::PipelineError;

/// Title given to the synthetic chapter when no heading survives
pub const FULL_TEXT_TITLE: &str = "Full Text";

static HEADING_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// A detected chapter span within the source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedChapter {
    /// 1-based chapter number, assigned after filtering
    pub number: usize,
    /// Trimmed heading literal
    pub title: String,
    /// Byte offset of the heading in the source text
    pub start: usize,
    /// Byte offset where the span ends (exclusive)
    pub end: usize,
}

impl DetectedChapter {
    /// Slice of the source text covered by this chapter
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    /// Stable chapter identifier (`ch01`, `ch02`, ...)
    pub fn chapter_id(&self) -> String {
        chapter_id(self.number)
    }

    /// Number written in the heading, if any
    pub fn heading_number(&self) -> Option<usize> {
        HEADING_NUMBER
            .find(&self.title)
            .and_then(|m| m.as_str().parse().ok())
    }
}

/// Format a chapter number as its identifier
pub fn chapter_id(number: usize) -> String {
    format!("ch{:02}", number)
}

/// Post-detection filter applied before numbering
pub trait ChapterFilter: Send + Sync {
    /// Return the chapters to keep, in order
    fn filter(&self, chapters: Vec<DetectedChapter>) -> Vec<DetectedChapter>;
}

/// Detects chapter spans using ordered heading patterns
#[derive(Debug, Clone)]
pub struct ChapterDetector {
    patterns: Vec<Regex>,
    min_length: usize,
}

impl ChapterDetector {
    /// Build a detector from configuration
    pub fn new(config: &ChapterConfig) -> Result<Self, PipelineError> {
        Self::with_patterns(&config.patterns, config.min_length, config.case_insensitive)
    }

    /// Build a detector from explicit patterns
    pub fn with_patterns<S: AsRef<str>>(
        patterns: &[S],
        min_length: usize,
        case_insensitive: bool,
    ) -> Result<Self, PipelineError> {
        let compiled = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p.as_ref())
                    .multi_line(true)
                    .case_insensitive(case_insensitive)
                    .build()
                    .map_err(|e| {
                        PipelineError::Config(format!(
                            "chapter pattern '{}' does not compile: {}",
                            p.as_ref(),
                            e
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            patterns: compiled,
            min_length,
        })
    }

    /// Detect chapters in `text`
    pub fn detect(&self, text: &str) -> Vec<DetectedChapter> {
        self.detect_filtered(text, None)
    }

    /// Detect chapters, applying an optional filter before numbering
    pub fn detect_filtered(
        &self,
        text: &str,
        filter: Option<&dyn ChapterFilter>,
    ) -> Vec<DetectedChapter> {
        // (offset, title); pattern order is preserved by the stable sort
        let mut boundaries: Vec<(usize, String)> = Vec::new();
        for pattern in &self.patterns {
            for m in pattern.find_iter(text) {
                boundaries.push((m.start(), m.as_str().trim().to_string()));
            }
        }
        boundaries.sort_by_key(|(offset, _)| *offset);
        boundaries.dedup_by_key(|(offset, _)| *offset);

        let mut chapters = Vec::new();
        for (i, (start, title)) in boundaries.iter().enumerate() {
            let end = boundaries
                .get(i + 1)
                .map(|(next, _)| *next)
                .unwrap_or(text.len());
            let length = text[*start..end].chars().count();
            if length >= self.min_length {
                chapters.push(DetectedChapter {
                    number: 0,
                    title: title.clone(),
                    start: *start,
                    end,
                });
            } else {
                debug!("Dropping short chapter '{}' ({} chars)", title, length);
            }
        }

        if let Some(filter) = filter {
            chapters = filter.filter(chapters);
        }

        if chapters.is_empty() {
            if !boundaries.is_empty() {
                warn!(
                    "{} heading(s) matched but none spanned {} characters, using full text",
                    boundaries.len(),
                    self.min_length
                );
            }
            return vec![DetectedChapter {
                number: 1,
                title: FULL_TEXT_TITLE.to_string(),
                start: 0,
                end: text.len(),
            }];
        }

        for (i, chapter) in chapters.iter_mut().enumerate() {
            chapter.number = i + 1;
        }
        chapters
    }
}

/// Drops every chapter from the first heading whose number goes backwards.
///
/// Front matter such as tables of contents or a book's own appendix often
/// restarts numbering; everything from that point on is discarded.
#[derive(Debug, Clone, Copy)]
pub struct NumberingGuard {
    repeat_threshold: usize,
}

impl NumberingGuard {
    pub fn new(repeat_threshold: usize) -> Self {
        Self { repeat_threshold }
    }
}

impl Default for NumberingGuard {
    fn default() -> Self {
        Self::new(20)
    }
}

impl ChapterFilter for NumberingGuard {
    fn filter(&self, chapters: Vec<DetectedChapter>) -> Vec<DetectedChapter> {
        let mut highest = 0usize;
        let mut kept = Vec::with_capacity(chapters.len());

        for chapter in chapters {
            if let Some(n) = chapter.heading_number() {
                let backwards = n < highest || (n == highest && highest >= self.repeat_threshold);
                if backwards {
                    warn!(
                        "Chapter numbering went backwards at '{}' (after {}), dropping the rest",
                        chapter.title, highest
                    );
                    break;
                }
                highest = highest.max(n);
            }
            kept.push(chapter);
        }

        kept
    }
}
