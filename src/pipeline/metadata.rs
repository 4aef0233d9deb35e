/*!
 * Book title, author and identifier.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::file_utils::{book_id_from_title, title_from_path};

/// Author used when none is given or found
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// Lines scanned for an author credit
const AUTHOR_SCAN_LINES: usize = 50;

static AUTHOR_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:written\s+by|by|author:?)\s+(\S.*)$").unwrap()
});

/// Values supplied by the operator; they win over anything detected
#[derive(Debug, Clone, Default)]
pub struct MetadataOverrides {
    pub title: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookMetadata {
    pub book_id: String,
    pub title: String,
    pub author: String,
}

impl BookMetadata {
    /// Resolve metadata for a book read from `source`
    pub fn resolve(source: &Path, text: &str, overrides: &MetadataOverrides) -> Self {
        let title = overrides
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| title_from_path(source));
        let author = overrides
            .author
            .clone()
            .filter(|a| !a.trim().is_empty())
            .or_else(|| detect_author(text))
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

        let mut book_id = book_id_from_title(&title);
        if book_id.is_empty() {
            book_id = "book".to_string();
        }

        Self {
            book_id,
            title,
            author,
        }
    }
}

/// Author from a "by ..." credit near the top of the text
pub fn detect_author(text: &str) -> Option<String> {
    text.lines()
        .take(AUTHOR_SCAN_LINES)
        .filter_map(|line| AUTHOR_LINE.captures(line.trim()))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
        .find(|author| !author.is_empty())
}
