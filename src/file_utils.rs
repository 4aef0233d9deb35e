use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

// @module: File and directory utilities

static NON_SLUG_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static DASH_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());
static STEM_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-_]+").unwrap());

/// Longest book id, in characters
pub const MAX_BOOK_ID_LEN: usize = 50;

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    /// Find files with any of the given extensions under a directory, sorted by path
    pub fn find_files<P: AsRef<Path>>(dir: P, extensions: &[&str]) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if path.is_file() {
                if let Some(ext) = path.extension() {
                    let ext = ext.to_string_lossy();
                    if extensions
                        .iter()
                        .any(|wanted| ext.eq_ignore_ascii_case(wanted.trim_start_matches('.')))
                    {
                        result.push(path.to_path_buf());
                    }
                }
            }
        }

        result.sort();
        Ok(result)
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write bytes through a temp file in the same directory, then rename over `path`.
    ///
    /// Readers see either the previous file or the complete new one.
    pub fn write_atomic<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
        let path = path.as_ref();
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::ensure_dir(&parent)?;

        let mut temp = NamedTempFile::new_in(&parent)
            .with_context(|| format!("Failed to create temp file in {:?}", parent))?;
        temp.write_all(content)
            .with_context(|| format!("Failed to write temp file for {:?}", path))?;
        temp.as_file()
            .sync_all()
            .with_context(|| format!("Failed to sync temp file for {:?}", path))?;
        temp.persist(path)
            .with_context(|| format!("Failed to move temp file to {:?}", path))?;

        Ok(())
    }

    /// Serialize as pretty JSON and write atomically
    pub fn write_json_atomic<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
        Self::write_atomic(path, json.as_bytes())
    }

    /// Detect the kind of a source document from its extension
    pub fn detect_file_type<P: AsRef<Path>>(path: P) -> Result<FileType> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(anyhow::anyhow!("File does not exist: {:?}", path));
        }

        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        Ok(match ext.as_str() {
            "txt" | "text" => FileType::PlainText,
            "md" | "markdown" => FileType::Markdown,
            "pdf" => FileType::Pdf,
            "docx" => FileType::Docx,
            "epub" => FileType::Epub,
            _ => FileType::Unknown,
        })
    }
}

/// Enum representing different source document types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// UTF-8 text
    PlainText,
    /// Markdown, read as text
    Markdown,
    /// PDF document
    Pdf,
    /// Word document
    Docx,
    /// EPUB book
    Epub,
    /// Unknown file type
    Unknown,
}

impl FileType {
    /// Extensions read directly as text
    pub const TEXT_EXTENSIONS: [&'static str; 4] = ["txt", "text", "md", "markdown"];

    pub fn is_text(&self) -> bool {
        matches!(self, FileType::PlainText | FileType::Markdown)
    }
}

/// URL-safe identifier derived from a title
pub fn book_id_from_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped = NON_SLUG_CHARS.replace_all(&lowered, "");
    let dashed = WHITESPACE_RUN.replace_all(stripped.trim(), "-");
    let collapsed = DASH_RUN.replace_all(&dashed, "-");
    let truncated: String = collapsed.chars().take(MAX_BOOK_ID_LEN).collect();
    truncated.trim_matches('-').to_string()
}

/// Human title from a file name: separators become spaces, words are capitalized
pub fn title_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let spaced = STEM_SEPARATORS.replace_all(&stem, " ");

    spaced
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// `1h 2m 3s` or `2m 3s`
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else {
        format!("{}m {}s", minutes, secs)
    }
}
