/*!
 * Source text extraction.
 *
 * Only UTF-8 text and Markdown are read directly. Other document formats are
 * recognized so they can be rejected with a clear message; converting them is
 * left to an external tool that produces a text file first.
 */

use async_trait::async_trait;
use log::{debug, warn};
use std::fmt::Debug;
use std::path::Path;

use crate::errors::PipelineError;
use crate::file_utils::{FileManager, FileType};

/// Produces the book's raw text from a source file
#[async_trait]
pub trait TextExtractor: Send + Sync + Debug {
    /// Whether this extractor reads `file_type`
    fn supports(&self, file_type: FileType) -> bool;

    /// Read the whole text of `path`
    async fn extract(&self, path: &Path) -> Result<String, PipelineError>;
}

/// Reads `.txt` and `.md` files
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    fn supports(&self, file_type: FileType) -> bool {
        file_type.is_text()
    }

    async fn extract(&self, path: &Path) -> Result<String, PipelineError> {
        let file_type = FileManager::detect_file_type(path)
            .map_err(|e| PipelineError::Extraction(e.to_string()))?;
        if !self.supports(file_type) {
            return Err(PipelineError::Extraction(format!(
                "{:?} sources are not supported, convert {} to text first",
                file_type,
                path.display()
            )));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PipelineError::Extraction(format!("{}: {}", path.display(), e)))?;

        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!("{} is not valid UTF-8, replacing invalid bytes", path.display());
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };
        let text = text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text);

        if text.trim().is_empty() {
            return Err(PipelineError::Extraction(format!(
                "{} contains no text",
                path.display()
            )));
        }

        debug!("Extracted {} characters from {}", text.chars().count(), path.display());
        Ok(text)
    }
}
