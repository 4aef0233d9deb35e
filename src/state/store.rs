/*!
 * Checkpoint persistence.
 *
 * The checkpoint lives next to the book's outputs. Writes go through a
 * temporary file in the same directory that is synced and renamed over the
 * previous checkpoint, so an interrupted write leaves the old one intact.
 */

use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::app_config::Config;
use crate::errors::StateError;

use super::models::{BookIdentity, IdentityCheck, ProcessingState, ResumeOutcome};

/// Checkpoint file name inside the output directory
pub const STATE_FILE_NAME: &str = "processing_state.json";

/// Name the checkpoint is archived under once the book is complete
pub const ARCHIVED_STATE_FILE_NAME: &str = "processing_state.completed.json";

/// Reads and writes `processing_state.json`
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for the checkpoint inside `output_dir`
    pub fn in_dir(output_dir: &Path) -> Self {
        Self::new(output_dir.join(STATE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load the checkpoint, if one exists
    pub fn load(&self) -> Result<Option<ProcessingState>, StateError> {
        if !self.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StateError::Corrupted {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })
    }

    /// Persist the checkpoint atomically
    pub fn save(&self, state: &mut ProcessingState) -> Result<(), StateError> {
        state.touch();
        let json = serde_json::to_string_pretty(state)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(json.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;

        debug!(
            "Checkpoint saved: {}/{} chapters complete",
            state.completed_count(),
            state.total_chapters
        );
        Ok(())
    }

    /// Delete the checkpoint
    pub fn remove(&self) -> Result<(), StateError> {
        if self.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    /// Move the checkpoint aside under its archived name
    pub fn archive(&self) -> Result<PathBuf, StateError> {
        let target = self.path.with_file_name(ARCHIVED_STATE_FILE_NAME);
        if self.exists() {
            fs::rename(&self.path, &target)?;
        }
        Ok(target)
    }

    /// Load a matching checkpoint or start a new one
    pub fn resume_or_create(
        &self,
        identity: &BookIdentity,
        total_chapters: usize,
    ) -> (ProcessingState, ResumeOutcome) {
        let fresh = || ProcessingState::new(identity, total_chapters);

        let existing = match self.load() {
            Ok(Some(state)) => state,
            Ok(None) => return (fresh(), ResumeOutcome::Fresh),
            Err(e) => {
                warn!("Ignoring unreadable checkpoint: {}", e);
                return (
                    fresh(),
                    ResumeOutcome::Corrupted {
                        reason: e.to_string(),
                    },
                );
            }
        };

        match existing.check_identity(identity, total_chapters) {
            IdentityCheck::Matches => {
                let completed = existing.completed_count();
                info!(
                    "Resuming '{}': {}/{} chapters already complete",
                    existing.title, completed, total_chapters
                );
                (existing, ResumeOutcome::Resumed { completed })
            }
            IdentityCheck::SourceChanged => {
                warn!(
                    "Source changed since the checkpoint was written (old: {}, new: {}), starting over",
                    short_hash(&existing.source_hash),
                    short_hash(&identity.source_hash)
                );
                (
                    fresh(),
                    ResumeOutcome::SourceChanged {
                        old_hash: existing.source_hash,
                        new_hash: identity.source_hash.clone(),
                    },
                )
            }
            IdentityCheck::SettingsChanged => {
                warn!("Detection or pacing settings changed since the checkpoint was written, starting over");
                (fresh(), ResumeOutcome::SettingsChanged)
            }
        }
    }
}

fn short_hash(hash: &str) -> &str {
    &hash[..8.min(hash.len())]
}

/// Compute SHA256 hash of a file
pub async fn hash_file(path: &Path) -> Result<String, StateError> {
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let mut file = fs::File::open(&path)?;
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 8192];

        loop {
            let bytes_read = file.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    })
    .await
    .map_err(|e| StateError::Io(std::io::Error::other(format!("hashing task failed: {}", e))))?
}

/// SHA256 of in-memory text
pub fn hash_text(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// Fingerprint of the settings that decide chapter numbering and timing
pub fn settings_fingerprint(config: &Config) -> String {
    let settings = serde_json::json!({
        "patterns": config.chapters.patterns,
        "min_length": config.chapters.min_length,
        "case_insensitive": config.chapters.case_insensitive,
        "stop_on_backwards_numbering": config.chapters.stop_on_backwards_numbering,
        "sentence_pause": config.pacing.sentence_pause,
        "paragraph_pause": config.pacing.paragraph_pause,
        "cleaning": config.cleaning.enabled,
    });
    hash_text(&settings.to_string())
}
