/*!
 * Error types for the readalong pipeline.
 *
 * Errors are split by how far they are allowed to travel:
 * - `BackendError`: a single synthesis call failed; absorbed by retry and silence fallback
 * - `StateError`: the checkpoint file could not be read or written
 * - `PipelineError`: chapter-level and run-level failures surfaced to the operator
 * - `AppError`: top-level wrapper used by the controller and the CLI
 */

use thiserror::Error;

/// Errors raised by an audio backend for a single call
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend cannot be used at all (not installed, not reachable)
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// The backend ran but did not produce audio
    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),

    /// The backend request could not be sent or completed
    #[error("Backend request failed: {0}")]
    RequestFailed(String),

    /// The backend responded with an error status
    #[error("Backend responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the backend
        message: String,
    },

    /// The backend returned bytes that are not valid audio
    #[error("Invalid audio returned by backend: {0}")]
    InvalidAudio(String),

    /// The backend call exceeded its deadline
    #[error("Backend call timed out after {0}s")]
    Timeout(u64),
}

impl From<hound::Error> for BackendError {
    fn from(error: hound::Error) -> Self {
        Self::InvalidAudio(error.to_string())
    }
}

/// Errors reading or writing the processing checkpoint
#[derive(Error, Debug)]
pub enum StateError {
    /// The checkpoint exists but cannot be parsed
    #[error("Checkpoint {path} is corrupted: {reason}")]
    Corrupted {
        /// Location of the checkpoint file
        path: String,
        /// Parser message
        reason: String,
    },

    /// No checkpoint where one was required
    #[error("No checkpoint found at {0}")]
    Missing(String),

    /// Filesystem failure while reading or persisting
    #[error("Checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failure while persisting
    #[error("Checkpoint serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors surfaced by the book processing pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The source text could not be extracted; nothing was processed
    #[error("Text extraction failed: {0}")]
    Extraction(String),

    /// A chapter yielded no sentences after splitting
    #[error("Chapter {chapter} yielded no sentences")]
    NoSentences {
        /// 1-based chapter number
        chapter: usize,
    },

    /// A chapter could not be completed; completed chapters are checkpointed
    #[error("Processing of chapter {chapter} failed: {message}")]
    ChapterProcessing {
        /// 1-based chapter number
        chapter: usize,
        /// Underlying failure
        message: String,
    },

    /// No configured backend could be initialized
    #[error("No audio backend available: {0}")]
    BackendUnavailable(String),

    /// Processing stopped at a chapter boundary on request
    #[error("Processing cancelled before chapter {next_chapter}")]
    Cancelled {
        /// First chapter that was not started
        next_chapter: usize,
    },

    /// Invalid configuration (e.g. a chapter pattern that does not compile)
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Writing an output artifact failed
    #[error("Failed to write {artifact}: {message}")]
    Output {
        /// Artifact name
        artifact: String,
        /// Underlying failure
        message: String,
    },

    /// Checkpoint failure
    #[error("State error: {0}")]
    State(#[from] StateError),
}

impl PipelineError {
    /// Whether the run left a resumable checkpoint behind
    pub fn is_resumable(&self) -> bool {
        matches!(
            self,
            PipelineError::ChapterProcessing { .. }
                | PipelineError::Cancelled { .. }
                | PipelineError::BackendUnavailable(_)
        )
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from an audio backend
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Error from the pipeline
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Error from the checkpoint store
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
