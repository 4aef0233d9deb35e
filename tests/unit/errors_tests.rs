/*!
 * Tests for error types
 */

use readalong::errors::{AppError, BackendError, PipelineError, StateError};

/// Test which pipeline failures leave a resumable checkpoint
#[test]
fn test_is_resumable_shouldCoverChapterLevelFailures() {
    let resumable = [
        PipelineError::ChapterProcessing {
            chapter: 3,
            message: "backend went away".to_string(),
        },
        PipelineError::Cancelled { next_chapter: 2 },
        PipelineError::BackendUnavailable("none".to_string()),
    ];
    assert!(resumable.iter().all(PipelineError::is_resumable));

    let fatal = [
        PipelineError::Extraction("empty".to_string()),
        PipelineError::Config("bad pattern".to_string()),
        PipelineError::NoSentences { chapter: 1 },
        PipelineError::State(StateError::Missing("x".to_string())),
    ];
    assert!(!fatal.iter().any(PipelineError::is_resumable));
}

/// Test error messages name the chapter involved
#[test]
fn test_display_shouldIncludeContext() {
    let error = PipelineError::ChapterProcessing {
        chapter: 4,
        message: "timeout".to_string(),
    };
    assert_eq!(error.to_string(), "Processing of chapter 4 failed: timeout");

    let error = PipelineError::Cancelled { next_chapter: 2 };
    assert_eq!(error.to_string(), "Processing cancelled before chapter 2");

    let error = BackendError::ApiError {
        status_code: 503,
        message: "busy".to_string(),
    };
    assert_eq!(error.to_string(), "Backend responded with error: 503 - busy");
}

/// Test conversions into the application error
#[test]
fn test_app_error_conversions_shouldWrapSources() {
    let state: PipelineError = StateError::Corrupted {
        path: "processing_state.json".to_string(),
        reason: "expected value".to_string(),
    }
    .into();
    assert!(matches!(state, PipelineError::State(StateError::Corrupted { .. })));

    let app: AppError = state.into();
    assert!(app.to_string().contains("processing_state.json"));

    let io: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(matches!(io, AppError::File(_)));

    let any: AppError = anyhow::anyhow!("boom").into();
    assert_eq!(any.to_string(), "Unknown error: boom");
}
