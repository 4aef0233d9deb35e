/*!
 * Checkpoint and resume tests
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use readalong::app_config::Config;
use readalong::errors::PipelineError;
use readalong::pipeline::{BookOutput, BookProcessor, CancellationFlag, MetadataOverrides};
use readalong::state::{ResumeOutcome, StateStore, ARCHIVED_STATE_FILE_NAME, STATE_FILE_NAME};
use readalong::synthesis::mock::MockBackend;
use readalong::synthesis::{AudioBackend, BackendFactory};
use crate::common::{self, CancelAfterChapter, CountingObserver, SENTENCES_PER_CHAPTER};

struct Fixture {
    _dir: TempDir,
    source: PathBuf,
    output_dir: PathBuf,
}

fn fixture(chapters: usize) -> Result<Fixture> {
    let dir = common::create_temp_dir()?;
    let source = common::create_test_file(dir.path(), "book.txt", &common::sample_book(chapters))?;
    let output_dir = dir.path().join("out");
    Ok(Fixture {
        _dir: dir,
        source,
        output_dir,
    })
}

async fn run(config: Config, backend: &MockBackend, fixture: &Fixture) -> Result<BookOutput, PipelineError> {
    BookProcessor::with_backend(config, Arc::new(backend.clone()))?
        .process_book(&fixture.source, &fixture.output_dir, &MetadataOverrides::default())
        .await
}

/// Run until `chapter` completes, then stop at the boundary
async fn run_cancelled_after(chapter: usize, backend: &MockBackend, fixture: &Fixture) -> Result<PipelineError> {
    let flag = CancellationFlag::new();
    let observer = Arc::new(CancelAfterChapter {
        flag: flag.clone(),
        chapter,
    });
    let result = BookProcessor::with_backend(common::test_config(), Arc::new(backend.clone()))?
        .with_cancellation(flag)
        .with_observer(observer)
        .process_book(&fixture.source, &fixture.output_dir, &MetadataOverrides::default())
        .await;

    match result {
        Err(e) => Ok(e),
        Ok(_) => anyhow::bail!("run was expected to stop after chapter {}", chapter),
    }
}

fn completed_chapters(output_dir: &Path) -> Result<Vec<usize>> {
    let state = StateStore::in_dir(output_dir)
        .load()?
        .ok_or_else(|| anyhow::anyhow!("no checkpoint"))?;
    Ok(state.completed_chapters.into_iter().collect())
}

/// Test that an interrupted and resumed run matches an uninterrupted one
#[tokio::test]
async fn test_resume_afterCancellation_shouldProduceIdenticalTiming() -> Result<()> {
    let uninterrupted = fixture(3)?;
    let reference = run(common::test_config(), &MockBackend::working(), &uninterrupted).await?;

    let interrupted = fixture(3)?;
    let first_backend = MockBackend::working();
    let error = run_cancelled_after(1, &first_backend, &interrupted).await?;
    assert!(matches!(error, PipelineError::Cancelled { next_chapter: 2 }));
    assert_eq!(first_backend.call_count(), SENTENCES_PER_CHAPTER);
    assert_eq!(completed_chapters(&interrupted.output_dir)?, vec![1]);
    assert!(!interrupted.output_dir.join("timing.json").exists());

    let second_backend = MockBackend::working();
    let observer = CountingObserver::new();
    let resumed = BookProcessor::with_backend(common::test_config(), Arc::new(second_backend.clone()))?
        .with_observer(observer.clone())
        .process_book(&interrupted.source, &interrupted.output_dir, &MetadataOverrides::default())
        .await?;

    assert_eq!(resumed.resume, ResumeOutcome::Resumed { completed: 1 });
    assert_eq!(resumed.restored, vec![1]);
    assert_eq!(resumed.synthesized, vec![2, 3]);
    assert_eq!(second_backend.call_count(), 2 * SENTENCES_PER_CHAPTER);
    assert_eq!(observer.restored(), 1);
    assert_eq!(resumed.timing, reference.timing);

    let reference_json = fs::read_to_string(uninterrupted.output_dir.join("timing.json"))?;
    let resumed_json = fs::read_to_string(interrupted.output_dir.join("timing.json"))?;
    assert_eq!(reference_json, resumed_json);
    Ok(())
}

/// Test that a backend failure keeps completed chapters and the run can resume
#[tokio::test]
async fn test_resume_afterBackendLoss_shouldContinueFromFailedChapter() -> Result<()> {
    let fixture = fixture(3)?;
    let mut config = common::test_config();
    config.synthesis.abort_on_unavailable = true;

    let dying = MockBackend::fail_after(SENTENCES_PER_CHAPTER);
    let error = run(config.clone(), &dying, &fixture).await.unwrap_err();
    assert!(matches!(error, PipelineError::ChapterProcessing { chapter: 2, .. }));
    assert!(error.is_resumable());
    assert_eq!(completed_chapters(&fixture.output_dir)?, vec![1]);

    let healthy = MockBackend::working();
    let output = run(config, &healthy, &fixture).await?;
    assert_eq!(output.restored, vec![1]);
    assert_eq!(output.synthesized, vec![2, 3]);
    assert!(!fixture.output_dir.join(STATE_FILE_NAME).exists());
    Ok(())
}

/// Test that a checkpoint that cannot be parsed is discarded
#[tokio::test]
async fn test_resume_withCorruptedCheckpoint_shouldStartOver() -> Result<()> {
    let fixture = fixture(2)?;
    fs::create_dir_all(&fixture.output_dir)?;
    common::create_test_file(&fixture.output_dir, STATE_FILE_NAME, "{ not json")?;

    let backend = MockBackend::working();
    let output = run(common::test_config(), &backend, &fixture).await?;

    assert!(matches!(output.resume, ResumeOutcome::Corrupted { .. }));
    assert_eq!(output.synthesized, vec![1, 2]);
    assert_eq!(backend.call_count(), 2 * SENTENCES_PER_CHAPTER);
    Ok(())
}

/// Test that editing the source invalidates the checkpoint
#[tokio::test]
async fn test_resume_withChangedSource_shouldStartOver() -> Result<()> {
    let fixture = fixture(3)?;
    run_cancelled_after(1, &MockBackend::working(), &fixture).await?;

    let mut edited = common::sample_book(3);
    edited.push_str("An epilogue sentence was added.\n");
    fs::write(&fixture.source, edited)?;

    let backend = MockBackend::working();
    let output = run(common::test_config(), &backend, &fixture).await?;

    assert!(matches!(output.resume, ResumeOutcome::SourceChanged { .. }));
    assert!(output.restored.is_empty());
    assert_eq!(output.synthesized, vec![1, 2, 3]);
    Ok(())
}

/// Test that changed pacing invalidates the checkpoint
#[tokio::test]
async fn test_resume_withChangedPacing_shouldStartOver() -> Result<()> {
    let fixture = fixture(2)?;
    run_cancelled_after(1, &MockBackend::working(), &fixture).await?;

    let mut config = common::test_config();
    config.pacing.sentence_pause = 0.5;
    let output = run(config, &MockBackend::working(), &fixture).await?;

    assert_eq!(output.resume, ResumeOutcome::SettingsChanged);
    assert_eq!(output.synthesized, vec![1, 2]);
    Ok(())
}

/// Test that a deleted chapter audio file is regenerated
#[tokio::test]
async fn test_resume_withMissingAudio_shouldRedoChapter() -> Result<()> {
    let fixture = fixture(2)?;
    run_cancelled_after(1, &MockBackend::working(), &fixture).await?;
    fs::remove_file(fixture.output_dir.join("audio/ch01.wav"))?;

    let backend = MockBackend::working();
    let output = run(common::test_config(), &backend, &fixture).await?;

    assert!(output.resume.is_resumed());
    assert!(output.restored.is_empty());
    assert_eq!(output.synthesized, vec![1, 2]);
    assert!(fixture.output_dir.join("audio/ch01.wav").is_file());
    Ok(())
}

/// Test that disabling resume ignores an existing checkpoint
#[tokio::test]
async fn test_resume_disabled_shouldIgnoreCheckpoint() -> Result<()> {
    let fixture = fixture(2)?;
    run_cancelled_after(1, &MockBackend::working(), &fixture).await?;

    let mut config = common::test_config();
    config.resume.enabled = false;
    let backend = MockBackend::working();
    let output = run(config, &backend, &fixture).await?;

    assert_eq!(output.resume, ResumeOutcome::Fresh);
    assert_eq!(backend.call_count(), 2 * SENTENCES_PER_CHAPTER);
    Ok(())
}

/// Test that a fully checkpointed book never touches a backend
#[tokio::test]
async fn test_resume_withCompleteCheckpoint_shouldNotInitializeBackend() -> Result<()> {
    let fixture = fixture(2)?;
    let mut config = common::test_config();
    config.resume.keep_completed_state = true;
    let first = run(config.clone(), &MockBackend::working(), &fixture).await?;

    fs::rename(
        fixture.output_dir.join(ARCHIVED_STATE_FILE_NAME),
        fixture.output_dir.join(STATE_FILE_NAME),
    )?;

    let unreachable = MockBackend::working().unreachable();
    let candidates: Vec<Arc<dyn AudioBackend>> = vec![Arc::new(unreachable.clone())];
    let processor = BookProcessor::with_backends(config, BackendFactory::new(candidates))?;
    let output = processor
        .process_book(&fixture.source, &fixture.output_dir, &MetadataOverrides::default())
        .await?;

    assert!(!processor.backend_initialized());
    assert_eq!(unreachable.call_count(), 0);
    assert_eq!(output.restored, vec![1, 2]);
    assert_eq!(output.timing, first.timing);
    Ok(())
}

/// Test that an unreachable backend fails the run but keeps it resumable
#[tokio::test]
async fn test_process_withNoReachableBackend_shouldLeaveResumableCheckpoint() -> Result<()> {
    let fixture = fixture(2)?;
    let candidates: Vec<Arc<dyn AudioBackend>> = vec![Arc::new(MockBackend::working().unreachable())];
    let processor = BookProcessor::with_backends(common::test_config(), BackendFactory::new(candidates))?;

    let error = processor
        .process_book(&fixture.source, &fixture.output_dir, &MetadataOverrides::default())
        .await
        .unwrap_err();

    assert!(matches!(error, PipelineError::BackendUnavailable(_)));
    assert!(error.is_resumable());
    assert!(fixture.output_dir.join(STATE_FILE_NAME).is_file());
    assert!(completed_chapters(&fixture.output_dir)?.is_empty());
    Ok(())
}
