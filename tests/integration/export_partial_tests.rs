/*!
 * Tests for exporting an interrupted book
 */

use anyhow::Result;
use std::sync::Arc;

use readalong::errors::{PipelineError, StateError};
use readalong::pipeline::{export_partial, BookProcessor, CancellationFlag, MetadataOverrides};
use readalong::state::STATE_FILE_NAME;
use readalong::synthesis::mock::MockBackend;
use crate::common::{self, CancelAfterChapter, SENTENCES_PER_CHAPTER};

/// Test exporting the chapters completed before cancellation
#[tokio::test]
async fn test_export_partial_afterCancellation_shouldWriteCompletedChapters() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let source = common::create_test_file(dir.path(), "partial_book.txt", &common::sample_book(3))?;
    let output_dir = dir.path().join("out");

    let flag = CancellationFlag::new();
    let observer = Arc::new(CancelAfterChapter {
        flag: flag.clone(),
        chapter: 2,
    });
    let result = BookProcessor::with_backend(common::test_config(), Arc::new(MockBackend::working()))?
        .with_cancellation(flag)
        .with_observer(observer)
        .process_book(&source, &output_dir, &MetadataOverrides::default())
        .await;
    assert!(matches!(result, Err(PipelineError::Cancelled { next_chapter: 3 })));

    let map = export_partial(&output_dir)?;
    assert_eq!(map.chapter_count, 2);
    assert_eq!(map.book_id, "partial-book");
    assert_eq!(map.author, "Test Author");
    assert_eq!(map.chapters[1].chapter_id, "ch02");
    assert_eq!(map.chapters[1].entries.len(), SENTENCES_PER_CHAPTER);

    let manifest = common::read_json(&output_dir.join("manifest.json"))?;
    assert_eq!(manifest["chapterCount"], 2);
    let text = common::read_json(&output_dir.join("text.json"))?;
    assert_eq!(text["chapters"].as_array().unwrap().len(), 2);

    // the checkpoint stays so the run can still be resumed
    assert!(output_dir.join(STATE_FILE_NAME).is_file());
    Ok(())
}

/// Test exporting a directory without a checkpoint
#[test]
fn test_export_partial_withoutCheckpoint_shouldFail() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let result = export_partial(dir.path());

    assert!(matches!(result, Err(PipelineError::State(StateError::Missing(_)))));
    assert!(!dir.path().join("timing.json").exists());
    Ok(())
}
