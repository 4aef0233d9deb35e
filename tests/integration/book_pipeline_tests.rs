/*!
 * End-to-end tests: source file to audio and JSON artifacts
 */

use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;

use readalong::errors::PipelineError;
use readalong::pipeline::{BookProcessor, MetadataOverrides};
use readalong::state::{ARCHIVED_STATE_FILE_NAME, STATE_FILE_NAME};
use readalong::synthesis::mock::MockBackend;
use readalong::synthesis::wav::decode_wav;
use readalong::timing::BookTimingMap;
use crate::common::{self, CountingObserver, SENTENCES_PER_CHAPTER};

/// Test a full run over a three-chapter book
#[tokio::test]
async fn test_process_book_shouldWriteAllArtifacts() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let source = common::create_test_file(dir.path(), "the_sample_book.txt", &common::sample_book(3))?;
    let output_dir = dir.path().join("out");

    let backend = MockBackend::working();
    let observer = CountingObserver::new();
    let processor = BookProcessor::with_backend(common::test_config(), Arc::new(backend.clone()))?
        .with_observer(observer.clone());

    let output = processor
        .process_book(&source, &output_dir, &MetadataOverrides::default())
        .await?;

    assert_eq!(output.synthesized, vec![1, 2, 3]);
    assert!(output.restored.is_empty());
    assert_eq!(output.silent_sentences, 0);
    assert_eq!(backend.call_count(), 3 * SENTENCES_PER_CHAPTER);
    assert_eq!(backend.release_count(), backend.call_count());
    assert_eq!(observer.completed(), 3);
    assert_eq!(observer.sentences(), 3 * SENTENCES_PER_CHAPTER);

    for n in 1..=3 {
        let audio = output_dir.join(format!("audio/ch{:02}.wav", n));
        let decoded = decode_wav(&std::fs::read(&audio)?)?;
        let chapter = &output.timing.chapters[n - 1];
        assert!(decoded.duration_secs() >= chapter.duration);
    }

    assert!(!output_dir.join(STATE_FILE_NAME).exists());
    Ok(())
}

/// Test the structure of the three JSON artifacts
#[tokio::test]
async fn test_process_book_artifacts_shouldAgreeOnIdsAndMetadata() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let source = common::create_test_file(dir.path(), "the_sample_book.txt", &common::sample_book(2))?;
    let output_dir = dir.path().join("out");

    let processor = BookProcessor::with_backend(common::test_config(), Arc::new(MockBackend::working()))?;
    processor
        .process_book(&source, &output_dir, &MetadataOverrides::default())
        .await?;

    let manifest = common::read_json(&output_dir.join("manifest.json"))?;
    assert_eq!(manifest["bookId"], "the-sample-book");
    assert_eq!(manifest["title"], "The Sample Book");
    assert_eq!(manifest["author"], "Test Author");
    assert!(manifest["cover"].is_null());
    assert_eq!(manifest["timing"], "timing.json");
    assert_eq!(manifest["text"], "text.json");
    assert_eq!(manifest["chapterCount"], 2);
    assert_eq!(manifest["chapters"][1]["id"], "ch02");
    assert_eq!(manifest["chapters"][1]["sentenceCount"], SENTENCES_PER_CHAPTER);
    assert_eq!(manifest["generated"]["voice"], "default");
    assert_eq!(manifest["generated"]["speed"], 1.0);

    let timing: BookTimingMap =
        serde_json::from_str(&std::fs::read_to_string(output_dir.join("timing.json"))?)?;
    let timing_ids: Vec<String> = timing
        .chapters
        .iter()
        .flat_map(|c| c.entries.iter().map(|e| e.id.clone()))
        .collect();

    let text = common::read_json(&output_dir.join("text.json"))?;
    let mut text_ids = Vec::new();
    for chapter in text["chapters"].as_array().unwrap() {
        for paragraph in chapter["paragraphs"].as_array().unwrap() {
            for sentence in paragraph["sentences"].as_array().unwrap() {
                text_ids.push(sentence["id"].as_str().unwrap().to_string());
            }
        }
    }

    assert_eq!(timing_ids, text_ids);
    assert_eq!(timing_ids.iter().collect::<HashSet<_>>().len(), timing_ids.len());
    assert_eq!(timing_ids[0], "ch01_s0000");
    assert_eq!(text["chapters"][0]["paragraphs"][1]["id"], "ch01_p001");
    assert_eq!(
        text["chapters"][0]["paragraphs"][1]["sentences"][1]["text"],
        "Dr. Watson arrived at 3.30 pm sharp."
    );

    let sum: f64 = timing.chapters.iter().map(|c| c.duration).sum();
    assert!((timing.total_duration - sum).abs() < 1e-6);
    Ok(())
}

/// Test operator overrides and cover detection
#[tokio::test]
async fn test_process_book_withOverridesAndCover_shouldUseThem() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let source = common::create_test_file(dir.path(), "book.txt", &common::sample_book(1))?;
    let output_dir = dir.path().join("out");
    std::fs::create_dir_all(&output_dir)?;
    common::create_test_file(&output_dir, "cover.jpg", "jpeg")?;

    let overrides = MetadataOverrides {
        title: Some("A Study in Tests".to_string()),
        author: Some("A. Writer".to_string()),
    };
    let processor = BookProcessor::with_backend(common::test_config(), Arc::new(MockBackend::working()))?;
    let output = processor.process_book(&source, &output_dir, &overrides).await?;

    assert_eq!(output.timing.book_id, "a-study-in-tests");
    let manifest = common::read_json(&output.artifacts.manifest)?;
    assert_eq!(manifest["author"], "A. Writer");
    assert_eq!(manifest["cover"], "cover.jpg");
    Ok(())
}

/// Test that retries exhausted on every sentence still produce a complete book
#[tokio::test]
async fn test_process_book_withFailingBackend_shouldFillWithSilence() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let source = common::create_test_file(dir.path(), "book.txt", &common::sample_book(2))?;
    let output_dir = dir.path().join("out");

    let config = common::test_config();
    let silence = config.synthesis.silence_secs;
    let backend = MockBackend::failing();
    let processor = BookProcessor::with_backend(config, Arc::new(backend.clone()))?;
    let output = processor
        .process_book(&source, &output_dir, &MetadataOverrides::default())
        .await?;

    assert_eq!(output.silent_sentences, 2 * SENTENCES_PER_CHAPTER);
    assert_eq!(backend.call_count(), 2 * 2 * SENTENCES_PER_CHAPTER);
    for entry in &output.timing.chapters[0].entries {
        assert!((entry.end - entry.start - silence).abs() < 1e-3);
    }
    Ok(())
}

/// Test keeping the completed checkpoint under its archived name
#[tokio::test]
async fn test_process_book_withKeepCompletedState_shouldArchiveCheckpoint() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let source = common::create_test_file(dir.path(), "book.txt", &common::sample_book(2))?;
    let output_dir = dir.path().join("out");

    let mut config = common::test_config();
    config.resume.keep_completed_state = true;
    let processor = BookProcessor::with_backend(config, Arc::new(MockBackend::working()))?;
    processor
        .process_book(&source, &output_dir, &MetadataOverrides::default())
        .await?;

    assert!(!output_dir.join(STATE_FILE_NAME).exists());
    let archived = common::read_json(&output_dir.join(ARCHIVED_STATE_FILE_NAME))?;
    assert_eq!(archived["completed_chapters"].as_array().unwrap().len(), 2);
    Ok(())
}

/// Test that a text without headings becomes one chapter
#[tokio::test]
async fn test_process_book_withoutHeadings_shouldUseFullTextChapter() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let source = common::create_test_file(
        dir.path(),
        "essay.txt",
        "An essay with no chapters. It has two sentences.\n\nAnd a second paragraph.",
    )?;
    let output_dir = dir.path().join("out");

    let processor = BookProcessor::with_backend(common::test_config(), Arc::new(MockBackend::working()))?;
    let output = processor
        .process_book(&source, &output_dir, &MetadataOverrides::default())
        .await?;

    assert_eq!(output.timing.chapter_count, 1);
    assert_eq!(output.timing.chapters[0].title, "Full Text");
    assert_eq!(output.timing.chapters[0].entries.len(), 3);
    assert_eq!(output.timing.author, "Unknown Author");
    Ok(())
}

/// Test rejection of sources that are not text
#[tokio::test]
async fn test_process_book_withUnsupportedSource_shouldFailBeforeProcessing() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let source = common::create_test_file(dir.path(), "book.epub", "not really an epub")?;
    let output_dir = dir.path().join("out");

    let backend = MockBackend::working();
    let processor = BookProcessor::with_backend(common::test_config(), Arc::new(backend.clone()))?;
    let result = processor
        .process_book(&source, &output_dir, &MetadataOverrides::default())
        .await;

    assert!(result.is_err());
    assert_eq!(backend.call_count(), 0);
    assert!(!output_dir.join(STATE_FILE_NAME).exists());
    Ok(())
}

/// Test leaving chapters out at the operator's request
#[tokio::test]
async fn test_process_book_withSkipChapters_shouldCompleteWithoutThem() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let source = common::create_test_file(dir.path(), "book.txt", &common::sample_book(3))?;
    let output_dir = dir.path().join("out");

    let backend = MockBackend::working();
    let observer = CountingObserver::new();
    let processor = BookProcessor::with_backend(common::test_config(), Arc::new(backend.clone()))?
        .with_observer(observer.clone())
        .with_skip_chapters([2]);
    let output = processor
        .process_book(&source, &output_dir, &MetadataOverrides::default())
        .await?;

    assert_eq!(output.synthesized, vec![1, 3]);
    assert_eq!(output.skipped, vec![2]);
    assert_eq!(backend.call_count(), 2 * SENTENCES_PER_CHAPTER);
    assert_eq!(observer.skipped(), 1);

    let ids: Vec<&str> = output.timing.chapters.iter().map(|c| c.chapter_id.as_str()).collect();
    assert_eq!(ids, vec!["ch01", "ch03"]);
    assert!(!output_dir.join("audio/ch02.wav").exists());
    assert!(!output_dir.join(STATE_FILE_NAME).exists());

    // a later run without the option picks the chapter up again
    let again = BookProcessor::with_backend(common::test_config(), Arc::new(MockBackend::working()))?
        .process_book(&source, &output_dir, &MetadataOverrides::default())
        .await?;
    assert_eq!(again.synthesized, vec![1, 2, 3]);
    Ok(())
}

/// Test that a processor refuses settings that would break timing
#[test]
fn test_processor_withNegativePause_shouldRejectConfig() {
    let mut config = common::test_config();
    config.pacing.sentence_pause = -0.5;

    let result = BookProcessor::with_backend(config, Arc::new(MockBackend::working()));
    assert!(matches!(result, Err(PipelineError::Config(_))));
}
