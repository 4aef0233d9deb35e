/*!
 * Tests for timing map construction from split sentences
 */

use readalong::app_config::PacingConfig;
use readalong::text::SentenceSplitter;
use readalong::timing::{BookTimingBuilder, ChapterTimingBuilder};

/// Test the documented three-sentence example with default pauses
#[test]
fn test_timing_withDefaultPacing_shouldMatchExpectedOffsets() {
    let sentences = SentenceSplitter::new("ch01").split("One here. Two here. Three here.");
    let mut builder = ChapterTimingBuilder::new(PacingConfig::default());
    for (sentence, duration) in sentences.iter().zip([2.5, 2.2, 1.7]) {
        builder.push(sentence, duration);
    }
    let chapter = builder.finish("ch01", "Chapter 1", "audio/ch01.wav");

    let spans: Vec<(f64, f64)> = chapter.entries.iter().map(|e| (e.start, e.end)).collect();
    assert_eq!(spans, vec![(0.0, 2.5), (2.8, 5.0), (5.3, 7.0)]);
    assert_eq!(chapter.duration, 7.0);
}

/// Test that paragraph changes add the paragraph pause on top of the sentence pause
#[test]
fn test_timing_withParagraphBreak_shouldDelayFirstSentenceOfParagraph() {
    let sentences = SentenceSplitter::new("ch02").split("First.\n\nSecond. Third.");
    let mut builder = ChapterTimingBuilder::new(PacingConfig::default());
    for sentence in &sentences {
        builder.push(sentence, 1.0);
    }
    let chapter = builder.finish("ch02", "Chapter 2", "audio/ch02.wav");

    let starts: Vec<f64> = chapter.entries.iter().map(|e| e.start).collect();
    assert_eq!(starts, vec![0.0, 2.1, 3.4]);
    assert_eq!(chapter.entries[1].paragraph, 1);
    assert_eq!(chapter.duration, 4.4);
}

/// Test custom pacing values
#[test]
fn test_timing_withZeroPauses_shouldPackSentences() {
    let pacing = PacingConfig {
        sentence_pause: 0.0,
        paragraph_pause: 0.0,
    };
    let sentences = SentenceSplitter::new("ch01").split("A one.\n\nB two.");
    let mut builder = ChapterTimingBuilder::new(pacing);
    for sentence in &sentences {
        builder.push(sentence, 0.75);
    }
    let chapter = builder.finish("ch01", "t", "a");

    assert_eq!(chapter.entries[1].start, chapter.entries[0].end);
    assert_eq!(chapter.duration, 1.5);
}

/// Test that entries never overlap and stay inside the chapter duration
#[test]
fn test_timing_entriesShouldBeMonotonic() {
    let text = (0..30)
        .map(|i| {
            if i % 5 == 4 {
                format!("Sentence number {i}.\n\n")
            } else {
                format!("Sentence number {i}. ")
            }
        })
        .collect::<String>();
    let sentences = SentenceSplitter::new("ch01").split(&text);
    assert_eq!(sentences.len(), 30);

    let mut builder = ChapterTimingBuilder::new(PacingConfig::default());
    for (i, sentence) in sentences.iter().enumerate() {
        builder.push(sentence, 0.2 + (i % 3) as f64 * 0.45);
    }
    let chapter = builder.finish("ch01", "t", "a");

    for pair in chapter.entries.windows(2) {
        assert!(pair[0].start <= pair[0].end);
        assert!(pair[0].end <= pair[1].start);
    }
    assert!(chapter.duration >= chapter.entries[29].end);
    assert!(chapter.is_consistent());
}

/// Test the book-level totals
#[test]
fn test_book_map_shouldCarryMetadataAndTotals() {
    let mut book = BookTimingBuilder::new("my-book", "My Book", "Someone");
    for n in 1..=3 {
        let sentences = SentenceSplitter::new(format!("ch{:02}", n)).split("Only one.");
        let mut builder = ChapterTimingBuilder::new(PacingConfig::default());
        builder.push(&sentences[0], 1.5);
        book.add_chapter(builder.finish(format!("ch{:02}", n), format!("Chapter {n}"), format!("audio/ch{:02}.wav", n)));
    }
    let map = book.build();

    assert_eq!(map.book_id, "my-book");
    assert_eq!(map.author, "Someone");
    assert_eq!(map.chapter_count, 3);
    assert_eq!(map.total_duration, 4.5);
    assert_eq!(map.chapters[2].entries[0].id, "ch03_s0000");
}
