/*!
 * Output artifacts: `timing.json`, `text.json` and `manifest.json`.
 *
 * All three are derived from the same `BookTimingMap`, so sentence ids and
 * ordering agree between them. Partial export builds that map from the
 * completed chapters of a checkpoint instead of a finished run.
 */

use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::app_config::SynthesisConfig;
use crate::errors::{PipelineError, StateError};
use crate::file_utils::FileManager;
use crate::state::StateStore;
use crate::text::chapter_id;
use crate::timing::{BookTimingBuilder, BookTimingMap, ChapterTiming, TIMING_VERSION};

pub const TIMING_FILE: &str = "timing.json";
pub const TEXT_FILE: &str = "text.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const COVER_FILE: &str = "cover.jpg";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestChapter {
    pub id: String,
    pub title: String,
    pub duration: f64,
    pub sentence_count: usize,
}

/// Voice settings the audio was produced with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub voice: String,
    pub speed: f32,
}

impl Generation {
    /// Settings of the preferred backend
    pub fn from_config(config: &SynthesisConfig) -> Option<Self> {
        config.backends.first().map(|backend| Self {
            voice: backend.voice.clone(),
            speed: backend.speed,
        })
    }
}

/// Library entry for a processed book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: String,
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub cover: Option<String>,
    pub timing: String,
    pub text: String,
    pub total_duration: f64,
    pub chapter_count: usize,
    pub chapters: Vec<ManifestChapter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<Generation>,
}

impl Manifest {
    pub fn from_timing(map: &BookTimingMap, cover: Option<String>) -> Self {
        Self {
            version: TIMING_VERSION.to_string(),
            book_id: map.book_id.clone(),
            title: map.title.clone(),
            author: map.author.clone(),
            cover,
            timing: TIMING_FILE.to_string(),
            text: TEXT_FILE.to_string(),
            total_duration: map.total_duration,
            chapter_count: map.chapter_count,
            chapters: map
                .chapters
                .iter()
                .map(|c| ManifestChapter {
                    id: c.chapter_id.clone(),
                    title: c.title.clone(),
                    duration: c.duration,
                    sentence_count: c.sentence_count(),
                })
                .collect(),
            generated: None,
        }
    }

    pub fn with_generation(mut self, generated: Option<Generation>) -> Self {
        self.generated = generated;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSentence {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextParagraph {
    pub id: String,
    pub sentences: Vec<TextSentence>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChapter {
    pub id: String,
    pub title: String,
    pub paragraphs: Vec<TextParagraph>,
}

/// Display text grouped by chapter and paragraph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDocument {
    pub title: String,
    pub author: String,
    pub chapters: Vec<TextChapter>,
}

impl TextDocument {
    pub fn from_timing(map: &BookTimingMap) -> Self {
        Self {
            title: map.title.clone(),
            author: map.author.clone(),
            chapters: map.chapters.iter().map(text_chapter).collect(),
        }
    }
}

fn paragraph_id(chapter_id: &str, paragraph: usize) -> String {
    format!("{}_p{:03}", chapter_id, paragraph)
}

fn text_chapter(chapter: &ChapterTiming) -> TextChapter {
    let mut paragraphs: Vec<TextParagraph> = Vec::new();
    let mut current: Option<usize> = None;

    for entry in &chapter.entries {
        let sentence = TextSentence {
            id: entry.id.clone(),
            text: entry.text.clone(),
        };
        match paragraphs.last_mut() {
            Some(last) if current == Some(entry.paragraph) => last.sentences.push(sentence),
            _ => {
                paragraphs.push(TextParagraph {
                    id: paragraph_id(&chapter.chapter_id, entry.paragraph),
                    sentences: vec![sentence],
                });
                current = Some(entry.paragraph);
            }
        }
    }

    TextChapter {
        id: chapter.chapter_id.clone(),
        title: chapter.title.clone(),
        paragraphs,
    }
}

/// Paths of the written artifacts
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub timing: PathBuf,
    pub text: PathBuf,
    pub manifest: PathBuf,
}

fn write_json<T: Serialize>(path: &Path, artifact: &str, value: &T) -> Result<(), PipelineError> {
    FileManager::write_json_atomic(path, value).map_err(|e| PipelineError::Output {
        artifact: artifact.to_string(),
        message: e.to_string(),
    })
}

/// Write all three artifacts into `output_dir`
pub fn write_artifacts(
    output_dir: &Path,
    map: &BookTimingMap,
    generated: Option<Generation>,
) -> Result<ArtifactPaths, PipelineError> {
    let cover = output_dir
        .join(COVER_FILE)
        .is_file()
        .then(|| COVER_FILE.to_string());

    let paths = ArtifactPaths {
        timing: output_dir.join(TIMING_FILE),
        text: output_dir.join(TEXT_FILE),
        manifest: output_dir.join(MANIFEST_FILE),
    };

    write_json(&paths.timing, TIMING_FILE, map)?;
    write_json(&paths.text, TEXT_FILE, &TextDocument::from_timing(map))?;
    write_json(&paths.manifest, MANIFEST_FILE, &Manifest::from_timing(map, cover).with_generation(generated))?;

    Ok(paths)
}

/// Export the chapters completed so far by an interrupted run
pub fn export_partial(book_dir: &Path) -> Result<BookTimingMap, PipelineError> {
    let store = StateStore::in_dir(book_dir);
    let state = store
        .load()?
        .ok_or_else(|| StateError::Missing(store.path().display().to_string()))?;

    let mut book = BookTimingBuilder::new(&state.book_id, &state.title, &state.author);
    for number in &state.completed_chapters {
        if let Some(record) = state.chapter_data.get(number) {
            book.add_chapter(record.to_timing(chapter_id(*number)));
        }
    }
    let map = book.build();

    // voice settings are not part of the checkpoint
    write_artifacts(book_dir, &map, None)?;
    info!(
        "Exported {} of {} chapters from {}",
        map.chapter_count,
        state.total_chapters,
        store.path().display()
    );
    Ok(map)
}
