/*!
 * Book processing pipeline.
 *
 * - `extract`: source text extraction
 * - `metadata`: title, author and book id
 * - `processor`: the chapter loop with checkpoint and resume
 * - `export`: `timing.json`, `text.json`, `manifest.json` and partial export
 * - `observer`: progress events and cancellation
 */

pub mod export;
pub mod extract;
pub mod metadata;
pub mod observer;
pub mod processor;

pub use export::{export_partial, write_artifacts, Generation, Manifest, TextDocument};
pub use extract::{PlainTextExtractor, TextExtractor};
pub use metadata::{BookMetadata, MetadataOverrides};
pub use observer::{CancellationFlag, NoopObserver, ProcessingObserver};
pub use processor::{BookOutput, BookProcessor};
