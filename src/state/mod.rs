/*!
 * Chapter-granular checkpoint and resume.
 */

pub mod models;
pub mod store;

pub use models::{BookIdentity, ChapterRecord, IdentityCheck, ProcessingState, ResumeOutcome};
pub use store::{
    hash_file, hash_text, settings_fingerprint, StateStore, ARCHIVED_STATE_FILE_NAME,
    STATE_FILE_NAME,
};
