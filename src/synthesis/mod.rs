/*!
 * Audio synthesis backends.
 *
 * A backend turns one piece of text into mono PCM audio. The pipeline never
 * talks to a backend directly; it goes through the `ResilientSynthesizer`,
 * which retries failed calls, substitutes silence once retries run out and
 * releases backend resources after every call.
 *
 * - `http`: a TTS server that accepts JSON and answers with a WAV file
 * - `command`: a local engine process that writes a WAV file to stdout
 * - `mock`: scripted backend for tests
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::BackendError;

pub mod chunker;
pub mod command;
pub mod factory;
pub mod http;
pub mod mock;
pub mod resilient;
pub mod wav;

pub use factory::{BackendFactory, BackendProbe, LazyBackend, ProbeStatus};
pub use resilient::{ResilientSynthesizer, RetryPolicy, SegmentAudio};

/// Mono PCM audio in the range [-1.0, 1.0]
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl SynthesizedAudio {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Silent audio of the given length
    pub fn silence(seconds: f64, sample_rate: u32) -> Self {
        let count = (seconds.max(0.0) * sample_rate as f64).round() as usize;
        Self::new(vec![0.0; count], sample_rate)
    }

    /// Length in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Append another clip, resampling it to this clip's rate if needed
    pub fn append(&mut self, other: &SynthesizedAudio) {
        if other.sample_rate == self.sample_rate {
            self.samples.extend_from_slice(&other.samples);
        } else {
            let resampled = wav::resample(&other.samples, other.sample_rate, self.sample_rate);
            self.samples.extend(resampled);
        }
    }
}

/// Common trait for all audio backends
///
/// Implementations must be safe to share across tasks; the pipeline calls
/// them strictly one sentence at a time.
#[async_trait]
pub trait AudioBackend: Send + Sync + Debug {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Synthesize `text` into audio
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, BackendError>;

    /// Release transient resources (caches, device memory) after a call
    async fn release(&self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Check that the backend can be used
    async fn probe(&self) -> Result<(), BackendError>;
}
