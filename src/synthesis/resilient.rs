/*!
 * Retry, backoff and silence fallback around a single backend.
 *
 * Every call to the backend is followed by `release`, whether it succeeded
 * or not. When all attempts for a sentence fail, a fixed stretch of silence
 * stands in for it so the chapter keeps its shape and processing continues.
 */

use log::{debug, warn};
use std::time::Duration;

use crate::app_config::SynthesisConfig;
use crate::errors::BackendError;
use crate::synthesis::chunker::{split_into_chunks, CHUNK_PAUSE_SECS};
use crate::synthesis::{AudioBackend, SynthesizedAudio};

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per call, at least one
    pub attempts: u32,
    /// Delay before the second attempt; doubled for each later one
    pub backoff_ms: u64,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff_ms: u64) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff_ms,
        }
    }

    /// Delay after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 1000)
    }
}

/// Audio for one sentence and how it was obtained
#[derive(Debug, Clone)]
pub struct SegmentAudio {
    pub audio: SynthesizedAudio,
    /// Backend calls made, across all chunks
    pub attempts: u32,
    /// Silence was substituted after retries ran out
    pub fallback: bool,
}

/// Drives a backend with retries and silence fallback
#[derive(Debug, Clone)]
pub struct ResilientSynthesizer {
    policy: RetryPolicy,
    silence_secs: f64,
    sample_rate: u32,
    max_chars_per_chunk: usize,
    abort_on_unavailable: bool,
}

impl ResilientSynthesizer {
    pub fn new(policy: RetryPolicy, silence_secs: f64, sample_rate: u32) -> Self {
        Self {
            policy,
            silence_secs,
            sample_rate,
            max_chars_per_chunk: 0,
            abort_on_unavailable: false,
        }
    }

    pub fn from_config(config: &SynthesisConfig) -> Self {
        Self {
            policy: RetryPolicy::new(config.retry_count, config.retry_backoff_ms),
            silence_secs: config.silence_secs,
            sample_rate: config.sample_rate,
            max_chars_per_chunk: config.max_chars_per_chunk,
            abort_on_unavailable: config.abort_on_unavailable,
        }
    }

    /// Split sentences longer than `max_chars` (0 disables)
    pub fn with_chunking(mut self, max_chars: usize) -> Self {
        self.max_chars_per_chunk = max_chars;
        self
    }

    /// Propagate `BackendError::Unavailable` instead of substituting silence
    pub fn with_abort_on_unavailable(mut self, abort: bool) -> Self {
        self.abort_on_unavailable = abort;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Synthesize one sentence.
    ///
    /// Only fails when the backend reports itself unavailable and aborting on
    /// that condition is enabled; every other failure becomes silence.
    pub async fn synthesize(
        &self,
        backend: &dyn AudioBackend,
        text: &str,
    ) -> Result<SegmentAudio, BackendError> {
        let chunks = split_into_chunks(text, self.max_chars_per_chunk);
        if chunks.len() > 1 {
            debug!("Synthesizing {} chunks for a {}-character sentence", chunks.len(), text.chars().count());
        }

        let mut combined: Option<SynthesizedAudio> = None;
        let mut attempts = 0;

        for chunk in &chunks {
            match self.call_with_retry(backend, chunk).await {
                Ok((audio, used)) => {
                    attempts += used;
                    match combined.as_mut() {
                        None => combined = Some(audio),
                        Some(joined) => {
                            let pause = SynthesizedAudio::silence(CHUNK_PAUSE_SECS, joined.sample_rate);
                            joined.append(&pause);
                            joined.append(&audio);
                        }
                    }
                }
                Err((error, used)) => {
                    attempts += used;
                    if self.abort_on_unavailable && matches!(error, BackendError::Unavailable(_)) {
                        return Err(error);
                    }
                    warn!(
                        "Giving up on \"{}\" after {} attempt(s): {}; using {}s of silence",
                        preview(text),
                        used,
                        error,
                        self.silence_secs
                    );
                    return Ok(self.fallback(attempts));
                }
            }
        }

        match combined {
            Some(audio) => Ok(SegmentAudio {
                audio,
                attempts,
                fallback: false,
            }),
            None => Ok(self.fallback(attempts)),
        }
    }

    fn fallback(&self, attempts: u32) -> SegmentAudio {
        SegmentAudio {
            audio: SynthesizedAudio::silence(self.silence_secs, self.sample_rate),
            attempts,
            fallback: true,
        }
    }

    async fn call_with_retry(
        &self,
        backend: &dyn AudioBackend,
        text: &str,
    ) -> Result<(SynthesizedAudio, u32), (BackendError, u32)> {
        let mut last_error = None;

        for attempt in 1..=self.policy.attempts {
            let result = backend.synthesize(text).await;
            if let Err(e) = backend.release().await {
                debug!("{} failed to release resources: {}", backend.name(), e);
            }

            match result {
                Ok(audio) => return Ok((audio, attempt)),
                Err(e) => {
                    warn!(
                        "{} attempt {}/{} failed: {}",
                        backend.name(),
                        attempt,
                        self.policy.attempts,
                        e
                    );
                    last_error = Some(e);
                    if attempt < self.policy.attempts {
                        tokio::time::sleep(self.policy.delay_after(attempt)).await;
                    }
                }
            }
        }

        let error = last_error
            .unwrap_or_else(|| BackendError::SynthesisFailed("no attempt was made".to_string()));
        Err((error, self.policy.attempts))
    }
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 40;
    if text.chars().count() > LIMIT {
        format!("{}...", text.chars().take(LIMIT).collect::<String>())
    } else {
        text.to_string()
    }
}
