/*!
 * Mock audio backend for testing.
 *
 * This module provides a backend that simulates different behaviors:
 * - `MockBackend::working()` - Always succeeds, audio length proportional to text
 * - `MockBackend::scripted()` - Returns fixed durations in call order
 * - `MockBackend::intermittent()` - Fails every Nth call
 * - `MockBackend::failing()` - Always fails with an error
 * - `MockBackend::fail_after()` - Succeeds a number of times, then becomes unavailable
 *
 * Clones share their counters, so a test can keep a handle on a backend it
 * handed to the pipeline.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::BackendError;
use crate::synthesis::{AudioBackend, SynthesizedAudio};

/// Sample rate of the generated clips
pub const MOCK_SAMPLE_RATE: u32 = 24000;

/// Amplitude of the generated clips
const MOCK_LEVEL: f32 = 0.1;

/// Behavior mode for the mock backend
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds; each character lasts `secs_per_char`
    Working { secs_per_char: f64 },
    /// Succeeds with the given durations, cycling when exhausted
    Scripted { durations: Vec<f64> },
    /// Fails every Nth call (1-based)
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Succeeds `successes` times, then reports itself unavailable
    FailAfter { successes: usize },
    /// Succeeds after a delay
    Slow { delay_ms: u64 },
}

/// Mock backend for testing synthesis behavior
#[derive(Debug, Clone)]
pub struct MockBackend {
    behavior: MockBehavior,
    call_count: Arc<AtomicUsize>,
    release_count: Arc<AtomicUsize>,
    texts: Arc<Mutex<Vec<String>>>,
    reachable: Arc<AtomicBool>,
}

impl MockBackend {
    /// Create a new mock backend with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            call_count: Arc::new(AtomicUsize::new(0)),
            release_count: Arc::new(AtomicUsize::new(0)),
            texts: Arc::new(Mutex::new(Vec::new())),
            reachable: Arc::new(AtomicBool::new(true)),
        }
    }

    /// 50 ms per character
    pub fn working() -> Self {
        Self::new(MockBehavior::Working {
            secs_per_char: 0.05,
        })
    }

    pub fn scripted(durations: Vec<f64>) -> Self {
        Self::new(MockBehavior::Scripted { durations })
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn fail_after(successes: usize) -> Self {
        Self::new(MockBehavior::FailAfter { successes })
    }

    /// Make `probe` fail
    pub fn unreachable(self) -> Self {
        self.reachable.store(false, Ordering::SeqCst);
        self
    }

    /// Number of `synthesize` calls so far
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Number of `release` calls so far
    pub fn release_count(&self) -> usize {
        self.release_count.load(Ordering::SeqCst)
    }

    /// Texts passed to `synthesize`, in call order
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().clone()
    }

    fn clip(seconds: f64) -> SynthesizedAudio {
        let count = (seconds.max(0.0) * MOCK_SAMPLE_RATE as f64).round() as usize;
        SynthesizedAudio::new(vec![MOCK_LEVEL; count], MOCK_SAMPLE_RATE)
    }
}

#[async_trait]
impl AudioBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, BackendError> {
        let index = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().push(text.to_string());

        match &self.behavior {
            MockBehavior::Working { secs_per_char } => {
                Ok(Self::clip(text.chars().count() as f64 * secs_per_char))
            }

            MockBehavior::Scripted { durations } => {
                if durations.is_empty() {
                    return Err(BackendError::SynthesisFailed("no scripted durations".to_string()));
                }
                Ok(Self::clip(durations[index % durations.len()]))
            }

            MockBehavior::Intermittent { fail_every } => {
                if *fail_every > 0 && (index + 1) % fail_every == 0 {
                    Err(BackendError::ApiError {
                        status_code: 503,
                        message: format!("Simulated intermittent failure (call #{})", index + 1),
                    })
                } else {
                    Ok(Self::clip(1.0))
                }
            }

            MockBehavior::Failing => Err(BackendError::SynthesisFailed(
                "Simulated backend failure".to_string(),
            )),

            MockBehavior::FailAfter { successes } => {
                if index < *successes {
                    Ok(Self::clip(1.0))
                } else {
                    Err(BackendError::Unavailable("Simulated backend shutdown".to_string()))
                }
            }

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(*delay_ms)).await;
                Ok(Self::clip(1.0))
            }
        }
    }

    async fn release(&self) -> Result<(), BackendError> {
        self.release_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn probe(&self) -> Result<(), BackendError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::Unavailable("mock backend marked unreachable".to_string()))
        }
    }
}
