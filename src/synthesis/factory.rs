/*!
 * Backend selection.
 *
 * Backends are tried in the order they are configured. Each candidate is
 * probed and the first one that answers is used for the whole run. The
 * `LazyBackend` defers all of this until the first sentence actually needs
 * audio, so a run that only reassembles checkpointed chapters never touches
 * a backend.
 */

use log::{info, warn};
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::app_config::{BackendConfig, BackendKind, SynthesisConfig};
use crate::errors::PipelineError;
use crate::synthesis::command::CommandBackend;
use crate::synthesis::http::HttpBackend;
use crate::synthesis::AudioBackend;

/// Availability of a candidate backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Available,
    Unavailable(String),
}

/// Probe result for one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendProbe {
    pub name: String,
    pub status: ProbeStatus,
}

impl BackendProbe {
    pub fn is_available(&self) -> bool {
        self.status == ProbeStatus::Available
    }
}

/// Ordered list of candidate backends
#[derive(Debug, Clone, Default)]
pub struct BackendFactory {
    candidates: Vec<Arc<dyn AudioBackend>>,
}

impl BackendFactory {
    /// Candidates in preference order
    pub fn new(candidates: Vec<Arc<dyn AudioBackend>>) -> Self {
        Self { candidates }
    }

    pub fn from_config(config: &SynthesisConfig) -> Self {
        Self::new(config.backends.iter().map(Self::build).collect())
    }

    /// Construct the backend described by one config entry
    pub fn build(config: &BackendConfig) -> Arc<dyn AudioBackend> {
        match config.kind {
            BackendKind::Http => Arc::new(HttpBackend::from_config(config)),
            BackendKind::Command => Arc::new(CommandBackend::from_config(config)),
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Probe every candidate, in order
    pub async fn probe_all(&self) -> Vec<BackendProbe> {
        let mut probes = Vec::with_capacity(self.candidates.len());
        for backend in &self.candidates {
            probes.push(Self::probe_one(backend.as_ref()).await);
        }
        probes
    }

    async fn probe_one(backend: &dyn AudioBackend) -> BackendProbe {
        let status = match backend.probe().await {
            Ok(()) => ProbeStatus::Available,
            Err(e) => ProbeStatus::Unavailable(e.to_string()),
        };
        BackendProbe {
            name: backend.name().to_string(),
            status,
        }
    }

    /// First candidate whose probe succeeds
    pub async fn select(&self) -> Result<Arc<dyn AudioBackend>, PipelineError> {
        let mut reasons = Vec::new();

        for backend in &self.candidates {
            let probe = Self::probe_one(backend.as_ref()).await;
            match probe.status {
                ProbeStatus::Available => {
                    info!("Using audio backend: {}", probe.name);
                    return Ok(Arc::clone(backend));
                }
                ProbeStatus::Unavailable(reason) => {
                    warn!("Audio backend {} unavailable: {}", probe.name, reason);
                    reasons.push(format!("{}: {}", probe.name, reason));
                }
            }
        }

        if reasons.is_empty() {
            return Err(PipelineError::BackendUnavailable(
                "no audio backend configured".to_string(),
            ));
        }
        Err(PipelineError::BackendUnavailable(reasons.join("; ")))
    }
}

/// Backend created on first use and reused afterwards
#[derive(Debug)]
pub struct LazyBackend {
    factory: BackendFactory,
    cell: OnceCell<Arc<dyn AudioBackend>>,
}

impl LazyBackend {
    pub fn new(factory: BackendFactory) -> Self {
        Self {
            factory,
            cell: OnceCell::new(),
        }
    }

    /// Already-selected backend
    pub fn ready(backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            factory: BackendFactory::default(),
            cell: OnceCell::new_with(Some(backend)),
        }
    }

    /// Select the backend on the first call
    pub async fn get(&self) -> Result<&Arc<dyn AudioBackend>, PipelineError> {
        self.cell.get_or_try_init(|| self.factory.select()).await
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}
