use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::app_config::BackendConfig;
use crate::errors::BackendError;
use crate::synthesis::wav::decode_wav;
use crate::synthesis::{AudioBackend, SynthesizedAudio};

/// Client for a TTS server that answers `POST /api/tts` with a WAV body
#[derive(Debug)]
pub struct HttpBackend {
    /// Base URL of the server
    endpoint: String,
    /// Voice name sent with every request
    voice: String,
    /// Speed multiplier sent with every request
    speed: f32,
    /// Per-call timeout in seconds
    timeout_secs: u64,
    /// HTTP client for making requests
    client: Client,
}

/// Request body for the synthesis endpoint
#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    voice: &'a str,
    speed: f32,
}

impl HttpBackend {
    /// Create a new client for the given endpoint
    pub fn new(endpoint: impl Into<String>, voice: impl Into<String>, speed: f32, timeout_secs: u64) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self {
            endpoint,
            voice: voice.into(),
            speed,
            timeout_secs,
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .pool_idle_timeout(Duration::from_secs(90))
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(&config.endpoint, &config.voice, config.speed, config.timeout_secs)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    fn map_request_error(&self, error: reqwest::Error) -> BackendError {
        if error.is_timeout() {
            BackendError::Timeout(self.timeout_secs)
        } else if error.is_connect() {
            BackendError::Unavailable(format!("{} is not reachable: {}", self.endpoint, error))
        } else {
            BackendError::RequestFailed(error.to_string())
        }
    }
}

#[async_trait]
impl AudioBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, BackendError> {
        let request = SynthesisRequest {
            text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post(self.url("/api/tts"))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BackendError::ApiError {
                status_code: status.as_u16(),
                message,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_request_error(e))?;
        debug!("Received {} bytes of audio from {}", bytes.len(), self.endpoint);

        let audio = decode_wav(&bytes)?;
        if audio.is_empty() {
            return Err(BackendError::SynthesisFailed(
                "server returned an empty clip".to_string(),
            ));
        }
        Ok(audio)
    }

    async fn probe(&self) -> Result<(), BackendError> {
        let response = self
            .client
            .get(self.url("/health"))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(format!("{}: {}", self.endpoint, e)))?;

        if response.status().is_server_error() {
            return Err(BackendError::Unavailable(format!(
                "{} answered {}",
                self.endpoint,
                response.status()
            )));
        }
        Ok(())
    }
}
