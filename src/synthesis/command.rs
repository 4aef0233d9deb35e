use async_trait::async_trait;
use log::debug;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::app_config::BackendConfig;
use crate::errors::BackendError;
use crate::synthesis::wav::decode_wav;
use crate::synthesis::{AudioBackend, SynthesizedAudio};

/// Words per minute at speed 1.0 for engines that take a rate
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

/// Runs a local speech engine once per call and reads a WAV file from its stdout
#[derive(Debug, Clone)]
pub struct CommandBackend {
    program: String,
    args: Vec<String>,
    voice: String,
    speed: f32,
    timeout_secs: u64,
}

impl CommandBackend {
    pub fn new(program: impl Into<String>, args: Vec<String>, voice: impl Into<String>, speed: f32, timeout_secs: u64) -> Self {
        Self {
            program: program.into(),
            args,
            voice: voice.into(),
            speed,
            timeout_secs,
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(
            &config.program,
            config.args.clone(),
            &config.voice,
            config.speed,
            config.timeout_secs,
        )
    }

    /// Arguments with placeholders filled in; text is appended when no `{text}` placeholder exists
    pub fn render_args(&self, text: &str) -> Vec<String> {
        let rate = ((self.speed * BASE_WORDS_PER_MINUTE).round() as u32).to_string();
        let speed = self.speed.to_string();
        let mut has_text = false;

        let mut rendered: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg.contains("{text}") {
                    has_text = true;
                }
                arg.replace("{voice}", &self.voice)
                    .replace("{speed}", &speed)
                    .replace("{rate}", &rate)
                    .replace("{text}", text)
            })
            .collect();

        if !has_text {
            rendered.push(text.to_string());
        }
        rendered
    }
}

#[async_trait]
impl AudioBackend for CommandBackend {
    fn name(&self) -> &str {
        &self.program
    }

    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, BackendError> {
        let args = self.render_args(text);
        debug!("Running {} with {} argument(s)", self.program, args.len());

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(Duration::from_secs(self.timeout_secs), child)
            .await
            .map_err(|_| BackendError::Timeout(self.timeout_secs))?
            .map_err(|e| BackendError::Unavailable(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::SynthesisFailed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let audio = decode_wav(&output.stdout)?;
        if audio.is_empty() {
            return Err(BackendError::SynthesisFailed(format!(
                "{} produced no audio",
                self.program
            )));
        }
        Ok(audio)
    }

    async fn probe(&self) -> Result<(), BackendError> {
        let found = Command::new("which")
            .arg(&self.program)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false);

        if found {
            Ok(())
        } else {
            Err(BackendError::Unavailable(format!(
                "{} is not installed",
                self.program
            )))
        }
    }
}
