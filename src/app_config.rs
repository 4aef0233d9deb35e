use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Chapter detection settings
    #[serde(default)]
    pub chapters: ChapterConfig,

    /// Pause durations inserted between sentences and paragraphs
    #[serde(default)]
    pub pacing: PacingConfig,

    /// Checkpoint / resume behavior
    #[serde(default)]
    pub resume: ResumeConfig,

    /// Text cleaning applied before chapter detection
    #[serde(default)]
    pub cleaning: CleaningConfig,

    /// Audio backend selection and call policy
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Chapter detection configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChapterConfig {
    /// Heading patterns in precedence order (first pattern wins on equal offsets)
    #[serde(default = "default_chapter_patterns")]
    pub patterns: Vec<String>,

    /// Minimum characters a chapter span must cover to count
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    /// Compile patterns case-insensitively
    #[serde(default = "default_true")]
    pub case_insensitive: bool,

    /// Drop every chapter from the first heading whose number goes backwards
    #[serde(default)]
    pub stop_on_backwards_numbering: bool,
}

impl Default for ChapterConfig {
    fn default() -> Self {
        Self {
            patterns: default_chapter_patterns(),
            min_length: default_min_length(),
            case_insensitive: true,
            stop_on_backwards_numbering: false,
        }
    }
}

/// Pause configuration, in seconds
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct PacingConfig {
    /// Silence after every sentence
    #[serde(default = "default_sentence_pause")]
    pub sentence_pause: f64,

    /// Extra silence before the first sentence of a new paragraph
    #[serde(default = "default_paragraph_pause")]
    pub paragraph_pause: f64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            sentence_pause: default_sentence_pause(),
            paragraph_pause: default_paragraph_pause(),
        }
    }
}

/// Resume configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ResumeConfig {
    /// Load and write `processing_state.json`
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Archive the checkpoint instead of deleting it once the book is complete
    #[serde(default)]
    pub keep_completed_state: bool,
}

impl Default for ResumeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            keep_completed_state: false,
        }
    }
}

/// Text cleaning configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CleaningConfig {
    /// Run the cleaner before chapter detection
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Audio backend type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    // @backend: TTS server speaking JSON in, WAV out
    #[default]
    Http,
    // @backend: Local engine spawned per sentence, WAV on stdout
    Command,
}

impl BackendKind {
    // @returns: Capitalized backend name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Http => "HTTP",
            Self::Command => "Command",
        }
    }

    // @returns: Lowercase backend identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Http => "http".to_string(),
            Self::Command => "command".to_string(),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "command" => Ok(Self::Command),
            _ => Err(anyhow!("Invalid backend type: {}", s)),
        }
    }
}

/// Backend configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BackendConfig {
    // @field: Backend type identifier
    #[serde(rename = "type")]
    pub kind: BackendKind,

    // @field: Service URL (http)
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Voice name passed to the engine
    #[serde(default = "default_voice")]
    pub voice: String,

    // @field: Speech speed multiplier
    #[serde(default = "default_speed")]
    pub speed: f32,

    // @field: Timeout seconds per call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Executable (command)
    #[serde(default = "String::new")]
    pub program: String,

    // @field: Arguments; `{text}`, `{voice}`, `{speed}` and `{rate}` (words per minute) are substituted
    #[serde(default)]
    pub args: Vec<String>,
}

impl BackendConfig {
    // @param kind: Backend enum
    // @returns: Backend config with defaults
    pub fn new(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Http => Self {
                kind,
                endpoint: default_http_endpoint(),
                voice: default_voice(),
                speed: default_speed(),
                timeout_secs: default_timeout_secs(),
                program: String::new(),
                args: Vec::new(),
            },
            BackendKind::Command => Self {
                kind,
                endpoint: String::new(),
                voice: "en".to_string(),
                speed: default_speed(),
                timeout_secs: default_timeout_secs(),
                program: default_command_program(),
                args: default_command_args(),
            },
        }
    }
}

/// Synthesis configuration shared by all backends
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SynthesisConfig {
    /// Backends in order of preference; the first available one is used
    #[serde(default = "default_backends")]
    pub backends: Vec<BackendConfig>,

    /// Attempts per sentence before silence is substituted
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base backoff between attempts in milliseconds, doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Silence substituted for a sentence whose retries are exhausted
    #[serde(default = "default_silence_secs")]
    pub silence_secs: f64,

    /// Sample rate of the chapter audio files
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Sentences longer than this are synthesized in chunks (0 disables)
    #[serde(default)]
    pub max_chars_per_chunk: usize,

    /// Stop the chapter instead of inserting silence when the backend goes away
    #[serde(default)]
    pub abort_on_unavailable: bool,

    /// Scale each chapter to `target_db` RMS before writing it
    #[serde(default = "default_true")]
    pub normalize_audio: bool,

    /// Target loudness in dBFS
    #[serde(default = "default_target_db")]
    pub target_db: f64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            backends: default_backends(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            silence_secs: default_silence_secs(),
            sample_rate: default_sample_rate(),
            max_chars_per_chunk: 0,
            abort_on_unavailable: false,
            normalize_audio: true,
            target_db: default_target_db(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_chapter_patterns() -> Vec<String> {
    vec![
        r"^Chapter\s+\d+".to_string(),
        r"^CHAPTER\s+\d+".to_string(),
        r"^Part\s+\d+".to_string(),
    ]
}

fn default_min_length() -> usize {
    500
}

fn default_sentence_pause() -> f64 {
    0.3
}

fn default_paragraph_pause() -> f64 {
    0.8
}

fn default_true() -> bool {
    true
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000 // doubled on each retry
}

fn default_silence_secs() -> f64 {
    0.5
}

fn default_sample_rate() -> u32 {
    24000
}

fn default_target_db() -> f64 {
    -20.0
}

fn default_timeout_secs() -> u64 {
    300 // large local models can take minutes per sentence
}

fn default_voice() -> String {
    "default".to_string()
}

fn default_speed() -> f32 {
    1.0
}

fn default_http_endpoint() -> String {
    "http://localhost:5002".to_string()
}

fn default_command_program() -> String {
    "espeak-ng".to_string()
}

fn default_command_args() -> Vec<String> {
    vec![
        "-v".to_string(),
        "{voice}".to_string(),
        "-s".to_string(),
        "{rate}".to_string(),
        "--stdout".to_string(),
        "{text}".to_string(),
    ]
}

fn default_backends() -> Vec<BackendConfig> {
    vec![
        BackendConfig::new(BackendKind::Http),
        BackendConfig::new(BackendKind::Command),
    ]
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Write configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize config to JSON")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config to file: {}", path.display()))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.chapters.patterns.is_empty() {
            return Err(anyhow!("At least one chapter pattern is required"));
        }
        for pattern in &self.chapters.patterns {
            regex::Regex::new(pattern)
                .map_err(|e| anyhow!("Invalid chapter pattern '{}': {}", pattern, e))?;
        }

        if !(self.pacing.sentence_pause >= 0.0) || !(self.pacing.paragraph_pause >= 0.0) {
            return Err(anyhow!("Pause durations must be non-negative"));
        }

        let synthesis = &self.synthesis;
        if synthesis.retry_count == 0 {
            return Err(anyhow!("retry_count must allow at least one attempt"));
        }
        if !(synthesis.silence_secs > 0.0) {
            return Err(anyhow!("silence_secs must be positive"));
        }
        if synthesis.target_db > 0.0 {
            return Err(anyhow!("target_db must not exceed 0 dBFS"));
        }
        if synthesis.sample_rate == 0 {
            return Err(anyhow!("sample_rate must be positive"));
        }
        if synthesis.backends.is_empty() {
            return Err(anyhow!("At least one audio backend must be configured"));
        }

        for backend in &synthesis.backends {
            match backend.kind {
                BackendKind::Http => {
                    url::Url::parse(&backend.endpoint).map_err(|e| {
                        anyhow!("Invalid endpoint '{}' for http backend: {}", backend.endpoint, e)
                    })?;
                }
                BackendKind::Command => {
                    if backend.program.trim().is_empty() {
                        return Err(anyhow!("Command backend requires a program"));
                    }
                }
            }
        }

        Ok(())
    }

    /// Backends of a given type, in configured order
    pub fn backends_of(&self, kind: BackendKind) -> Vec<&BackendConfig> {
        self.synthesis
            .backends
            .iter()
            .filter(|b| b.kind == kind)
            .collect()
    }

    /// Move the backends of the given type to the front of the preference list
    pub fn prefer_backend(&mut self, kind: BackendKind) {
        let backends = std::mem::take(&mut self.synthesis.backends);
        let (mut preferred, rest): (Vec<_>, Vec<_>) =
            backends.into_iter().partition(|b| b.kind == kind);
        if preferred.is_empty() {
            preferred.push(BackendConfig::new(kind));
        }
        preferred.extend(rest);
        self.synthesis.backends = preferred;
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            chapters: ChapterConfig::default(),
            pacing: PacingConfig::default(),
            resume: ResumeConfig::default(),
            cleaning: CleaningConfig::default(),
            synthesis: SynthesisConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
