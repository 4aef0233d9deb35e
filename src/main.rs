// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};

use readalong::app_config::{self, BackendKind, Config};
use readalong::app_controller::Controller;
use readalong::file_utils::{FileManager, format_duration};
use readalong::pipeline::{BookProcessor, MetadataOverrides};

/// CLI Wrapper for BackendKind to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliBackend {
    Http,
    Command,
}

impl From<CliBackend> for BackendKind {
    fn from(cli_backend: CliBackend) -> Self {
        match cli_backend {
            CliBackend::Http => BackendKind::Http,
            CliBackend::Command => BackendKind::Command,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert a book into chapter audio and a timing map (default command)
    #[command(alias = "convert")]
    Process(ProcessArgs),

    /// Write timing.json, text.json and manifest.json from an unfinished run
    ExportPartial {
        /// Book output directory containing processing_state.json
        #[arg(value_name = "BOOK_DIR")]
        book_dir: PathBuf,
    },

    /// List the chapters that would be detected, without synthesizing
    Chapters(ConfigArgs),

    /// Check which configured audio backends are available
    Probe {
        /// Configuration file path
        #[arg(short, long, default_value = "readalong.json")]
        config_path: String,
    },

    /// Generate shell completions for readalong
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct ConfigArgs {
    /// Input text file
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Configuration file path
    #[arg(short, long, default_value = "readalong.json")]
    config_path: String,

    /// Minimum chapter length in characters
    #[arg(long)]
    min_length: Option<usize>,

    /// Skip text cleaning
    #[arg(long)]
    no_clean: bool,
}

#[derive(Parser, Debug)]
struct ProcessArgs {
    /// Input text file or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Output directory (default: a directory named after the book next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Book title (default: derived from the file name)
    #[arg(short, long)]
    title: Option<String>,

    /// Author name (default: extracted from the text)
    #[arg(short, long)]
    author: Option<String>,

    /// Preferred audio backend
    #[arg(short, long, value_enum)]
    backend: Option<CliBackend>,

    /// Voice passed to the backend
    #[arg(short, long)]
    voice: Option<String>,

    /// Minimum chapter length in characters
    #[arg(long)]
    min_length: Option<usize>,

    /// Chapter numbers to leave out, comma separated
    #[arg(long, value_delimiter = ',', value_name = "N,N,...")]
    skip_chapters: Vec<usize>,

    /// Ignore any saved progress and start over
    #[arg(long)]
    no_resume: bool,

    /// Skip text cleaning
    #[arg(long)]
    no_clean: bool,

    /// Configuration file path
    #[arg(short, long, default_value = "readalong.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// readalong - synchronized audio and text for long-form books
///
/// Detects chapters, splits sentences, synthesizes speech through a
/// configurable backend and writes a timing map for read-along playback.
#[derive(Parser, Debug)]
#[command(name = "readalong")]
#[command(version)]
#[command(about = "Synchronized audio and text book pipeline")]
#[command(long_about = "readalong turns a book's text into chapter audio and a sentence-level timing map.

EXAMPLES:
    readalong book.txt                          # Convert using default config
    readalong -o out/ -a \"H. G. Wells\" book.txt  # Choose output directory and author
    readalong -b command -v en-us book.txt      # Prefer the local speech engine
    readalong --skip-chapters 1,2 book.txt      # Leave out the first two chapters
    readalong --log-level debug /books/         # Process every book in a directory
    readalong chapters book.txt                 # Preview chapter detection
    readalong export-partial out/book/          # Export chapters finished so far
    readalong completions bash > readalong.bash # Generate bash completions

CONFIGURATION:
    Configuration is stored in readalong.json by default. You can specify a
    different file with --config-path. If the file doesn't exist, a default
    one will be created automatically.

RESUMING:
    Progress is saved after every chapter. Running the same command again on
    an unchanged book continues with the first unfinished chapter. Ctrl-C
    stops after the chapter in progress.")]
#[command(args_conflicts_with_subcommands = true)]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input text file or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: Option<PathBuf>,

    /// Output directory (default: a directory named after the book next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Book title (default: derived from the file name)
    #[arg(short, long)]
    title: Option<String>,

    /// Author name (default: extracted from the text)
    #[arg(short, long)]
    author: Option<String>,

    /// Preferred audio backend
    #[arg(short, long, value_enum)]
    backend: Option<CliBackend>,

    /// Voice passed to the backend
    #[arg(short, long)]
    voice: Option<String>,

    /// Minimum chapter length in characters
    #[arg(long)]
    min_length: Option<usize>,

    /// Chapter numbers to leave out, comma separated
    #[arg(long, value_delimiter = ',', value_name = "N,N,...")]
    skip_chapters: Vec<usize>,

    /// Ignore any saved progress and start over
    #[arg(long)]
    no_resume: bool,

    /// Skip text cleaning
    #[arg(long)]
    no_clean: bool,

    /// Configuration file path
    #[arg(short, long, default_value = "readalong.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation; the level lives in `log::max_level`
struct CustomLogger;

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color and tag for a level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "ERROR"),
            Level::Warn => ("\x1B[1;33m", "WARN "),
            Level::Info => ("\x1B[1;32m", "INFO "),
            Level::Debug => ("\x1B[1;36m", "DEBUG"),
            Level::Trace => ("\x1B[1;35m", "TRACE"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (color, tag) = Self::style_for_level(record.level());

            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "{}{} {} {}\x1B[0m", color, now, tag, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Info until the config or the command line says otherwise
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "readalong", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::ExportPartial { book_dir }) => {
            let controller = Controller::with_config(Config::default())?;
            controller.export_partial(&book_dir)?;
            Ok(())
        }
        Some(Commands::Chapters(args)) => run_chapters(args),
        Some(Commands::Probe { config_path }) => run_probe(&config_path).await,
        Some(Commands::Process(args)) => run_process(args).await,
        None => {
            // Default behavior - use top-level args
            let input_path = cli.input_path.ok_or_else(|| {
                anyhow!("INPUT_PATH is required when no subcommand is specified")
            })?;

            let process_args = ProcessArgs {
                input_path,
                output: cli.output,
                title: cli.title,
                author: cli.author,
                backend: cli.backend,
                voice: cli.voice,
                min_length: cli.min_length,
                skip_chapters: cli.skip_chapters,
                no_resume: cli.no_resume,
                no_clean: cli.no_clean,
                config_path: cli.config_path,
                log_level: cli.log_level,
            };
            run_process(process_args).await
        }
    }
}

/// Load the config file, creating it with defaults when missing
fn load_or_create_config(config_path: &str) -> Result<Config> {
    if Path::new(config_path).exists() {
        Config::from_file(config_path)
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);
        let config = Config::default();
        config
            .save(config_path)
            .context(format!("Failed to write default config to file: {}", config_path))?;
        Ok(config)
    }
}

async fn run_process(options: ProcessArgs) -> Result<()> {
    // If log level is set via command line, apply it immediately
    if let Some(cmd_log_level) = &options.log_level {
        let level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let mut config = load_or_create_config(&options.config_path)?;

    // Override config with CLI options if provided
    if let Some(backend) = &options.backend {
        config.prefer_backend(backend.clone().into());
    }
    if let Some(voice) = &options.voice {
        for backend in &mut config.synthesis.backends {
            backend.voice = voice.clone();
        }
    }
    if let Some(min_length) = options.min_length {
        config.chapters.min_length = min_length;
    }
    if options.no_resume {
        config.resume.enabled = false;
    }
    if options.no_clean {
        config.cleaning.enabled = false;
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }

    config.validate().context("Configuration validation failed")?;

    // If log level was not set via command line, update it from config now
    if options.log_level.is_none() {
        log::set_max_level(config.log_level.to_level_filter());
    }

    let controller = Controller::with_config(config)?.with_skip_chapters(options.skip_chapters.iter().copied());
    controller.install_interrupt_handler();

    let overrides = MetadataOverrides {
        title: options.title.clone(),
        author: options.author.clone(),
    };

    if options.input_path.is_file() {
        let output_dir = options
            .output
            .clone()
            .unwrap_or_else(|| Controller::default_output_dir(&options.input_path, &overrides));
        let output = controller
            .run(options.input_path.clone(), output_dir, overrides)
            .await?;
        info!(
            "{}: {} chapter(s), {}",
            output.timing.title,
            output.timing.chapter_count,
            format_duration(output.timing.total_duration)
        );
    } else if options.input_path.is_dir() {
        if options.title.is_some() || options.author.is_some() || !options.skip_chapters.is_empty() {
            warn!("--title, --author and --skip-chapters are ignored in folder mode");
        }
        let summary = controller
            .run_folder(options.input_path.clone(), options.output.clone())
            .await?;
        if summary.failed > 0 {
            return Err(anyhow!("{} book(s) failed", summary.failed));
        }
    } else {
        return Err(anyhow!("Input path does not exist: {:?}", options.input_path));
    }

    Ok(())
}

fn run_chapters(args: ConfigArgs) -> Result<()> {
    let mut config = load_or_create_config(&args.config_path)?;
    if let Some(min_length) = args.min_length {
        config.chapters.min_length = min_length;
    }
    if args.no_clean {
        config.cleaning.enabled = false;
    }
    config.validate().context("Configuration validation failed")?;

    let raw = FileManager::read_to_string(&args.input_path)?;
    let processor = BookProcessor::new(config)?;
    let (text, chapters) = processor.detect_chapters(&raw);

    for chapter in &chapters {
        println!(
            "{:>3}  {:<40} {:>8} chars",
            chapter.number,
            chapter.title,
            chapter.text(&text).chars().count()
        );
    }
    info!("{} chapter(s) detected", chapters.len());
    Ok(())
}

async fn run_probe(config_path: &str) -> Result<()> {
    let config = load_or_create_config(config_path)?;
    let controller = Controller::with_config(config)?;

    let probes = controller.probe_backends().await;
    for probe in &probes {
        if probe.is_available() {
            info!("{}: available", probe.name);
        } else {
            error!("{}: {:?}", probe.name, probe.status);
        }
    }

    if probes.iter().any(|p| p.is_available()) {
        Ok(())
    } else {
        Err(anyhow!("No audio backend is available"))
    }
}
