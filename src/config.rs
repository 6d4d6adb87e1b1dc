//! Configuration and CLI for makesound

use clap::{ArgGroup, Parser};
use std::path::PathBuf;

use crate::backend::BackendConfig;

/// Default output path in single-clip mode
pub const DEFAULT_OUTPUT: &str = "output.wav";

/// Default clip length in seconds
pub const DEFAULT_DURATION: f32 = 5.0;

/// Default pretrained model identifier
pub const DEFAULT_MODEL: &str = "facebook/audiogen-medium";

/// Sound list read by `prepare-batch`
pub const DEFAULT_SOUND_LIST: &str = "toddler_sounds.json";

/// Batch file written by `prepare-batch`
pub const DEFAULT_BATCH_FILE: &str = "batch.json";

/// Command line arguments for the `makesound` generator
#[derive(Parser, Debug, Clone)]
#[command(name = "makesound")]
#[command(about = "Generate sound effects from text prompts using AudioGen")]
#[command(version)]
#[command(group(
    ArgGroup::new("input")
        .args(["prompt", "batch"])
        .required(true)
        .multiple(true)
))]
pub struct Cli {
    /// Text description of the sound effect to generate
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Output file path
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Duration of generated audio in seconds
    #[arg(short, long, default_value_t = DEFAULT_DURATION)]
    pub duration: f32,

    /// Model to use
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// JSON file with batch of sounds: [{"prompt": ..., "filename": ..., "duration": ...}, ...]
    #[arg(short, long)]
    pub batch: Option<PathBuf>,

    /// Device for the model (auto, cpu, cuda, mps)
    #[arg(long, env = "MAKESOUND_DEVICE", default_value = "auto")]
    pub device: String,

    /// Python interpreter with audiocraft installed
    #[arg(long, env = "MAKESOUND_PYTHON", default_value = "python3")]
    pub python: String,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "warn")]
    pub log: String,
}

impl Cli {
    /// Worker configuration for the selected model
    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            python: self.python.clone(),
            model: self.model.clone(),
            device: self.device.clone(),
        }
    }
}

/// Command line arguments for the `prepare-batch` manifest converter
#[derive(Parser, Debug, Clone)]
#[command(name = "prepare-batch")]
#[command(about = "Convert a sound list into a batch file for makesound")]
#[command(version)]
pub struct PrepareArgs {
    /// Sound list to read ({"sounds": [...]})
    #[arg(short, long, default_value = DEFAULT_SOUND_LIST)]
    pub source: PathBuf,

    /// Batch file to write
    #[arg(short, long, default_value = DEFAULT_BATCH_FILE)]
    pub output: PathBuf,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "warn")]
    pub log: String,
}

/// Initialize tracing with given log level
///
/// Logs go to stderr; stdout is reserved for progress lines.
pub fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Load environment variables from .env file
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}
