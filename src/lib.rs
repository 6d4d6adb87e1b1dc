pub mod audio;
pub mod backend;
pub mod cli_style;
pub mod config;
pub mod generator;
pub mod manifest;
pub mod model;
pub mod normalization;
pub mod protocol;

pub use audio::{resolve_output_path, write_audio, WriteOptions};
pub use backend::{AudiocraftBackend, BackendConfig};
pub use config::{Cli, PrepareArgs};
pub use generator::{generate_single, run_batch, run_single, BatchSummary};
pub use manifest::{convert_manifest, BatchItem, ManifestError, SoundList, SoundSpec};
pub use model::{GenerationParams, ModelInfo, SoundError, SoundModel, Waveform};
pub use normalization::{NormalizationConfig, NormalizationStrategy};
