//! Sound generation model abstraction
//!
//! Defines the seam between the generator and whatever actually runs the
//! pretrained model. The generator only ever talks to a [`SoundModel`].

use async_trait::async_trait;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while generating or writing a clip
#[derive(Error, Debug)]
pub enum SoundError {
    #[error("failed to start model worker `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("model worker exited unexpectedly{0}")]
    WorkerExited(String),

    #[error("model worker protocol error: {0}")]
    Protocol(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("model returned {got} clips for {expected} prompts")]
    ClipCount { expected: usize, got: usize },

    #[error("WAV encoding error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for SoundError {
    fn from(err: serde_json::Error) -> Self {
        SoundError::Protocol(err.to_string())
    }
}

impl From<base64::DecodeError> for SoundError {
    fn from(err: base64::DecodeError) -> Self {
        SoundError::Protocol(format!("invalid audio payload: {err}"))
    }
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Per-call generation parameters
///
/// Every generation request carries its own parameters, so two calls with
/// different durations never observe each other's settings.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationParams {
    /// Clip length in seconds
    pub duration: f32,
}

impl GenerationParams {
    pub fn new(duration: f32) -> Self {
        Self { duration }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            duration: crate::config::DEFAULT_DURATION,
        }
    }
}

/// A generated waveform, one sample vector per channel
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Waveform {
    pub channels: Vec<Vec<f32>>,
}

impl Waveform {
    /// Single-channel waveform
    pub fn mono(samples: Vec<f32>) -> Self {
        Self {
            channels: vec![samples],
        }
    }

    /// Build a waveform from planar samples (all of channel 0, then channel 1, ...)
    pub fn from_planar(samples: Vec<f32>, num_channels: usize) -> Result<Self, SoundError> {
        if num_channels == 0 || samples.len() % num_channels != 0 {
            return Err(SoundError::Protocol(format!(
                "{} samples cannot be split into {} channels",
                samples.len(),
                num_channels
            )));
        }
        let frames = samples.len() / num_channels;
        let channels = samples.chunks(frames.max(1)).map(<[f32]>::to_vec).collect();
        let mut waveform = Self { channels };
        // chunks() yields nothing for an empty slice
        waveform.channels.resize(num_channels, Vec::new());
        Ok(waveform)
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Number of samples per channel
    pub fn num_frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.num_frames() == 0
    }

    pub fn duration_secs(&self, sample_rate: u32) -> f32 {
        self.num_frames() as f32 / sample_rate.max(1) as f32
    }

    /// Apply `f` to every sample in place
    pub fn map_samples(&mut self, mut f: impl FnMut(f32) -> f32) {
        for channel in &mut self.channels {
            for s in channel.iter_mut() {
                *s = f(*s);
            }
        }
    }

    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flatten()
            .fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// Root-mean-square over all channels and samples
    pub fn rms(&self) -> f32 {
        let count: usize = self.channels.iter().map(Vec::len).sum();
        if count == 0 {
            return 0.0;
        }
        let sum: f64 = self
            .channels
            .iter()
            .flatten()
            .map(|&s| f64::from(s) * f64::from(s))
            .sum();
        (sum / count as f64).sqrt() as f32
    }
}

/// Information about a loaded model
#[derive(Clone, Debug, PartialEq)]
pub struct ModelInfo {
    /// Pretrained model identifier, e.g. `facebook/audiogen-medium`
    pub name: String,
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Number of output channels
    pub channels: u16,
}

// =============================================================================
// Model Trait
// =============================================================================

/// A loaded text-to-audio model
#[async_trait]
pub trait SoundModel: Send + Sync {
    /// Describe the loaded model
    fn info(&self) -> ModelInfo;

    /// Generate one waveform per prompt, in prompt order
    async fn generate(
        &self,
        prompts: &[String],
        params: &GenerationParams,
    ) -> Result<Vec<Waveform>, SoundError>;
}
