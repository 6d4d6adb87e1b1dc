//! Writing generated clips to disk
//!
//! Clips are written as 16-bit PCM WAV. The caller passes a path stem and the
//! writer appends the `.wav` extension, so `sound.mp3` ends up as `sound.wav`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::debug;

use crate::model::{SoundError, Waveform};
use crate::normalization::{normalize_audio, NormalizationConfig};

/// Extension appended to every written clip
pub const WAV_SUFFIX: &str = ".wav";

/// Strip the extension from an output path
pub fn output_stem(output: &Path) -> PathBuf {
    output.with_extension("")
}

/// Append `.wav` to a stem without touching any dots already in it
pub fn with_wav_suffix(stem: &Path) -> PathBuf {
    let mut path = OsString::from(stem.as_os_str());
    path.push(WAV_SUFFIX);
    PathBuf::from(path)
}

/// Final path a clip requested at `output` is written to
pub fn resolve_output_path(output: &Path) -> PathBuf {
    with_wav_suffix(&output_stem(output))
}

/// Options for [`write_audio`]
#[derive(Clone, Debug, PartialEq)]
pub struct WriteOptions {
    pub normalization: NormalizationConfig,
    /// Create missing parent directories
    pub make_parent_dir: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            normalization: NormalizationConfig::default(),
            make_parent_dir: true,
        }
    }
}

impl WriteOptions {
    /// Loudness normalization with compression
    pub fn loudness_compressed() -> Self {
        Self {
            normalization: NormalizationConfig::loudness_compressed(),
            ..Default::default()
        }
    }
}

/// Normalize `wav` and write it to `stem` + `.wav`, returning the written path
pub fn write_audio(
    stem: &Path,
    mut wav: Waveform,
    sample_rate: u32,
    options: &WriteOptions,
) -> Result<PathBuf, SoundError> {
    normalize_audio(&mut wav, sample_rate, &options.normalization);

    let path = with_wav_suffix(stem);
    if options.make_parent_dir {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
    }

    save_wav(&wav, sample_rate, &path)?;
    debug!(
        path = %path.display(),
        frames = wav.num_frames(),
        channels = wav.num_channels(),
        strategy = %options.normalization.strategy,
        "wrote clip"
    );
    Ok(path)
}

/// Save samples as interleaved 16-bit PCM
fn save_wav(wav: &Waveform, sample_rate: u32, path: &Path) -> Result<(), SoundError> {
    let spec = WavSpec {
        channels: wav.num_channels().max(1) as u16,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let amplitude = pcm_scale(wav);
    let mut writer = WavWriter::create(path, spec)?;
    for i in 0..wav.num_frames() {
        for channel in &wav.channels {
            let sample = (channel[i].clamp(-1.0, 1.0) * amplitude).round() as i16;
            writer.write_sample(sample)?;
        }
    }
    writer.finalize()?;
    Ok(())
}

/// Scale factor from `[-1, 1]` to 16-bit PCM
///
/// 2^15 unless some positive sample would round past `i16::MAX`, in which
/// case the whole clip uses 2^15 - 1.
fn pcm_scale(wav: &Waveform) -> f32 {
    const FULL: f32 = 32768.0;
    let would_clip = wav
        .channels
        .iter()
        .flatten()
        .any(|s| (s.clamp(-1.0, 1.0) * FULL).round() >= FULL);
    if would_clip {
        f32::from(i16::MAX)
    } else {
        FULL
    }
}
