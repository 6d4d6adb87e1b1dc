//! Clip generation and batch orchestration
//!
//! [`generate_single`] turns one prompt into one file. [`run_batch`] and
//! [`run_single`] drive it for the two CLI modes and print progress lines to
//! the supplied writer. Items are processed strictly one after another.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use crate::audio::{output_stem, write_audio, WriteOptions};
use crate::manifest::BatchItem;
use crate::model::{GenerationParams, SoundError, SoundModel};

/// Generate one clip for `prompt` and write it next to `output`
///
/// The output's extension is replaced by `.wav`; the written path is returned.
pub async fn generate_single(
    model: &dyn SoundModel,
    options: &WriteOptions,
    prompt: &str,
    output: &Path,
    duration: f32,
) -> Result<PathBuf, SoundError> {
    let start = Instant::now();
    let params = GenerationParams::new(duration);

    let wav = model
        .generate(&[prompt.to_string()], &params)
        .await?
        .into_iter()
        .next()
        .ok_or(SoundError::ClipCount {
            expected: 1,
            got: 0,
        })?;

    let sample_rate = model.info().sample_rate;
    debug!(
        frames = wav.num_frames(),
        audio_secs = wav.duration_secs(sample_rate),
        "generated clip"
    );

    let path = write_audio(&output_stem(output), wav, sample_rate, options)?;
    info!(
        prompt,
        duration,
        path = %path.display(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "clip written"
    );
    Ok(path)
}

/// Outcome of a batch run
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchSummary {
    /// Written paths, in item order
    pub outputs: Vec<PathBuf>,
}

impl BatchSummary {
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

/// Generate every item in order, stopping at the first failure
///
/// Items without a duration use `default_duration`.
pub async fn run_batch(
    model: &dyn SoundModel,
    options: &WriteOptions,
    items: &[BatchItem],
    default_duration: f32,
    out: &mut dyn Write,
) -> Result<BatchSummary, SoundError> {
    let total = items.len();
    writeln!(out, "Generating {total} sounds...")?;

    let mut summary = BatchSummary::default();
    for (i, item) in items.iter().enumerate() {
        writeln!(out, "[{}/{}] {}", i + 1, total, item.prompt)?;
        out.flush()?;

        let path = generate_single(
            model,
            options,
            &item.prompt,
            Path::new(&item.filename),
            item.duration_or(default_duration),
        )
        .await?;

        writeln!(out, "  -> {}", path.display())?;
        summary.outputs.push(path);
    }

    writeln!(out, "Done! Generated {total} sounds.")?;
    Ok(summary)
}

/// Generate a single clip and report where it was saved
pub async fn run_single(
    model: &dyn SoundModel,
    options: &WriteOptions,
    prompt: &str,
    output: &Path,
    duration: f32,
    out: &mut dyn Write,
) -> Result<PathBuf, SoundError> {
    writeln!(out, "Generating sound: {prompt}")?;
    out.flush()?;
    let path = generate_single(model, options, prompt, output, duration).await?;
    writeln!(out, "Saved to: {}", path.display())?;
    Ok(path)
}
