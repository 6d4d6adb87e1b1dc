//! Sound lists and batch manifests
//!
//! A sound list (`{"sounds": [...]}`) carries per-sound metadata for the
//! player UI. A batch manifest is the flat array `makesound --batch` consumes.
//! [`project`] turns the former into the latter, one item per sound, in order.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Number;
use thiserror::Error;
use tracing::{debug, info};

/// Errors reading or writing manifest files
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ManifestError>;

/// One entry of a sound list
///
/// Fields other than `prompt`, `filename` and `duration` are ignored.
/// `duration` is kept as the JSON number it was written as.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SoundSpec {
    pub prompt: String,
    pub filename: String,
    pub duration: Number,
}

impl SoundSpec {
    pub fn to_batch_item(&self) -> BatchItem {
        BatchItem {
            prompt: self.prompt.clone(),
            filename: self.filename.clone(),
            duration: Some(self.duration.clone()),
        }
    }
}

/// A sound list document
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SoundList {
    pub sounds: Vec<SoundSpec>,
}

/// One clip request in a batch manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchItem {
    pub prompt: String,
    pub filename: String,
    /// Falls back to the run's default duration when absent; `null` is rejected
    #[serde(
        default,
        deserialize_with = "present_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<Number>,
}

impl BatchItem {
    pub fn new(
        prompt: impl Into<String>,
        filename: impl Into<String>,
        duration: Option<f32>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            filename: filename.into(),
            duration: duration.and_then(|d| Number::from_f64(f64::from(d))),
        }
    }

    pub fn duration_or(&self, default: f32) -> f32 {
        self.duration
            .as_ref()
            .and_then(Number::as_f64)
            .map_or(default, |d| d as f32)
    }
}

/// Only reached when the key is present, so `null` fails instead of
/// meaning "use the default"
fn present_number<'de, D>(d: D) -> std::result::Result<Option<Number>, D::Error>
where
    D: Deserializer<'de>,
{
    Number::deserialize(d).map(Some)
}

/// Project every sound of a list into a batch item, preserving order
pub fn project(list: &SoundList) -> Vec<BatchItem> {
    list.sounds.iter().map(SoundSpec::to_batch_item).collect()
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ManifestError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a sound list file
pub fn read_sound_list(path: &Path) -> Result<SoundList> {
    let list: SoundList = read_json(path)?;
    debug!(path = %path.display(), sounds = list.sounds.len(), "loaded sound list");
    Ok(list)
}

/// Read a batch manifest
pub fn read_batch(path: &Path) -> Result<Vec<BatchItem>> {
    let items: Vec<BatchItem> = read_json(path)?;
    debug!(path = %path.display(), items = items.len(), "loaded batch manifest");
    Ok(items)
}

/// Write a batch manifest, replacing any existing file
pub fn write_batch(path: &Path, items: &[BatchItem]) -> Result<()> {
    let write_err = |source| ManifestError::Write {
        path: path.to_path_buf(),
        source,
    };
    let json = serde_json::to_string_pretty(items)
        .map_err(|e| write_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    std::fs::write(path, json).map_err(write_err)
}

/// Convert the sound list at `source` into a batch manifest at `output`
///
/// Returns the number of items written.
pub fn convert_manifest(source: &Path, output: &Path) -> Result<usize> {
    let list = read_sound_list(source)?;
    let batch = project(&list);
    write_batch(output, &batch)?;
    info!(
        source = %source.display(),
        output = %output.display(),
        items = batch.len(),
        "wrote batch manifest"
    );
    Ok(batch.len())
}
