//! Worker protocol messages for the model backend
//!
//! The backend talks to its worker process with one JSON object per line.
//! Requests go to the worker's stdin, responses come back on its stdout.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use crate::model::{SoundError, Waveform};

/// Messages sent from the backend to the worker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerRequest {
    /// Generate one clip per prompt
    ///
    /// The worker applies `duration` to the model as part of this request.
    Generate {
        /// Request identifier, echoed back in the response
        id: u64,
        /// Text prompts, one clip each
        prompts: Vec<String>,
        /// Clip length in seconds
        duration: f32,
    },
    /// Stop reading requests and exit
    Shutdown,
}

/// Messages sent from the worker to the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerResponse {
    /// Model weights are loaded and the worker accepts requests
    ///
    /// Always the first line the worker writes.
    Ready {
        model: String,
        sample_rate: u32,
        #[serde(default = "default_channels")]
        channels: u16,
    },
    /// Generated audio for a `generate` request
    Audio {
        id: u64,
        sample_rate: u32,
        clips: Vec<EncodedClip>,
    },
    /// The worker failed to load the model or to serve a request
    Error {
        #[serde(default)]
        id: Option<u64>,
        message: String,
    },
}

fn default_channels() -> u16 {
    1
}

/// One clip as it travels over the wire
///
/// `pcm_f32le` is base64 of little-endian `f32` samples in planar order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncodedClip {
    pub channels: u16,
    pub pcm_f32le: String,
}

impl EncodedClip {
    /// Encode a waveform the way the worker does
    #[cfg(test)]
    pub(crate) fn encode(waveform: &Waveform) -> Self {
        let bytes: Vec<u8> = waveform
            .channels
            .iter()
            .flatten()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        Self {
            channels: waveform.num_channels() as u16,
            pcm_f32le: general_purpose::STANDARD.encode(bytes),
        }
    }

    /// Decode the payload back into a waveform
    pub fn decode(&self) -> Result<Waveform, SoundError> {
        let bytes = general_purpose::STANDARD.decode(&self.pcm_f32le)?;
        if bytes.len() % 4 != 0 {
            return Err(SoundError::Protocol(format!(
                "audio payload of {} bytes is not a whole number of f32 samples",
                bytes.len()
            )));
        }
        let samples = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Waveform::from_planar(samples, usize::from(self.channels))
    }
}
