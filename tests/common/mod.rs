//! Shared helpers for integration/e2e tests.

#![allow(dead_code)]

use std::path::Path;

/// Real-model tests only run with `MAKESOUND_E2E=1`.
pub fn should_run_e2e() -> bool {
    std::env::var("MAKESOUND_E2E").map(|v| v == "1").unwrap_or(false)
}

/// Interpreter used by the real-model tests.
pub fn python() -> String {
    std::env::var("MAKESOUND_PYTHON").unwrap_or_else(|_| "python3".to_string())
}

pub const SOUND_LIST: &str = r#"{
  "sounds": [
    {"key": "a", "emoji": "🐶", "prompt": "dog barking", "filename": "sounds/dog", "duration": 1},
    {"key": "b", "emoji": "🐱", "prompt": "cat meowing", "filename": "sounds/cat", "duration": 1.5}
  ]
}"#;

/// Read a 16-bit WAV file as mono f32 samples plus its sample rate.
pub fn read_wav(path: &Path) -> (Vec<f32>, u32) {
    let mut reader = hound::WavReader::open(path).expect("open wav");
    let spec = reader.spec();
    assert_eq!(spec.bits_per_sample, 16, "expected 16-bit PCM");
    let samples = reader
        .samples::<i16>()
        .map(|s| f32::from(s.expect("read sample")) / 32768.0)
        .collect();
    (samples, spec.sample_rate)
}

pub mod audio_validation {
    pub fn rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let s = samples.iter().map(|v| v * v).sum::<f32>() / samples.len() as f32;
        s.sqrt()
    }

    pub fn peak(samples: &[f32]) -> f32 {
        samples.iter().map(|v| v.abs()).fold(0.0f32, f32::max)
    }

    pub fn validate_audio(samples: &[f32]) {
        assert!(!samples.is_empty(), "audio is empty");
        for (i, &v) in samples.iter().enumerate() {
            assert!(v.is_finite(), "non-finite sample at {i}: {v}");
        }
        let p = peak(samples);
        assert!(p <= 1.0, "peak too large: {p}");
        let r = rms(samples);
        assert!(r >= 1e-4, "rms too small (silence?): {r}");
    }
}
