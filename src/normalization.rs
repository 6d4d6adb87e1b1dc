//! Audio normalization for generated clips
//!
//! Implements the normalization strategies applied before a clip is written:
//! peak, clip, RMS and loudness. Loudness is measured following
//! ITU-R BS.1770-4 (K-weighted, gated) and reported in LUFS.

use std::f64::consts::PI;

use tracing::debug;

use crate::model::Waveform;

/// Block length for loudness gating, in seconds
const GATE_DURATION: f64 = 0.4;
/// Overlap between consecutive gating blocks
const GATE_OVERLAP: f64 = 0.75;
/// Absolute gating threshold in LKFS
const ABSOLUTE_GATE: f64 = -70.0;
/// Relative gating threshold below the ungated level, in LU
const RELATIVE_GATE: f64 = -10.0;
/// Offset compensating the K-weighting gain at 997 Hz
const KWEIGHT_BIAS: f64 = -0.691;
/// Per-channel weights (L, R, C, Ls, Rs)
const CHANNEL_WEIGHTS: [f64; 5] = [1.0, 1.0, 1.0, 1.41, 1.41];

/// Signals with RMS energy below this are left untouched by loudness normalization
pub const ENERGY_FLOOR: f32 = 2e-3;

/// How a clip is rescaled before it is written
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NormalizationStrategy {
    /// Scale so the peak sits `peak_clip_headroom_db` below full scale
    #[default]
    Peak,
    /// Clamp samples at `peak_clip_headroom_db` below full scale
    Clip,
    /// Scale so the mono RMS sits `rms_headroom_db` below full scale
    Rms,
    /// Scale to `-loudness_headroom_db` LUFS
    Loudness,
    /// Write samples as they are
    None,
}

impl NormalizationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            NormalizationStrategy::Peak => "peak",
            NormalizationStrategy::Clip => "clip",
            NormalizationStrategy::Rms => "rms",
            NormalizationStrategy::Loudness => "loudness",
            NormalizationStrategy::None => "none",
        }
    }
}

impl std::fmt::Display for NormalizationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalization settings
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizationConfig {
    pub strategy: NormalizationStrategy,
    /// Rescale even when the clip is already within range (peak/rms only)
    pub normalize: bool,
    pub peak_clip_headroom_db: f32,
    pub rms_headroom_db: f32,
    pub loudness_headroom_db: f32,
    /// Apply tanh soft compression after loudness gain
    pub loudness_compressor: bool,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            strategy: NormalizationStrategy::Peak,
            normalize: true,
            peak_clip_headroom_db: 1.0,
            rms_headroom_db: 18.0,
            loudness_headroom_db: 14.0,
            loudness_compressor: false,
        }
    }
}

impl NormalizationConfig {
    /// Loudness normalization with tanh compression, as used for generated clips
    pub fn loudness_compressed() -> Self {
        Self {
            strategy: NormalizationStrategy::Loudness,
            loudness_compressor: true,
            ..Default::default()
        }
    }
}

fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Normalize a waveform in place according to `config`
pub fn normalize_audio(wav: &mut Waveform, sample_rate: u32, config: &NormalizationConfig) {
    let scale_peak = db_to_gain(-config.peak_clip_headroom_db);
    let scale_rms = db_to_gain(-config.rms_headroom_db);

    match config.strategy {
        NormalizationStrategy::Peak => {
            let rescaling = scale_peak / wav.peak().max(f32::EPSILON);
            if config.normalize || rescaling < 1.0 {
                wav.map_samples(|s| s * rescaling);
            }
        }
        NormalizationStrategy::Clip => {
            wav.map_samples(|s| s.clamp(-scale_peak, scale_peak));
        }
        NormalizationStrategy::Rms => {
            let rescaling = scale_rms / mono_rms(wav).max(f32::EPSILON);
            if config.normalize || rescaling < 1.0 {
                wav.map_samples(|s| s * rescaling);
            }
            clip_wav(wav);
        }
        NormalizationStrategy::Loudness => {
            normalize_loudness(
                wav,
                sample_rate,
                config.loudness_headroom_db,
                config.loudness_compressor,
            );
            clip_wav(wav);
        }
        NormalizationStrategy::None => {}
    }
}

/// Scale a waveform to `-headroom_db` LUFS, optionally compressing with tanh
///
/// Quiet signals (RMS below [`ENERGY_FLOOR`]) and signals whose blocks are all
/// gated out are returned unchanged.
pub fn normalize_loudness(wav: &mut Waveform, sample_rate: u32, headroom_db: f32, compressor: bool) {
    let energy = wav.rms();
    if energy < ENERGY_FLOOR {
        debug!(energy, "signal below energy floor, skipping loudness normalization");
        return;
    }

    let Some(input_loudness) = loudness(wav, sample_rate) else {
        debug!("no blocks passed loudness gating, skipping normalization");
        return;
    };

    let delta = -f64::from(headroom_db) - input_loudness;
    let gain = 10f64.powf(delta / 20.0) as f32;
    debug!(input_loudness, gain, "applying loudness gain");

    if compressor {
        wav.map_samples(|s| (s * gain).tanh());
    } else {
        wav.map_samples(|s| s * gain);
    }
}

/// Integrated loudness in LUFS, or `None` if every block is gated out
pub fn loudness(wav: &Waveform, sample_rate: u32) -> Option<f64> {
    if wav.is_empty() || sample_rate == 0 {
        return None;
    }

    let gate_samples = ((GATE_DURATION * f64::from(sample_rate)).round() as usize).max(1);
    let step = ((gate_samples as f64 * (1.0 - GATE_OVERLAP)).round() as usize).max(1);

    // Mean square per block, per channel
    let energies: Vec<Vec<f64>> = wav
        .channels
        .iter()
        .map(|channel| block_energies(&k_weight(channel, sample_rate), gate_samples, step))
        .collect();

    let weights = &CHANNEL_WEIGHTS[..energies.len().min(CHANNEL_WEIGHTS.len())];
    let num_blocks = energies.first().map_or(0, Vec::len);

    let block_loudness: Vec<f64> = (0..num_blocks)
        .map(|b| {
            let weighted: f64 = weights.iter().zip(&energies).map(|(g, e)| g * e[b]).sum();
            KWEIGHT_BIAS + 10.0 * weighted.log10()
        })
        .collect();

    let gated_level = |keep: &dyn Fn(usize) -> bool| -> Option<f64> {
        let kept: Vec<usize> = (0..num_blocks).filter(|&b| keep(b)).collect();
        if kept.is_empty() {
            return None;
        }
        let weighted: f64 = weights
            .iter()
            .zip(&energies)
            .map(|(g, e)| g * kept.iter().map(|&b| e[b]).sum::<f64>() / kept.len() as f64)
            .sum();
        Some(KWEIGHT_BIAS + 10.0 * weighted.log10())
    };

    let above_absolute = |b: usize| block_loudness[b] > ABSOLUTE_GATE;
    let relative_gate = gated_level(&above_absolute)? + RELATIVE_GATE;
    gated_level(&|b| above_absolute(b) && block_loudness[b] > relative_gate)
}

/// Mean square energy of each gating block
///
/// A signal shorter than one block is measured as a single block.
fn block_energies(samples: &[f64], gate_samples: usize, step: usize) -> Vec<f64> {
    let mean_square = |block: &[f64]| block.iter().map(|s| s * s).sum::<f64>() / block.len() as f64;

    if samples.len() < gate_samples {
        return vec![mean_square(samples)];
    }
    let num_blocks = (samples.len() - gate_samples) / step + 1;
    (0..num_blocks)
        .map(|i| mean_square(&samples[i * step..i * step + gate_samples]))
        .collect()
}

/// Apply the two-stage K-weighting filter
fn k_weight(samples: &[f32], sample_rate: u32) -> Vec<f64> {
    let shelf = Biquad::high_shelf(sample_rate, 4.0, 1500.0, 1.0 / 2f64.sqrt());
    let highpass = Biquad::high_pass(sample_rate, 38.0, 0.5);
    let stage1 = shelf.filter(samples.iter().map(|&s| f64::from(s)));
    highpass.filter(stage1.into_iter())
}

/// Second-order IIR section, coefficients normalized by a0
#[derive(Clone, Copy, Debug)]
struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Biquad {
    fn new(b: [f64; 3], a: [f64; 3]) -> Self {
        Self {
            b0: b[0] / a[0],
            b1: b[1] / a[0],
            b2: b[2] / a[0],
            a1: a[1] / a[0],
            a2: a[2] / a[0],
        }
    }

    fn high_shelf(sample_rate: u32, gain_db: f64, center: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * center / f64::from(sample_rate);
        let alpha = w0.sin() / 2.0 / q;
        let a = 10f64.powf(gain_db / 40.0);
        let t1 = 2.0 * a.sqrt() * alpha;
        let t2 = (a - 1.0) * w0.cos();
        let t3 = (a + 1.0) * w0.cos();
        Self::new(
            [
                a * ((a + 1.0) + t2 + t1),
                -2.0 * a * ((a - 1.0) + t3),
                a * ((a + 1.0) + t2 - t1),
            ],
            [(a + 1.0) - t2 + t1, 2.0 * ((a - 1.0) - t3), (a + 1.0) - t2 - t1],
        )
    }

    fn high_pass(sample_rate: u32, cutoff: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * cutoff / f64::from(sample_rate);
        let alpha = w0.sin() / 2.0 / q;
        let b0 = (1.0 + w0.cos()) / 2.0;
        Self::new(
            [b0, -1.0 - w0.cos(), b0],
            [1.0 + alpha, -2.0 * w0.cos(), 1.0 - alpha],
        )
    }

    /// Direct form I; output is clamped to [-1, 1]
    fn filter(&self, input: impl Iterator<Item = f64>) -> Vec<f64> {
        let (mut x1, mut x2, mut y1, mut y2) = (0.0, 0.0, 0.0, 0.0);
        input
            .map(|x| {
                let y = (self.b0 * x + self.b1 * x1 + self.b2 * x2 - self.a1 * y1 - self.a2 * y2)
                    .clamp(-1.0, 1.0);
                x2 = x1;
                x1 = x;
                y2 = y1;
                y1 = y;
                y
            })
            .collect()
    }
}

/// RMS of the channel-averaged signal
fn mono_rms(wav: &Waveform) -> f32 {
    let frames = wav.num_frames();
    let channels = wav.num_channels();
    if frames == 0 || channels == 0 {
        return 0.0;
    }
    let sum: f64 = (0..frames)
        .map(|i| {
            let m = wav.channels.iter().map(|c| f64::from(c[i])).sum::<f64>() / channels as f64;
            m * m
        })
        .sum();
    (sum / frames as f64).sqrt() as f32
}

fn clip_wav(wav: &mut Waveform) {
    wav.map_samples(|s| s.clamp(-1.0, 1.0));
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 16_000;

    fn sine(freq: f32, amplitude: f32, secs: f32) -> Waveform {
        let n = (secs * SR as f32) as usize;
        Waveform::mono(
            (0..n)
                .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / SR as f32).sin())
                .collect(),
        )
    }

    #[test]
    fn test_loudness_tracks_amplitude() {
        let quiet = loudness(&sine(1000.0, 0.25, 2.0), SR).unwrap();
        let loud = loudness(&sine(1000.0, 0.5, 2.0), SR).unwrap();
        assert!(((loud - quiet) - 6.02).abs() < 0.05, "delta was {}", loud - quiet);
    }

    #[test]
    fn test_loudness_of_silence_is_gated() {
        let silent = Waveform::mono(vec![0.0; SR as usize]);
        assert_eq!(loudness(&silent, SR), None);
        assert_eq!(loudness(&Waveform::default(), SR), None);
    }

    #[test]
    fn test_short_signal_measured_as_one_block() {
        // 0.1s is shorter than one 400ms gating block
        assert!(loudness(&sine(1000.0, 0.5, 0.1), SR).is_some());
    }

    #[test]
    fn test_normalize_loudness_hits_target() {
        let mut wav = sine(440.0, 0.05, 3.0);
        normalize_loudness(&mut wav, SR, 14.0, false);
        let measured = loudness(&wav, SR).unwrap();
        assert!((measured + 14.0).abs() < 0.05, "measured {measured} LUFS");
    }

    #[test]
    fn test_normalize_loudness_skips_quiet_signal() {
        let original = sine(440.0, 1e-4, 1.0);
        let mut wav = original.clone();
        normalize_loudness(&mut wav, SR, 14.0, true);
        assert_eq!(wav, original);
    }

    #[test]
    fn test_compressor_bounds_output() {
        let mut linear = sine(440.0, 0.9, 1.0);
        let mut compressed = linear.clone();
        // 0 LUFS pushes the linear peak past full scale
        normalize_loudness(&mut linear, SR, 0.0, false);
        normalize_loudness(&mut compressed, SR, 0.0, true);
        assert!(linear.peak() > 1.0);
        assert!(compressed.peak() < 1.0);
        assert!(compressed.peak() > 0.5);
    }

    #[test]
    fn test_loudness_strategy_clips_to_unit_range() {
        let mut wav = sine(440.0, 0.9, 1.0);
        let config = NormalizationConfig {
            strategy: NormalizationStrategy::Loudness,
            loudness_headroom_db: -20.0,
            ..Default::default()
        };
        normalize_audio(&mut wav, SR, &config);
        assert!(wav.peak() <= 1.0);
    }

    #[test]
    fn test_peak_strategy() {
        let mut wav = sine(440.0, 0.2, 0.5);
        normalize_audio(&mut wav, SR, &NormalizationConfig::default());
        assert!((wav.peak() - db_to_gain(-1.0)).abs() < 1e-3);
    }

    #[test]
    fn test_clip_strategy() {
        let mut wav = Waveform::mono(vec![1.0, -1.0, 0.5]);
        let config = NormalizationConfig {
            strategy: NormalizationStrategy::Clip,
            ..Default::default()
        };
        normalize_audio(&mut wav, SR, &config);
        let limit = db_to_gain(-1.0);
        assert_eq!(wav.channels[0], vec![limit, -limit, 0.5]);
    }

    #[test]
    fn test_rms_strategy() {
        let mut wav = sine(440.0, 0.5, 1.0);
        let config = NormalizationConfig {
            strategy: NormalizationStrategy::Rms,
            ..Default::default()
        };
        normalize_audio(&mut wav, SR, &config);
        assert!((mono_rms(&wav) - db_to_gain(-18.0)).abs() < 1e-3);
    }

    #[test]
    fn test_none_strategy_leaves_samples() {
        let original = sine(440.0, 0.3, 0.2);
        let mut wav = original.clone();
        let config = NormalizationConfig {
            strategy: NormalizationStrategy::None,
            ..Default::default()
        };
        normalize_audio(&mut wav, SR, &config);
        assert_eq!(wav, original);
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(NormalizationStrategy::default(), NormalizationStrategy::Peak);
        assert_eq!(NormalizationStrategy::Loudness.as_str(), "loudness");
        assert_eq!(NormalizationStrategy::Rms.to_string(), "rms");
    }

    #[test]
    fn test_loudness_compressed_preset() {
        let config = NormalizationConfig::loudness_compressed();
        assert_eq!(config.strategy, NormalizationStrategy::Loudness);
        assert!(config.loudness_compressor);
        assert_eq!(config.loudness_headroom_db, 14.0);
    }
}
