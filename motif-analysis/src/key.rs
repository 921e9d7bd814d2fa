//! Key detection by correlating chroma against major/minor key profiles

use crate::buffer::{AnalysisError, SampleBuffer};
use crate::chroma::{ChromaProfiler, ChromaVector};
use crate::notes::pitch_class_name;
use std::fmt;
use tracing::debug;

/// Krumhansl-Schmuckler major key profile, index 0 = tonic
const MAJOR_PROFILE: [f32; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Krumhansl-Schmuckler minor key profile, index 0 = tonic
const MINOR_PROFILE: [f32; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Major or minor mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    Major,
    Minor,
}

impl fmt::Display for KeyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMode::Major => write!(f, "Major"),
            KeyMode::Minor => write!(f, "Minor"),
        }
    }
}

/// A detected key: tonic pitch class plus mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEstimate {
    /// Tonic pitch class, 0 = C .. 11 = B
    pub tonic: u8,
    pub mode: KeyMode,
}

impl KeyEstimate {
    pub fn tonic_name(&self) -> &'static str {
        pitch_class_name(self.tonic)
    }
}

impl fmt::Display for KeyEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tonic_name(), self.mode)
    }
}

/// Batch key detector
///
/// Rotates the recording's chroma vector through all twelve tonics and
/// Pearson-correlates each rotation against both mode templates, 24
/// candidates total. Ties resolve by iteration order: tonics 0..11, major
/// before minor.
pub struct KeyEstimator {
    profiler: ChromaProfiler,
}

impl Default for KeyEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyEstimator {
    pub fn new() -> Self {
        Self {
            profiler: ChromaProfiler::new(),
        }
    }

    /// Estimate the key of a recording
    ///
    /// Returns `Ok(None)` when the chroma vector carries no tonal energy.
    pub fn estimate(&mut self, buffer: &SampleBuffer) -> Result<Option<KeyEstimate>, AnalysisError> {
        let chroma = self.profiler.profile(buffer)?;
        Ok(Self::match_profiles(&chroma))
    }

    /// Match an existing chroma vector against the 24 key candidates
    pub fn match_profiles(chroma: &ChromaVector) -> Option<KeyEstimate> {
        if chroma.iter().all(|&v| v == 0.0) {
            debug!("no key estimate: chroma vector is empty");
            return None;
        }

        let mut best: Option<KeyEstimate> = None;
        let mut best_correlation = f32::NEG_INFINITY;

        for tonic in 0..12u8 {
            let rotated = rotate(chroma, tonic);

            // Strict > keeps the first maximum: earlier tonic wins a tie,
            // and major wins over minor at the same tonic.
            let major = pearson(&rotated, &MAJOR_PROFILE);
            if major > best_correlation {
                best_correlation = major;
                best = Some(KeyEstimate {
                    tonic,
                    mode: KeyMode::Major,
                });
            }

            let minor = pearson(&rotated, &MINOR_PROFILE);
            if minor > best_correlation {
                best_correlation = minor;
                best = Some(KeyEstimate {
                    tonic,
                    mode: KeyMode::Minor,
                });
            }
        }

        if let Some(key) = best {
            debug!(%key, correlation = best_correlation, "key detected");
        }
        best
    }
}

/// Rotate a chroma vector so the given pitch class becomes index 0
fn rotate(chroma: &ChromaVector, tonic: u8) -> ChromaVector {
    let mut rotated = [0.0f32; 12];
    for (i, slot) in rotated.iter_mut().enumerate() {
        *slot = chroma[(i + tonic as usize) % 12];
    }
    rotated
}

/// Pearson correlation coefficient between two 12-element vectors
fn pearson(a: &[f32; 12], b: &[f32; 12]) -> f32 {
    let mean_a: f32 = a.iter().sum::<f32>() / 12.0;
    let mean_b: f32 = b.iter().sum::<f32>() / 12.0;

    let mut numerator = 0.0f32;
    let mut denom_a = 0.0f32;
    let mut denom_b = 0.0f32;

    for i in 0..12 {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        numerator += da * db;
        denom_a += da * da;
        denom_b += db * db;
    }

    let denom = (denom_a * denom_b).sqrt();
    if denom > 0.0 {
        numerator / denom
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_rotate_identity_and_shift() {
        let chroma = [
            1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0,
        ];
        assert_eq!(rotate(&chroma, 0), chroma);

        let shifted = rotate(&chroma, 1);
        assert_eq!(shifted[0], 2.0);
        assert_eq!(shifted[11], 1.0);
    }

    #[test]
    fn test_pearson_self_correlation() {
        let corr = pearson(&MAJOR_PROFILE, &MAJOR_PROFILE);
        assert!((corr - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_profile_match_recovers_transposed_template() {
        // A chroma that IS the major template rotated to tonic G must
        // correlate best with G major.
        let mut chroma = [0.0f32; 12];
        for (i, slot) in chroma.iter_mut().enumerate() {
            *slot = MAJOR_PROFILE[(i + 12 - 7) % 12];
        }
        let key = KeyEstimator::match_profiles(&chroma).unwrap();
        assert_eq!(key.tonic, 7);
        assert_eq!(key.mode, KeyMode::Major);
    }

    #[test]
    fn test_zero_chroma_has_no_estimate() {
        assert!(KeyEstimator::match_profiles(&[0.0; 12]).is_none());
    }

    /// Synthetic melody over the C-major scale
    fn c_major_melody(sample_rate: u32) -> SampleBuffer {
        // C4 D4 E4 F4 G4 A4 B4 C5, half a second each, tonic repeated
        let freqs = [
            261.63, 293.66, 329.63, 349.23, 392.00, 440.00, 493.88, 523.25, 261.63, 392.00,
        ];
        let note_len = sample_rate as usize / 2;
        let mut samples = Vec::with_capacity(note_len * freqs.len());

        for &freq in &freqs {
            for i in 0..note_len {
                let t = i as f32 / sample_rate as f32;
                samples.push(0.5 * (2.0 * PI * freq * t).sin());
            }
        }

        SampleBuffer::mono(samples, sample_rate)
    }

    #[test]
    fn test_c_major_melody_detected_as_c_major() {
        let mut estimator = KeyEstimator::new();
        let buffer = c_major_melody(44100);
        let key = estimator.estimate(&buffer).unwrap().expect("key");
        assert_eq!(key.tonic, 0, "expected tonic C, got {}", key);
        assert_eq!(key.mode, KeyMode::Major);
    }

    #[test]
    fn test_silence_has_no_estimate() {
        let mut estimator = KeyEstimator::new();
        let buffer = SampleBuffer::mono(vec![0.0; 44100 * 2], 44100);
        assert!(estimator.estimate(&buffer).unwrap().is_none());
    }

    #[test]
    fn test_display_format() {
        let key = KeyEstimate {
            tonic: 9,
            mode: KeyMode::Minor,
        };
        assert_eq!(key.to_string(), "A Minor");
    }
}
