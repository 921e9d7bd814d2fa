//! Time-domain signal quality metrics

use crate::buffer::{AnalysisError, SampleBuffer};
use std::fmt;
use tracing::debug;

/// Samples at or above this magnitude count as clipped
const CLIP_THRESHOLD: f32 = 0.99;

/// Samples below this magnitude count as silence
const SILENCE_THRESHOLD: f32 = 0.01;

/// Ordinal quality classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QualityClass {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl fmt::Display for QualityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QualityClass::Poor => "Poor",
            QualityClass::Fair => "Fair",
            QualityClass::Good => "Good",
            QualityClass::Excellent => "Excellent",
        };
        write!(f, "{s}")
    }
}

/// Signal statistics for a recording
///
/// dB values may be `-inf` for an all-zero signal; that is a valid result,
/// not an error.
#[derive(Debug, Clone, Copy)]
pub struct QualityMetrics {
    /// Peak level in dBFS
    pub peak_db: f32,
    /// RMS level in dBFS
    pub rms_db: f32,
    /// Spread between the loudest and quietest 1-second window, in dB
    pub dynamic_range_db: f32,
    /// Peak minus RMS, in dB
    pub crest_factor_db: f32,
    /// Fraction of samples below the silence threshold
    pub silence_ratio: f32,
    pub clipping_detected: bool,
    pub class: QualityClass,
}

/// Computes time-domain quality metrics over the raw sample buffer
pub struct QualityAnalyzer;

impl QualityAnalyzer {
    /// Analyze a recording's signal quality
    pub fn analyze(buffer: &SampleBuffer) -> Result<QualityMetrics, AnalysisError> {
        let samples = buffer.to_mono()?;

        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
        let mean_square = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
        let rms = mean_square.sqrt();

        let peak_db = to_db(peak);
        let rms_db = to_db(rms);

        let dynamic_range_db = Self::dynamic_range(&samples, buffer.sample_rate());
        let crest_factor_db = peak_db - rms_db;

        let silent = samples
            .iter()
            .filter(|s| s.abs() < SILENCE_THRESHOLD)
            .count();
        let silence_ratio = silent as f32 / samples.len() as f32;

        let clipping_detected = samples.iter().any(|s| s.abs() >= CLIP_THRESHOLD);

        let class = Self::classify(clipping_detected, rms_db, dynamic_range_db);
        debug!(
            peak_db,
            rms_db, dynamic_range_db, silence_ratio, clipping_detected, %class,
            "quality analyzed"
        );

        Ok(QualityMetrics {
            peak_db,
            rms_db,
            dynamic_range_db,
            crest_factor_db,
            silence_ratio,
            clipping_detected,
            class,
        })
    }

    /// Max minus min windowed RMS over contiguous 1-second windows
    fn dynamic_range(samples: &[f32], sample_rate: u32) -> f32 {
        let window = sample_rate as usize;
        let mut max_rms = f32::NEG_INFINITY;
        let mut min_rms = f32::INFINITY;

        for chunk in samples.chunks(window) {
            let mean_square = chunk.iter().map(|s| s * s).sum::<f32>() / chunk.len() as f32;
            let rms_db = to_db(mean_square.sqrt());
            max_rms = max_rms.max(rms_db);
            min_rms = min_rms.min(rms_db);
        }

        let range = max_rms - min_rms;
        // A single all-zero window gives -inf - -inf; report no spread
        if range.is_nan() {
            0.0
        } else {
            range
        }
    }

    /// Classification rule, evaluated top-down
    fn classify(clipping: bool, rms_db: f32, dynamic_range_db: f32) -> QualityClass {
        if clipping {
            QualityClass::Poor
        } else if rms_db < -40.0 {
            QualityClass::Poor
        } else if dynamic_range_db > 6.0 && rms_db > -24.0 && rms_db < -6.0 {
            QualityClass::Excellent
        } else if dynamic_range_db > 3.0 && rms_db > -30.0 {
            QualityClass::Good
        } else {
            QualityClass::Fair
        }
    }
}

fn to_db(linear: f32) -> f32 {
    20.0 * linear.log10()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_full_scale_square_wave_clips() {
        let samples: Vec<f32> = (0..44100).map(|i| if i % 100 < 50 { 1.0 } else { -1.0 }).collect();
        let buffer = SampleBuffer::mono(samples, 44100);
        let metrics = QualityAnalyzer::analyze(&buffer).unwrap();

        assert!(metrics.clipping_detected);
        assert_eq!(metrics.class, QualityClass::Poor);
    }

    #[test]
    fn test_all_zero_buffer_is_poor_silence() {
        let buffer = SampleBuffer::mono(vec![0.0; 44100], 44100);
        let metrics = QualityAnalyzer::analyze(&buffer).unwrap();

        assert_eq!(metrics.silence_ratio, 1.0);
        assert_eq!(metrics.class, QualityClass::Poor);
        assert_eq!(metrics.peak_db, f32::NEG_INFINITY);
        assert_eq!(metrics.rms_db, f32::NEG_INFINITY);
    }

    #[test]
    fn test_crest_factor_of_sine() {
        // A sine has a crest factor of ~3.01 dB
        let samples: Vec<f32> = (0..44100 * 2)
            .map(|i| 0.5 * (2.0 * PI * 440.0 * i as f32 / 44100.0).sin())
            .collect();
        let buffer = SampleBuffer::mono(samples, 44100);
        let metrics = QualityAnalyzer::analyze(&buffer).unwrap();

        assert!((metrics.crest_factor_db - 3.01).abs() < 0.2);
        assert!(!metrics.clipping_detected);
    }

    #[test]
    fn test_dynamic_signal_is_excellent() {
        // Alternating seconds of moderate and quiet sine: RMS in the
        // excellent band with > 6 dB of windowed spread
        let sample_rate = 44100u32;
        let mut samples = Vec::new();
        for second in 0..6 {
            let amp = if second % 2 == 0 { 0.4 } else { 0.1 };
            for i in 0..sample_rate {
                let t = i as f32 / sample_rate as f32;
                samples.push(amp * (2.0 * PI * 440.0 * t).sin());
            }
        }
        let buffer = SampleBuffer::mono(samples, sample_rate);
        let metrics = QualityAnalyzer::analyze(&buffer).unwrap();

        assert!(metrics.dynamic_range_db > 6.0);
        assert_eq!(metrics.class, QualityClass::Excellent);
    }

    #[test]
    fn test_flat_quiet_signal_is_fair() {
        // Constant very low-level tone: no clipping, RMS fine-ish but no
        // dynamics
        let samples: Vec<f32> = (0..44100 * 3)
            .map(|i| 0.05 * (2.0 * PI * 440.0 * i as f32 / 44100.0).sin())
            .collect();
        let buffer = SampleBuffer::mono(samples, 44100);
        let metrics = QualityAnalyzer::analyze(&buffer).unwrap();

        assert_eq!(metrics.class, QualityClass::Fair);
    }

    #[test]
    fn test_empty_buffer_is_error() {
        let buffer = SampleBuffer::mono(vec![], 44100);
        assert!(matches!(
            QualityAnalyzer::analyze(&buffer),
            Err(AnalysisError::EmptyInput)
        ));
    }
}
