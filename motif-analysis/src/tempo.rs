//! Tempo estimation via autocorrelation of the onset envelope

use crate::buffer::{AnalysisError, SampleBuffer};
use crate::onset::onset_envelope;
use crate::spectral::SpectralProcessor;
use tracing::debug;

const DEFAULT_MIN_BPM: f32 = 60.0;
const DEFAULT_MAX_BPM: f32 = 180.0;

const FRAME_SIZE: usize = 2048;
const HOP_SIZE: usize = 512;

/// A detected tempo in whole beats per minute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempoEstimate {
    pub bpm: u32,
}

/// Batch tempo detector
///
/// Autocorrelates the spectral-flux onset envelope over a lag range derived
/// from the BPM search bounds and picks the lag with the highest correlation
/// sum. Silence, noise, or a buffer too short for the lag range yield
/// `Ok(None)` - never a clamped default.
pub struct TempoEstimator {
    processor: SpectralProcessor,
    min_bpm: f32,
    max_bpm: f32,
}

impl Default for TempoEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl TempoEstimator {
    /// Create an estimator with the default 60-180 BPM search range
    pub fn new() -> Self {
        Self::with_range(DEFAULT_MIN_BPM, DEFAULT_MAX_BPM)
    }

    /// Create an estimator with a custom BPM search range
    pub fn with_range(min_bpm: f32, max_bpm: f32) -> Self {
        Self {
            processor: SpectralProcessor::new(FRAME_SIZE, HOP_SIZE),
            min_bpm: min_bpm.min(max_bpm),
            max_bpm: max_bpm.max(min_bpm),
        }
    }

    /// Estimate the tempo of a recording
    pub fn estimate(
        &mut self,
        buffer: &SampleBuffer,
    ) -> Result<Option<TempoEstimate>, AnalysisError> {
        let mono = buffer.to_mono()?;
        let envelope = onset_envelope(&mut self.processor, &mono);

        let hop_duration = self.processor.hop_duration(buffer.sample_rate());

        // Fast tempo -> short lag, slow tempo -> long lag
        let min_lag = (60.0 / (self.max_bpm * hop_duration)).round().max(1.0) as usize;
        let max_lag = (60.0 / (self.min_bpm * hop_duration)).round() as usize;

        // The envelope must extend past the longest candidate lag or no
        // correlation sum has any terms.
        if min_lag >= max_lag || envelope.len() <= max_lag {
            debug!(
                envelope_len = envelope.len(),
                max_lag, "envelope too short for tempo search range"
            );
            return Ok(None);
        }

        let mut best_lag = 0usize;
        let mut best_correlation = 0.0f32;

        for lag in min_lag..=max_lag {
            let correlation: f32 = envelope[..envelope.len() - lag]
                .iter()
                .zip(&envelope[lag..])
                .map(|(a, b)| a * b)
                .sum();

            if correlation > best_correlation {
                best_correlation = correlation;
                best_lag = lag;
            }
        }

        // Silence or pure noise: no periodicity worth reporting
        if best_lag == 0 || best_correlation <= 0.0 {
            debug!("no tempo estimate: correlation degenerate");
            return Ok(None);
        }

        let bpm = (60.0 / (best_lag as f32 * hop_duration)).round() as u32;
        debug!(bpm, lag = best_lag, correlation = best_correlation, "tempo detected");
        Ok(Some(TempoEstimate { bpm }))
    }
}
