//! Streaming autocorrelation pitch tracker for live input
//!
//! Runs synchronously inside the live-buffer delivery path, so it keeps no
//! history between calls and never allocates after construction beyond the
//! first buffer's correlation scratch.

use crate::notes::note_name;
use tracing::trace;

/// Reference frequency for A4 (440 Hz)
const A4_FREQ: f32 = 440.0;

/// Search bounds and rejection threshold for the tracker
#[derive(Debug, Clone, Copy)]
pub struct PitchTrackerConfig {
    pub min_freq: f32,
    pub max_freq: f32,
    /// Minimum normalized correlation; weaker peaks report no pitch
    pub strength_threshold: f32,
}

impl Default for PitchTrackerConfig {
    fn default() -> Self {
        Self {
            min_freq: 80.0,
            max_freq: 1200.0,
            strength_threshold: 0.1,
        }
    }
}

/// A detected pitch with its musical interpretation
#[derive(Debug, Clone, PartialEq)]
pub struct PitchEstimate {
    pub frequency: f32,
    /// Nearest equal-tempered note, e.g. "A4"
    pub note: String,
    /// Deviation from that note, -50..+50 cents
    pub cents: f32,
}

/// Time-domain autocorrelation pitch detector
pub struct PitchTracker {
    sample_rate: u32,
    config: PitchTrackerConfig,
    min_lag: usize,
    max_lag: usize,
    /// Correlation per lag, reused across calls
    correlation: Vec<f32>,
}

impl PitchTracker {
    pub fn new(sample_rate: u32) -> Self {
        Self::with_config(sample_rate, PitchTrackerConfig::default())
    }

    pub fn with_config(sample_rate: u32, config: PitchTrackerConfig) -> Self {
        // f = sr / lag, so the highest frequency sets the shortest lag
        let min_lag = ((sample_rate as f32 / config.max_freq).floor() as usize).max(2);
        let max_lag = (sample_rate as f32 / config.min_freq).ceil() as usize;

        Self {
            sample_rate,
            config,
            min_lag,
            max_lag,
            correlation: vec![0.0; max_lag + 2],
        }
    }

    /// Analyze one live buffer; returns `None` when no confident pitch exists
    ///
    /// The winning lag is refined by parabolic interpolation over its two
    /// neighbors for sub-sample accuracy before conversion to frequency.
    pub fn process(&mut self, samples: &[f32]) -> Option<PitchEstimate> {
        // Need a full lag plus a neighbor for interpolation
        let max_lag = self.max_lag.min(samples.len().saturating_sub(2));
        if max_lag <= self.min_lag {
            return None;
        }

        let energy: f32 = samples.iter().map(|s| s * s).sum();
        if energy <= f32::EPSILON {
            return None;
        }

        // Correlations for min_lag-1 ..= max_lag+1 so the winner always has
        // both neighbors available.
        let lo = self.min_lag - 1;
        for lag in lo..=max_lag + 1 {
            let r: f32 = samples[..samples.len() - lag]
                .iter()
                .zip(&samples[lag..])
                .map(|(a, b)| a * b)
                .sum();
            self.correlation[lag] = r;
        }

        let mut best_lag = self.min_lag;
        let mut best_r = f32::NEG_INFINITY;
        for lag in self.min_lag..=max_lag {
            if self.correlation[lag] > best_r {
                best_r = self.correlation[lag];
                best_lag = lag;
            }
        }

        let strength = best_r / energy;
        if strength < self.config.strength_threshold {
            trace!(strength, "pitch rejected: weak correlation");
            return None;
        }

        let refined_lag = self.refine_lag(best_lag);
        let frequency = self.sample_rate as f32 / refined_lag;

        if frequency < self.config.min_freq || frequency > self.config.max_freq {
            trace!(frequency, "pitch rejected: outside search bounds");
            return None;
        }

        Some(Self::to_estimate(frequency))
    }

    /// Parabolic interpolation around the winning lag
    fn refine_lag(&self, lag: usize) -> f32 {
        let left = self.correlation[lag - 1];
        let center = self.correlation[lag];
        let right = self.correlation[lag + 1];

        let denom = left - 2.0 * center + right;
        if denom.abs() < f32::EPSILON {
            return lag as f32;
        }

        let delta = 0.5 * (left - right) / denom;
        lag as f32 + delta.clamp(-1.0, 1.0)
    }

    /// Convert a frequency to the nearest note and cents deviation
    fn to_estimate(frequency: f32) -> PitchEstimate {
        let semitones = 12.0 * (frequency / A4_FREQ).log2();
        let nearest = semitones.round();
        let cents = (semitones - nearest) * 100.0;
        let midi_note = nearest as i32 + 69;

        PitchEstimate {
            frequency,
            note: note_name(midi_note),
            cents,
        }
    }
}
