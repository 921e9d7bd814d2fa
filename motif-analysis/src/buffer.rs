//! Decoded sample buffers handed in at the analysis boundary

use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while running a detector
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Empty sample buffer")]
    EmptyInput,
    #[error("Could not acquire working storage: {0}")]
    BufferUnavailable(String),
}

/// An immutable, decoded PCM recording
///
/// Samples are interleaved f32 in -1.0..1.0 at the given sample rate. The
/// decoding collaborator produces these; no container parsing happens here.
/// Analysis operates on a single (downmixed) channel.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: Arc<Vec<f32>>,
    sample_rate: u32,
    channels: u16,
}

impl SampleBuffer {
    /// Wrap decoded interleaved samples
    pub fn new(samples: Arc<Vec<f32>>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels: channels.max(1),
        }
    }

    /// Convenience constructor for already-mono data
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(Arc::new(samples), sample_rate, 1)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Raw interleaved samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        let frames = self.samples.len() / self.channels as usize;
        frames as f64 / self.sample_rate as f64
    }

    /// Downmix to a single channel by averaging across channels
    ///
    /// Returns `EmptyInput` for a zero-length buffer so detectors share one
    /// declared failure instead of each crashing on empty slices.
    pub fn to_mono(&self) -> Result<Vec<f32>, AnalysisError> {
        if self.samples.is_empty() {
            return Err(AnalysisError::EmptyInput);
        }

        if self.channels == 1 {
            return Ok(self.samples.to_vec());
        }

        let ch = self.channels as usize;
        let mono = self
            .samples
            .chunks(ch)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();
        Ok(mono)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffer_is_declared_failure() {
        let buf = SampleBuffer::mono(vec![], 44100);
        assert!(matches!(buf.to_mono(), Err(AnalysisError::EmptyInput)));
    }

    #[test]
    fn test_stereo_downmix_averages() {
        let buf = SampleBuffer::new(Arc::new(vec![1.0, 0.0, 0.5, 0.5]), 44100, 2);
        let mono = buf.to_mono().unwrap();
        assert_eq!(mono, vec![0.5, 0.5]);
    }

    #[test]
    fn test_duration() {
        let buf = SampleBuffer::new(Arc::new(vec![0.0; 44100 * 2]), 44100, 2);
        assert!((buf.duration_secs() - 1.0).abs() < 1e-9);
    }
}
