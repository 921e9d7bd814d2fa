//! Pitch-class profiling: 12-bin chroma accumulation over spectral frames

use crate::buffer::{AnalysisError, SampleBuffer};
use crate::spectral::SpectralProcessor;

/// Reference frequency for A4 (440 Hz)
const A4_FREQ: f32 = 440.0;

/// Bins below this frequency carry rumble, not tonal content
const LOW_CUTOFF_HZ: f32 = 60.0;

const FRAME_SIZE: usize = 4096;
const HOP_SIZE: usize = 2048;

/// Normalized 12-bin energy distribution across pitch classes, index 0 = C
///
/// Sums to 1.0, or is all-zero when the input had no tonal energy.
pub type ChromaVector = [f32; 12];

/// Accumulates a chroma vector from a recording's magnitude spectra
///
/// Uses a 4096-sample FFT for usable frequency resolution at low pitches.
pub struct ChromaProfiler {
    processor: SpectralProcessor,
}

impl Default for ChromaProfiler {
    fn default() -> Self {
        Self::new()
    }
}

impl ChromaProfiler {
    pub fn new() -> Self {
        Self {
            processor: SpectralProcessor::new(FRAME_SIZE, HOP_SIZE),
        }
    }

    /// Profile a recording into a sum-normalized chroma vector
    ///
    /// Every bin above the low cutoff maps to a pitch class via its nearest
    /// MIDI note (`12*log2(f/440) + 69`) and contributes its magnitude to
    /// that slot. Zero total energy leaves the vector all-zero.
    pub fn profile(&mut self, buffer: &SampleBuffer) -> Result<ChromaVector, AnalysisError> {
        let mono = buffer.to_mono()?;
        let sample_rate = buffer.sample_rate();

        // Pre-compute the bin -> pitch-class map once per call
        let frame_size = self.processor.frame_size();
        let nyquist = sample_rate as f32 / 2.0;
        let mapping: Vec<Option<usize>> = (0..frame_size / 2)
            .map(|bin| {
                let freq = self.processor.bin_frequency(bin, sample_rate);
                if freq < LOW_CUTOFF_HZ || freq >= nyquist {
                    return None;
                }
                let midi_note = 12.0 * (freq / A4_FREQ).log2() + 69.0;
                let pitch_class = ((midi_note.round() as i32 % 12) + 12) % 12;
                Some(pitch_class as usize)
            })
            .collect();

        let mut chroma = [0.0f32; 12];
        for spectrum in self.processor.frames(&mono) {
            for (bin, magnitude) in spectrum.iter().enumerate() {
                if let Some(pitch_class) = mapping[bin] {
                    chroma[pitch_class] += magnitude;
                }
            }
        }

        let total: f32 = chroma.iter().sum();
        if total > 0.0 {
            for v in &mut chroma {
                *v /= total;
            }
        }

        Ok(chroma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn tone(freq: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let len = (sample_rate as f32 * seconds) as usize;
        (0..len)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_a440_lands_in_pitch_class_a() {
        let mut profiler = ChromaProfiler::new();
        let buffer = SampleBuffer::mono(tone(440.0, 44100, 2.0), 44100);
        let chroma = profiler.profile(&buffer).unwrap();

        // A is pitch class 9
        let max_class = chroma
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(max_class, 9);
    }

    #[test]
    fn test_chroma_sums_to_one() {
        let mut profiler = ChromaProfiler::new();
        let buffer = SampleBuffer::mono(tone(261.63, 44100, 2.0), 44100);
        let chroma = profiler.profile(&buffer).unwrap();
        let sum: f32 = chroma.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_silence_yields_zero_vector() {
        let mut profiler = ChromaProfiler::new();
        let buffer = SampleBuffer::mono(vec![0.0; 44100 * 2], 44100);
        let chroma = profiler.profile(&buffer).unwrap();
        assert!(chroma.iter().all(|&v| v == 0.0));
    }
}
