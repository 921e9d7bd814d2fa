//! Windowed FFT frame extraction shared by the spectral detectors

use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Produces magnitude spectra from overlapping windowed frames
///
/// The FFT plan, Hann window, and complex scratch buffer are built once and
/// reused across frames and across detector runs. `frames()` is restartable:
/// each call walks the given samples from the start.
pub struct SpectralProcessor {
    frame_size: usize,
    hop_size: usize,
    fft: Arc<dyn rustfft::Fft<f32>>,
    window: Vec<f32>,
    /// Reused per frame to avoid allocation in the analysis loop
    fft_buffer: Vec<Complex<f32>>,
}

impl SpectralProcessor {
    /// Create a processor for the given frame and hop size
    pub fn new(frame_size: usize, hop_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(frame_size);

        // Pre-compute Hann window
        let window: Vec<f32> = (0..frame_size)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / frame_size as f32).cos()))
            .collect();

        Self {
            frame_size,
            hop_size,
            fft,
            window,
            fft_buffer: vec![Complex::new(0.0, 0.0); frame_size],
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Duration of one hop in seconds at the given sample rate
    pub fn hop_duration(&self, sample_rate: u32) -> f32 {
        self.hop_size as f32 / sample_rate as f32
    }

    /// Center frequency of an FFT bin at the given sample rate
    pub fn bin_frequency(&self, bin: usize, sample_rate: u32) -> f32 {
        bin as f32 * sample_rate as f32 / self.frame_size as f32
    }

    /// Lazily iterate magnitude spectra over mono samples
    ///
    /// Frame `i` starts at `i * hop_size`; the final frame is zero-padded if
    /// the buffer runs out. Each spectrum has `frame_size / 2` bins.
    pub fn frames<'a>(&'a mut self, samples: &'a [f32]) -> SpectralFrames<'a> {
        SpectralFrames {
            processor: self,
            samples,
            position: 0,
        }
    }

    /// Window a segment, transform it, and return the magnitude spectrum
    fn magnitude_spectrum(&mut self, segment: &[f32]) -> Vec<f32> {
        for (i, slot) in self.fft_buffer.iter_mut().enumerate() {
            let s = segment.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(s * self.window[i], 0.0);
        }

        self.fft.process(&mut self.fft_buffer);

        self.fft_buffer[..self.frame_size / 2]
            .iter()
            .map(|c| c.norm())
            .collect()
    }
}

/// Lazy, finite sequence of magnitude spectra
pub struct SpectralFrames<'a> {
    processor: &'a mut SpectralProcessor,
    samples: &'a [f32],
    position: usize,
}

impl Iterator for SpectralFrames<'_> {
    type Item = Vec<f32>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.samples.len() {
            return None;
        }

        let end = (self.position + self.processor.frame_size).min(self.samples.len());
        let segment = &self.samples[self.position..end];
        let spectrum = self.processor.magnitude_spectrum(segment);

        self.position += self.processor.hop_size;
        Some(spectrum)
    }
}
