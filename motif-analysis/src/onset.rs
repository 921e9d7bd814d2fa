//! Spectral-flux onset strength envelope

use crate::spectral::SpectralProcessor;

/// Normalized onset strengths, one value per frame pair
pub type OnsetEnvelope = Vec<f32>;

/// Compute the onset strength envelope of mono samples
///
/// For each pair of consecutive magnitude spectra the flux is the root of the
/// summed squared positive bin differences; only magnitude increases count,
/// since decays do not indicate onsets. The envelope is normalized by its
/// maximum. An all-zero envelope (silence) is returned as-is.
pub fn onset_envelope(processor: &mut SpectralProcessor, samples: &[f32]) -> OnsetEnvelope {
    let mut envelope = Vec::new();
    let mut prev_spectrum: Option<Vec<f32>> = None;

    for spectrum in processor.frames(samples) {
        if let Some(ref prev) = prev_spectrum {
            let flux_sq: f32 = spectrum
                .iter()
                .zip(prev.iter())
                .map(|(curr, prev)| {
                    let rise = (curr - prev).max(0.0);
                    rise * rise
                })
                .sum();
            envelope.push(flux_sq.sqrt());
        }
        prev_spectrum = Some(spectrum);
    }

    let max = envelope.iter().cloned().fold(0.0f32, f32::max);
    if max > 0.0 {
        for v in &mut envelope {
            *v /= max;
        }
    }

    envelope
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_yields_zero_envelope() {
        let mut proc = SpectralProcessor::new(1024, 512);
        let envelope = onset_envelope(&mut proc, &vec![0.0f32; 8192]);
        assert!(!envelope.is_empty());
        assert!(envelope.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_envelope_normalized_to_unit_max() {
        let sample_rate = 44100;
        let mut proc = SpectralProcessor::new(1024, 512);

        // Short bursts of noise separated by silence
        let mut samples = vec![0.0f32; sample_rate as usize];
        for burst in 0..4 {
            let start = burst * 11025;
            for i in 0..512 {
                samples[start + i] = if i % 2 == 0 { 0.8 } else { -0.8 };
            }
        }

        let envelope = onset_envelope(&mut proc, &samples);
        let max = envelope.iter().cloned().fold(0.0f32, f32::max);
        assert!((max - 1.0).abs() < 1e-6);
        assert!(envelope.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_envelope_length_is_frames_minus_one() {
        let mut proc = SpectralProcessor::new(1024, 512);
        let samples = vec![0.1f32; 4096];
        let frame_count = proc.frames(&samples).count();
        let envelope = onset_envelope(&mut proc, &samples);
        assert_eq!(envelope.len(), frame_count - 1);
    }
}
