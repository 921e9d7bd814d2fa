//! Click synthesis: short decaying sine bursts at three loudness tiers

use crate::timeline::ClickKind;
use std::f32::consts::PI;

/// Click length in seconds
const CLICK_SECS: f32 = 0.03;

/// A single sounding click
struct Voice {
    phase: f32,
    phase_inc: f32,
    remaining: usize,
    length: usize,
    amplitude: f32,
}

/// Renders clicks into an output buffer without allocating
///
/// Accent, regular, and subdivision clicks differ in pitch and level so the
/// downbeat stands out and subdivisions stay in the background. Triggering
/// while a click is still sounding replaces it; clicks are short enough that
/// this only happens when the scheduler is badly starved.
pub struct ClickSynth {
    sample_rate: f32,
    voice: Option<Voice>,
}

impl ClickSynth {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            voice: None,
        }
    }

    /// Start a click; `gain` 0..1 scales the kind's base level
    pub fn trigger(&mut self, kind: ClickKind, gain: f32) {
        let (freq, level) = match kind {
            ClickKind::Accent => (1760.0, 1.0),
            ClickKind::Regular => (1320.0, 0.7),
            ClickKind::Subdivision => (880.0, 0.4),
        };

        let length = (self.sample_rate * CLICK_SECS) as usize;
        self.voice = Some(Voice {
            phase: 0.0,
            phase_inc: 2.0 * PI * freq / self.sample_rate,
            remaining: length,
            length,
            amplitude: level * gain.clamp(0.0, 1.0),
        });
    }

    /// Mix the active click into an interleaved output buffer
    pub fn render(&mut self, output: &mut [f32], channels: usize) {
        let Some(voice) = self.voice.as_mut() else {
            return;
        };

        for frame in output.chunks_mut(channels.max(1)) {
            if voice.remaining == 0 {
                break;
            }

            let env = voice.remaining as f32 / voice.length as f32;
            let sample = voice.amplitude * env * env * voice.phase.sin();

            for slot in frame.iter_mut() {
                *slot += sample;
            }

            voice.phase += voice.phase_inc;
            if voice.phase > 2.0 * PI {
                voice.phase -= 2.0 * PI;
            }
            voice.remaining -= 1;
        }

        if voice.remaining == 0 {
            self.voice = None;
        }
    }
}
