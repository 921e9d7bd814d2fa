//! cpal click output: owns the audio stream and plays triggered clicks

use crate::click::ClickSynth;
use crate::timeline::ClickKind;
use crate::MetronomeError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{info, warn};

/// A click request from the scheduler to the audio callback
#[derive(Debug, Clone, Copy)]
pub struct ClickTrigger {
    pub kind: ClickKind,
    /// Final gain, volume and visual-only mute already applied
    pub gain: f32,
}

/// Default-device output stream that sounds clicks on demand
///
/// Triggers arrive over a bounded channel; the callback drains it with
/// `try_recv` and never blocks. Setup failures surface to the caller and
/// leave the scheduler untouched - they are never retried automatically.
pub struct ClickOutput {
    // Held alive for the duration of the output; dropping stops playback
    _stream: cpal::Stream,
    trigger_tx: Sender<ClickTrigger>,
}

impl ClickOutput {
    /// Open the default output device and start the stream
    pub fn new() -> Result<Self, MetronomeError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(MetronomeError::NoOutputDevice)?;
        let config = device.default_output_config()?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;
        info!(sample_rate, channels, "click output stream starting");

        // Small bound: at most a few clicks are ever in flight
        let (trigger_tx, trigger_rx): (Sender<ClickTrigger>, Receiver<ClickTrigger>) = bounded(64);

        let mut synth = ClickSynth::new(sample_rate);
        let stream = device.build_output_stream(
            &config.into(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                data.fill(0.0);
                while let Ok(trigger) = trigger_rx.try_recv() {
                    synth.trigger(trigger.kind, trigger.gain);
                }
                synth.render(data, channels);
            },
            |err| {
                warn!("click output stream error: {err}");
            },
            None,
        )?;

        stream.play()?;

        Ok(Self {
            _stream: stream,
            trigger_tx,
        })
    }

    /// Sender the scheduler uses to sound clicks
    pub fn trigger_sender(&self) -> Sender<ClickTrigger> {
        self.trigger_tx.clone()
    }
}
