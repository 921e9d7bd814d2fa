//! Beat scheduler for Motif
//!
//! A sample-accurate metronome: the click timeline advances an absolute
//! next-due instant instead of rescheduling from "now", so timing never
//! drifts with tick overhead. Supports pre-count measures, subdivisions,
//! linear tempo ramps, tap tempo, and a visual-only (muted) mode.

mod click;
mod output;
mod scheduler;
mod tap;
mod timeline;

pub use click::ClickSynth;
pub use output::{ClickOutput, ClickTrigger};
pub use scheduler::{Metronome, MetronomeConfig, MetronomeMode, MetronomeStatus};
pub use tap::TapTempo;
pub use timeline::{BeatEvent, ClickKind, ClickTimeline, TempoRamp, TimelineConfig, TimelineTick};

use thiserror::Error;

/// Errors that can occur while setting up or controlling the metronome
#[derive(Error, Debug)]
pub enum MetronomeError {
    #[error("No audio output device found")]
    NoOutputDevice,
    #[error("Failed to get audio config: {0}")]
    DeviceConfig(#[from] cpal::DefaultStreamConfigError),
    #[error("Failed to create audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("Failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),
}
