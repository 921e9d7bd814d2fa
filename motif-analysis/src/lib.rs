//! Audio analysis module for Motif
//!
//! Provides the batch detectors (tempo, key, signal quality) that run over a
//! decoded recording, and the streaming pitch tracker used for live input.
//! All detectors are pure functions over an immutable sample buffer; weak or
//! degenerate signals yield `Ok(None)`, never a fabricated value.

mod buffer;
mod chroma;
mod key;
mod notes;
mod onset;
mod pitch;
mod quality;
mod spectral;
mod tempo;

pub use buffer::{AnalysisError, SampleBuffer};
pub use chroma::{ChromaProfiler, ChromaVector};
pub use key::{KeyEstimate, KeyEstimator, KeyMode};
pub use notes::{note_name, pitch_class_name};
pub use onset::{onset_envelope, OnsetEnvelope};
pub use pitch::{PitchEstimate, PitchTracker, PitchTrackerConfig};
pub use quality::{QualityAnalyzer, QualityClass, QualityMetrics};
pub use spectral::{SpectralFrames, SpectralProcessor};
pub use tempo::{TempoEstimate, TempoEstimator};
