//! Analysis coordination for Motif
//!
//! Wires the pure detectors from `motif-analysis` to the outside world: a
//! serialized batch queue for recorded takes, and a bounded live-input feed
//! for the streaming pitch tracker.

mod coordinator;
mod live;

pub use coordinator::{
    AnalysisCoordinator, AnalysisOptions, AnalysisProgress, AnalysisReport, AnalysisStage,
    RecordingId, RecordingStore,
};
pub use live::{LivePitchService, PitchReading};
