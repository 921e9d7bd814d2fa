//! The metronome service object: mode state machine and tick thread
//!
//! One `Metronome` is constructed per application and handed around by
//! reference. All timing state lives in the tick thread's `ClickTimeline`;
//! control calls that retune the click grid (BPM, time signature,
//! subdivision, ramp) stop that thread first and restart it, so settings are
//! never half-applied mid-cycle.

use crate::output::{ClickOutput, ClickTrigger};
use crate::tap::TapTempo;
use crate::timeline::{BeatEvent, ClickTimeline, TempoRamp, TimelineConfig};
use crate::MetronomeError;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// How often the tick thread checks the clock; far finer than any
/// subdivision interval in the supported BPM range
const TICK_INTERVAL: Duration = Duration::from_micros(500);

/// Capacity of each observer's event channel
const OBSERVER_BUFFER: usize = 256;

/// Sanity bounds for an explicitly set BPM
const BPM_FLOOR: f64 = 20.0;
const BPM_CEIL: f64 = 400.0;

/// Scheduler lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetronomeMode {
    Idle,
    PreCount,
    Recording,
    Standalone,
}

/// Settings the metronome runs with
#[derive(Debug, Clone, Copy)]
pub struct MetronomeConfig {
    pub bpm: f64,
    pub beats_per_measure: u32,
    /// Clicks per beat, 1..=4
    pub clicks_per_beat: u32,
    /// Click loudness, 0..1
    pub volume: f32,
    /// Emit beat events but mute the click audio
    pub visual_only: bool,
    /// Tap-tempo estimates outside these bounds are reported but not applied
    pub min_bpm: f64,
    pub max_bpm: f64,
}

impl Default for MetronomeConfig {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            beats_per_measure: 4,
            clicks_per_beat: 1,
            volume: 0.8,
            visual_only: false,
            min_bpm: 40.0,
            max_bpm: 240.0,
        }
    }
}

/// Snapshot of the running state for UI consumers
#[derive(Debug, Clone, Copy)]
pub struct MetronomeStatus {
    pub mode: MetronomeMode,
    /// Effective BPM (ramp-adjusted while a ramp is active)
    pub bpm: f64,
    pub beat_index: u32,
    pub subdivision_index: u32,
}

/// Click gain inputs, readable by the tick thread without a restart
struct GainState {
    volume: f32,
    visual_only: bool,
}

/// State shared between the control surface and the tick thread
struct Shared {
    status: Mutex<MetronomeStatus>,
    gain: Mutex<GainState>,
    observers: Mutex<Vec<Sender<BeatEvent>>>,
    click_tx: Mutex<Option<Sender<ClickTrigger>>>,
    /// Pre-count completion callback, taken exactly once by the tick thread
    pending_completion: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    /// Set by the tick thread when a tempo ramp reaches its target
    ramp_finished: AtomicBool,
}

/// A running tick thread
struct Run {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// The beat scheduler
pub struct Metronome {
    config: MetronomeConfig,
    ramp: Option<TempoRamp>,
    tap: TapTempo,
    shared: Arc<Shared>,
    run: Option<Run>,
}

impl Metronome {
    pub fn new(config: MetronomeConfig) -> Self {
        let shared = Arc::new(Shared {
            status: Mutex::new(MetronomeStatus {
                mode: MetronomeMode::Idle,
                bpm: config.bpm,
                beat_index: 0,
                subdivision_index: 0,
            }),
            gain: Mutex::new(GainState {
                volume: config.volume,
                visual_only: config.visual_only,
            }),
            observers: Mutex::new(Vec::new()),
            click_tx: Mutex::new(None),
            pending_completion: Mutex::new(None),
            ramp_finished: AtomicBool::new(false),
        });

        Self {
            config,
            ramp: None,
            tap: TapTempo::new(),
            shared,
            run: None,
        }
    }

    /// Subscribe to beat events; any number of observers may listen
    pub fn subscribe(&self) -> Receiver<BeatEvent> {
        let (tx, rx) = bounded(OBSERVER_BUFFER);
        self.shared.observers.lock().push(tx);
        rx
    }

    /// Route clicks to an audio output
    pub fn attach_click_output(&self, output: &ClickOutput) {
        *self.shared.click_tx.lock() = Some(output.trigger_sender());
    }

    pub fn status(&self) -> MetronomeStatus {
        *self.shared.status.lock()
    }

    pub fn mode(&self) -> MetronomeMode {
        self.shared.status.lock().mode
    }

    /// `Idle -> Standalone`
    pub fn start(&mut self) -> Result<(), MetronomeError> {
        if self.mode() != MetronomeMode::Idle {
            return Err(MetronomeError::InvalidSetting(
                "metronome is already running".into(),
            ));
        }
        check_bpm(self.config.bpm)?;

        self.spawn_timeline(MetronomeMode::Standalone, false);
        info!(bpm = self.config.bpm, "metronome started");
        Ok(())
    }

    /// `Idle -> PreCount -> Recording`
    ///
    /// One full measure of clicks plays before `on_complete` runs; the first
    /// pre-count beat is the accented downbeat, matching the recording
    /// pattern that follows.
    pub fn start_with_pre_count(
        &mut self,
        on_complete: impl FnOnce() + Send + 'static,
    ) -> Result<(), MetronomeError> {
        if self.mode() != MetronomeMode::Idle {
            return Err(MetronomeError::InvalidSetting(
                "metronome is already running".into(),
            ));
        }
        check_bpm(self.config.bpm)?;

        *self.shared.pending_completion.lock() = Some(Box::new(on_complete));
        self.spawn_timeline(MetronomeMode::PreCount, true);
        info!(bpm = self.config.bpm, "metronome started with pre-count");
        Ok(())
    }

    /// Stop the timeline and return to `Idle`
    pub fn stop(&mut self) {
        self.halt_timeline();
        *self.shared.pending_completion.lock() = None;
        let mut status = self.shared.status.lock();
        status.mode = MetronomeMode::Idle;
        status.beat_index = 0;
        status.subdivision_index = 0;
        debug!("metronome stopped");
    }

    pub fn set_bpm(&mut self, bpm: f64) -> Result<(), MetronomeError> {
        check_bpm(bpm)?;

        self.retune(|m| {
            m.config.bpm = bpm;
            // An explicit tempo overrides any ramp in progress
            m.ramp = None;
        });
        Ok(())
    }

    pub fn set_time_signature(&mut self, beats_per_measure: u32) -> Result<(), MetronomeError> {
        if beats_per_measure == 0 || beats_per_measure > 16 {
            return Err(MetronomeError::InvalidSetting(format!(
                "time signature {beats_per_measure} outside 1..16"
            )));
        }

        self.retune(|m| m.config.beats_per_measure = beats_per_measure);
        Ok(())
    }

    pub fn set_subdivision(&mut self, clicks_per_beat: u32) -> Result<(), MetronomeError> {
        if !(1..=4).contains(&clicks_per_beat) {
            return Err(MetronomeError::InvalidSetting(format!(
                "subdivision {clicks_per_beat} outside 1..4"
            )));
        }

        self.retune(|m| m.config.clicks_per_beat = clicks_per_beat);
        Ok(())
    }

    /// Ramp linearly from `start_bpm` to `target_bpm` over `duration`
    pub fn set_tempo_ramp(
        &mut self,
        start_bpm: f64,
        target_bpm: f64,
        duration: Duration,
    ) -> Result<(), MetronomeError> {
        if duration.is_zero() {
            return Err(MetronomeError::InvalidSetting(
                "ramp duration must be non-zero".into(),
            ));
        }
        check_bpm(start_bpm)?;
        check_bpm(target_bpm)?;

        self.retune(|m| {
            m.ramp = Some(TempoRamp {
                start_bpm,
                target_bpm,
                duration,
            });
        });
        Ok(())
    }

    /// Gain-only: takes effect on the next click without a restart
    pub fn set_volume(&mut self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        self.config.volume = volume;
        self.shared.gain.lock().volume = volume;
    }

    /// Gain-only: beat events keep flowing, audio is muted
    pub fn set_visual_only(&mut self, visual_only: bool) {
        self.config.visual_only = visual_only;
        self.shared.gain.lock().visual_only = visual_only;
    }

    /// Register a tap; returns the computed BPM for display
    ///
    /// The estimate is applied to the metronome only when it falls inside
    /// the configured BPM bounds.
    pub fn tap_tempo(&mut self) -> Option<f64> {
        self.tap_tempo_at(Instant::now())
    }

    fn tap_tempo_at(&mut self, now: Instant) -> Option<f64> {
        let estimate = self.tap.tap_at(now);
        if let Some(bpm) = estimate {
            if bpm >= self.config.min_bpm && bpm <= self.config.max_bpm {
                let _ = self.set_bpm(bpm);
            } else {
                debug!(bpm, "tap estimate outside bounds, not applied");
            }
        }
        estimate
    }

    pub fn reset_tap_tempo(&mut self) {
        self.tap.reset();
    }

    /// Stop, apply a grid setting, restart in the previous mode
    fn retune(&mut self, apply: impl FnOnce(&mut Self)) {
        let mode = self.mode();
        let was_active = self.halt_timeline();
        apply(self);
        if was_active {
            // Resuming a pre-count replays the full lead-in measure
            self.spawn_timeline(mode, mode == MetronomeMode::PreCount);
        } else {
            self.shared.status.lock().bpm = self.current_base_bpm();
        }
    }

    /// BPM the next timeline starts from
    fn current_base_bpm(&self) -> f64 {
        self.ramp.map(|r| r.start_bpm).unwrap_or(self.config.bpm)
    }

    /// Stop the tick thread if one is running; folds a finished ramp back
    /// into the base settings
    fn halt_timeline(&mut self) -> bool {
        let was_active = if let Some(run) = self.run.take() {
            run.stop.store(true, Ordering::Relaxed);
            let _ = run.thread.join();
            true
        } else {
            false
        };

        if self.shared.ramp_finished.swap(false, Ordering::Relaxed) {
            if let Some(ramp) = self.ramp.take() {
                self.config.bpm = ramp.target_bpm;
            }
        }

        was_active
    }

    fn spawn_timeline(&mut self, mode: MetronomeMode, pre_count: bool) {
        let timeline_config = TimelineConfig {
            bpm: self.config.bpm,
            beats_per_measure: self.config.beats_per_measure,
            clicks_per_beat: self.config.clicks_per_beat,
            ramp: self.ramp,
        };

        {
            let mut status = self.shared.status.lock();
            status.mode = mode;
            status.bpm = self.current_base_bpm();
            status.beat_index = 0;
            status.subdivision_index = 0;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let shared = self.shared.clone();
        let had_ramp = self.ramp.is_some();

        let thread = thread::spawn(move || {
            let mut timeline = ClickTimeline::new(timeline_config, Instant::now(), pre_count);

            while !thread_stop.load(Ordering::Relaxed) {
                let now = Instant::now();
                if let Some(tick) = timeline.poll(now) {
                    if tick.pre_count_completed {
                        shared.status.lock().mode = MetronomeMode::Recording;
                        // Release the lock before the callback runs: it may
                        // call back into shared state
                        let callback = shared.pending_completion.lock().take();
                        if let Some(callback) = callback {
                            callback();
                        }
                    }

                    Self::dispatch(&shared, tick.event);

                    let (beat, subdivision) = timeline.position();
                    let mut status = shared.status.lock();
                    status.bpm = timeline.current_bpm();
                    status.beat_index = beat;
                    status.subdivision_index = subdivision;
                }

                if had_ramp && !timeline.ramp_active() {
                    shared.ramp_finished.store(true, Ordering::Relaxed);
                }

                thread::sleep(TICK_INTERVAL);
            }
        });

        self.run = Some(Run { stop, thread });
    }

    /// Fan an event out to observers and the click output without blocking
    fn dispatch(shared: &Shared, event: BeatEvent) {
        let gain = {
            let gain = shared.gain.lock();
            if gain.visual_only {
                0.0
            } else {
                gain.volume
            }
        };

        if let Some(click_tx) = shared.click_tx.lock().as_ref() {
            let _ = click_tx.try_send(ClickTrigger {
                kind: event.kind,
                gain,
            });
        }

        // Drop observers that have gone away; a full channel is the
        // observer's problem, not a reason to unsubscribe it
        shared.observers.lock().retain(|tx| {
            !matches!(tx.try_send(event), Err(TrySendError::Disconnected(_)))
        });
    }
}

impl Drop for Metronome {
    fn drop(&mut self) {
        self.halt_timeline();
    }
}

fn check_bpm(bpm: f64) -> Result<(), MetronomeError> {
    if !(BPM_FLOOR..=BPM_CEIL).contains(&bpm) {
        return Err(MetronomeError::InvalidSetting(format!(
            "BPM {bpm} outside {BPM_FLOOR}..{BPM_CEIL}"
        )));
    }
    Ok(())
}
