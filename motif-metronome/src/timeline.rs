//! Pure click timeline: beat positions, subdivision accents, tempo ramps
//!
//! The timeline is driven by instants handed in from outside, which keeps it
//! deterministic under test. The tick thread in `scheduler` polls it against
//! the monotonic clock.

use std::time::{Duration, Instant};

/// Period math needs a positive BPM; anything lower is clamped
const MIN_TIMELINE_BPM: f64 = 1.0;

/// Loudness class of a click
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickKind {
    /// Downbeat: first sub-beat of the first beat in a measure
    Accent,
    /// First sub-beat of any other beat
    Regular,
    /// All remaining sub-beats (quietest)
    Subdivision,
}

/// One fired click, as delivered to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatEvent {
    /// Beat within the measure, 0-based
    pub beat_index: u32,
    /// Sub-beat within the beat, 0-based
    pub subdivision_index: u32,
    pub kind: ClickKind,
    pub is_pre_count: bool,
}

impl BeatEvent {
    pub fn is_accent(&self) -> bool {
        self.kind == ClickKind::Accent
    }

    pub fn is_subdivision(&self) -> bool {
        self.kind == ClickKind::Subdivision
    }
}

/// Linear tempo ramp between two BPM values
#[derive(Debug, Clone, Copy)]
pub struct TempoRamp {
    pub start_bpm: f64,
    pub target_bpm: f64,
    pub duration: Duration,
}

/// Grid settings the timeline is built from
#[derive(Debug, Clone, Copy)]
pub struct TimelineConfig {
    pub bpm: f64,
    pub beats_per_measure: u32,
    /// Clicks per beat, 1..=4
    pub clicks_per_beat: u32,
    pub ramp: Option<TempoRamp>,
}

/// Result of a poll that fired a click
#[derive(Debug, Clone, Copy)]
pub struct TimelineTick {
    pub event: BeatEvent,
    /// True on the first main-phase click after a pre-count measure
    pub pre_count_completed: bool,
}

/// Stateful beat/subdivision position with drift-free scheduling
///
/// The next due instant is advanced by adding the subdivision period after
/// every fire - never recomputed as now-plus-period - so tick-checking
/// overhead cannot accumulate into drift. A poll fires at most one click;
/// if the timeline has fallen more than one period behind, the missed
/// instants are coalesced into that single fire.
pub struct ClickTimeline {
    beats_per_measure: u32,
    clicks_per_beat: u32,
    bpm: f64,
    ramp: Option<TempoRamp>,
    ramp_started: Instant,
    next_due: Instant,
    beat: u32,
    subdivision: u32,
    in_pre_count: bool,
    completion_armed: bool,
}

impl ClickTimeline {
    /// Start a timeline at `now`; the first click is due immediately
    pub fn new(config: TimelineConfig, now: Instant, pre_count: bool) -> Self {
        Self {
            beats_per_measure: config.beats_per_measure.max(1),
            clicks_per_beat: config.clicks_per_beat.clamp(1, 4),
            bpm: config
                .ramp
                .map(|r| r.start_bpm)
                .unwrap_or(config.bpm)
                .max(MIN_TIMELINE_BPM),
            ramp: config.ramp,
            ramp_started: now,
            next_due: now,
            beat: 0,
            subdivision: 0,
            in_pre_count: pre_count,
            completion_armed: false,
        }
    }

    /// Effective BPM at the last poll
    pub fn current_bpm(&self) -> f64 {
        self.bpm
    }

    /// Whether a tempo ramp is still in progress
    pub fn ramp_active(&self) -> bool {
        self.ramp.is_some()
    }

    /// Current (beat, subdivision) position
    pub fn position(&self) -> (u32, u32) {
        (self.beat, self.subdivision)
    }

    /// Interval between sub-beats at the current BPM
    pub fn subdivision_period(&self) -> Duration {
        Duration::from_secs_f64(60.0 / self.bpm / self.clicks_per_beat as f64)
    }

    /// Advance tempo and fire the click due at or before `now`, if any
    pub fn poll(&mut self, now: Instant) -> Option<TimelineTick> {
        self.update_ramp(now);

        if now < self.next_due {
            return None;
        }

        let event = BeatEvent {
            beat_index: self.beat,
            subdivision_index: self.subdivision,
            kind: self.classify(),
            is_pre_count: self.in_pre_count,
        };
        let pre_count_completed = self.completion_armed && !self.in_pre_count;
        self.completion_armed = self.completion_armed && self.in_pre_count;

        self.advance();

        // Coalesce: if we fell behind by more than one period, skip the
        // missed instants without firing them.
        while self.next_due <= now {
            self.advance();
        }

        Some(TimelineTick {
            event,
            pre_count_completed,
        })
    }

    /// Recompute BPM from the ramp; pin and disable once elapsed
    fn update_ramp(&mut self, now: Instant) {
        let Some(ramp) = self.ramp else { return };

        let elapsed = now.saturating_duration_since(self.ramp_started);
        if elapsed >= ramp.duration {
            self.bpm = ramp.target_bpm.max(MIN_TIMELINE_BPM);
            self.ramp = None;
            return;
        }

        let fraction = elapsed.as_secs_f64() / ramp.duration.as_secs_f64();
        let bpm = ramp.start_bpm + (ramp.target_bpm - ramp.start_bpm) * fraction;
        self.bpm = bpm.max(MIN_TIMELINE_BPM);
    }

    fn classify(&self) -> ClickKind {
        if self.subdivision != 0 {
            ClickKind::Subdivision
        } else if self.beat == 0 {
            ClickKind::Accent
        } else {
            ClickKind::Regular
        }
    }

    /// Step one sub-beat forward and schedule the next due instant
    fn advance(&mut self) {
        self.subdivision += 1;
        if self.subdivision == self.clicks_per_beat {
            self.subdivision = 0;
            self.beat += 1;
            if self.beat == self.beats_per_measure {
                self.beat = 0;
                if self.in_pre_count {
                    self.in_pre_count = false;
                    self.completion_armed = true;
                }
            }
        }

        self.next_due += self.subdivision_period();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(bpm: f64, beats: u32, clicks: u32) -> TimelineConfig {
        TimelineConfig {
            bpm,
            beats_per_measure: beats,
            clicks_per_beat: clicks,
            ramp: None,
        }
    }

    /// Drive a timeline with a synthetic 1 ms clock for `seconds`
    fn run(timeline: &mut ClickTimeline, start: Instant, seconds: f64) -> Vec<BeatEvent> {
        let mut events = Vec::new();
        let steps = (seconds * 1000.0) as u64;
        for ms in 0..=steps {
            let now = start + Duration::from_millis(ms);
            if let Some(tick) = timeline.poll(now) {
                events.push(tick.event);
            }
        }
        events
    }

    #[test]
    fn test_120_bpm_four_four_over_ten_seconds() {
        let start = Instant::now();
        let mut timeline = ClickTimeline::new(config(120.0, 4, 1), start, false);
        let events = run(&mut timeline, start, 10.0);

        // One beat every 0.5 s starting at t=0
        assert!((19..=21).contains(&events.len()), "got {}", events.len());
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.is_accent(), i % 4 == 0, "event {i}");
            assert!(!event.is_pre_count);
        }
    }

    #[test]
    fn test_subdivision_accent_pattern() {
        let start = Instant::now();
        let mut timeline = ClickTimeline::new(config(120.0, 3, 2), start, false);
        let events = run(&mut timeline, start, 1.5);

        // 3/4 at two clicks per beat: A s R s R s | A ...
        let kinds: Vec<ClickKind> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds[0], ClickKind::Accent);
        assert_eq!(kinds[1], ClickKind::Subdivision);
        assert_eq!(kinds[2], ClickKind::Regular);
        assert_eq!(kinds[3], ClickKind::Subdivision);
        assert_eq!(kinds[4], ClickKind::Regular);
        assert_eq!(kinds[5], ClickKind::Subdivision);
        assert_eq!(kinds[6], ClickKind::Accent);
    }

    #[test]
    fn test_pre_count_plays_one_measure_then_completes() {
        let start = Instant::now();
        let mut timeline = ClickTimeline::new(config(120.0, 4, 1), start, true);

        let mut events = Vec::new();
        let mut completed_at = None;
        for ms in 0..=3000u64 {
            let now = start + Duration::from_millis(ms);
            if let Some(tick) = timeline.poll(now) {
                if tick.pre_count_completed {
                    completed_at = Some(events.len());
                }
                events.push(tick.event);
            }
        }

        // Exactly beats_per_measure pre-count events, then the main phase
        let pre: Vec<_> = events.iter().filter(|e| e.is_pre_count).collect();
        assert_eq!(pre.len(), 4);
        assert!(pre[0].is_accent());
        assert_eq!(completed_at, Some(4), "completion on first main click");
        assert!(!events[4].is_pre_count);
        assert!(events[4].is_accent());
    }

    #[test]
    fn test_no_double_fire_per_instant() {
        let start = Instant::now();
        let mut timeline = ClickTimeline::new(config(120.0, 4, 1), start, false);

        // Poll the same instant repeatedly: only the first fires
        assert!(timeline.poll(start).is_some());
        assert!(timeline.poll(start).is_none());
        assert!(timeline.poll(start + Duration::from_millis(499)).is_none());
        assert!(timeline.poll(start + Duration::from_millis(500)).is_some());
    }

    #[test]
    fn test_overdue_events_coalesce_to_single_fire() {
        let start = Instant::now();
        let mut timeline = ClickTimeline::new(config(120.0, 4, 1), start, false);
        assert!(timeline.poll(start).is_some());

        // Stall for 2.2 s (four missed beats): one fire, then the grid
        // resumes in the future
        let late = start + Duration::from_millis(2200);
        assert!(timeline.poll(late).is_some());
        assert!(timeline.poll(late).is_none());
        assert!(timeline.poll(late + Duration::from_millis(200)).is_none());
        assert!(timeline.poll(late + Duration::from_millis(300)).is_some());
    }

    #[test]
    fn test_drift_free_grid() {
        // Polling with jittery timestamps must not shift the underlying grid:
        // the 20th beat of a 120 BPM timeline lands at exactly 10 s
        let start = Instant::now();
        let mut timeline = ClickTimeline::new(config(120.0, 4, 1), start, false);

        let mut fired = 0;
        let mut ms = 0u64;
        while fired < 20 {
            // Deliberately uneven tick spacing
            ms += if fired % 2 == 0 { 7 } else { 3 };
            if timeline
                .poll(start + Duration::from_millis(ms))
                .is_some()
            {
                fired += 1;
            }
        }

        // 20 fires cover beats at 0.0..=9.5 s; the next is due at 10.0 s
        assert!(timeline.poll(start + Duration::from_millis(9999)).is_none());
        assert!(timeline.poll(start + Duration::from_millis(10_000)).is_some());
    }

    #[test]
    fn test_non_positive_bpm_is_clamped_not_fatal() {
        // A zero or negative BPM must not blow up the period conversion
        let start = Instant::now();
        let mut timeline = ClickTimeline::new(config(0.0, 4, 1), start, false);
        assert!(timeline.poll(start).is_some());
        assert!(timeline.current_bpm() >= 1.0);

        let mut timeline = ClickTimeline::new(config(-30.0, 4, 1), start, false);
        assert!(timeline.poll(start).is_some());
        assert!(timeline.subdivision_period() > Duration::ZERO);
    }

    #[test]
    fn test_ramp_with_non_positive_endpoint_stays_clamped() {
        let start = Instant::now();
        let config = TimelineConfig {
            bpm: 120.0,
            beats_per_measure: 4,
            clicks_per_beat: 1,
            ramp: Some(TempoRamp {
                start_bpm: 60.0,
                target_bpm: 0.0,
                duration: Duration::from_secs(2),
            }),
        };
        let mut timeline = ClickTimeline::new(config, start, false);

        timeline.poll(start + Duration::from_millis(1900));
        assert!(timeline.current_bpm() >= 1.0);
        timeline.poll(start + Duration::from_secs(3));
        assert!(timeline.current_bpm() >= 1.0);
        assert!(timeline.subdivision_period() > Duration::ZERO);
    }

    #[test]
    fn test_ramp_reaches_target_and_pins() {
        let start = Instant::now();
        let config = TimelineConfig {
            bpm: 100.0,
            beats_per_measure: 4,
            clicks_per_beat: 1,
            ramp: Some(TempoRamp {
                start_bpm: 100.0,
                target_bpm: 140.0,
                duration: Duration::from_secs(4),
            }),
        };
        let mut timeline = ClickTimeline::new(config, start, false);

        timeline.poll(start + Duration::from_secs(2));
        let midway = timeline.current_bpm();
        assert!((midway - 120.0).abs() < 1.0, "midway bpm {midway}");

        timeline.poll(start + Duration::from_secs(5));
        assert_eq!(timeline.current_bpm(), 140.0);

        // Ramp is disabled: bpm stays pinned
        timeline.poll(start + Duration::from_secs(60));
        assert_eq!(timeline.current_bpm(), 140.0);
    }
}
