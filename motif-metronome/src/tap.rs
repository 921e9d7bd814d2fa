//! Tap tempo: BPM from a rolling buffer of tap timestamps

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Taps older than this are discarded on every new tap
const TAP_WINDOW: Duration = Duration::from_secs(3);

/// Rolling tap buffer with a fixed trailing window
///
/// With two or more taps inside the window the BPM is `60 / average
/// inter-tap interval`. The estimate is always returned for display; whether
/// it is applied is the caller's range decision.
pub struct TapTempo {
    taps: VecDeque<Instant>,
    window: Duration,
}

impl Default for TapTempo {
    fn default() -> Self {
        Self::new()
    }
}

impl TapTempo {
    pub fn new() -> Self {
        Self {
            taps: VecDeque::new(),
            window: TAP_WINDOW,
        }
    }

    /// Register a tap now and return the current estimate, if any
    pub fn tap(&mut self) -> Option<f64> {
        self.tap_at(Instant::now())
    }

    /// Register a tap at an explicit instant (deterministic testing)
    pub fn tap_at(&mut self, now: Instant) -> Option<f64> {
        while let Some(&oldest) = self.taps.front() {
            if now.saturating_duration_since(oldest) > self.window {
                self.taps.pop_front();
            } else {
                break;
            }
        }

        self.taps.push_back(now);
        self.estimate()
    }

    /// BPM from the mean inter-tap interval; `None` with fewer than two taps
    pub fn estimate(&self) -> Option<f64> {
        if self.taps.len() < 2 {
            return None;
        }

        let first = *self.taps.front().unwrap();
        let last = *self.taps.back().unwrap();
        let span = last.saturating_duration_since(first).as_secs_f64();
        if span <= 0.0 {
            return None;
        }

        let mean_interval = span / (self.taps.len() - 1) as f64;
        Some(60.0 / mean_interval)
    }

    pub fn reset(&mut self) {
        self.taps.clear();
    }
}
