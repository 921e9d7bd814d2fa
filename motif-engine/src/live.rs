//! Live input feed for the streaming pitch tracker
//!
//! The capture collaborator pushes fixed-size buffers at its own cadence and
//! must never block, so the channel between it and the tracker thread is
//! bounded and pushes fail fast when the tracker falls behind.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use motif_analysis::{PitchEstimate, PitchTracker, PitchTrackerConfig};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// At most this many capture buffers may be waiting for the tracker
const FEED_CAPACITY: usize = 8;

/// Capacity of the outgoing readings channel
const READINGS_CAPACITY: usize = 64;

/// One tracker result per delivered buffer; `None` means no confident pitch
#[derive(Debug, Clone, PartialEq)]
pub struct PitchReading {
    pub estimate: Option<PitchEstimate>,
}

/// Dedicated consumer thread running the pitch tracker over live buffers
pub struct LivePitchService {
    buffer_tx: Option<Sender<Vec<f32>>>,
    readings_rx: Receiver<PitchReading>,
    worker: Option<JoinHandle<()>>,
}

impl LivePitchService {
    pub fn new(sample_rate: u32) -> Self {
        Self::with_config(sample_rate, PitchTrackerConfig::default())
    }

    pub fn with_config(sample_rate: u32, config: PitchTrackerConfig) -> Self {
        let (buffer_tx, buffer_rx): (Sender<Vec<f32>>, Receiver<Vec<f32>>) =
            bounded(FEED_CAPACITY);
        let (readings_tx, readings_rx) = bounded(READINGS_CAPACITY);

        let worker = thread::spawn(move || {
            let mut tracker = PitchTracker::with_config(sample_rate, config);
            // Exits when the last buffer sender is dropped
            while let Ok(buffer) = buffer_rx.recv() {
                let estimate = tracker.process(&buffer);
                if readings_tx
                    .try_send(PitchReading { estimate })
                    .is_err()
                {
                    debug!("pitch reading dropped: consumer behind");
                }
            }
        });

        Self {
            buffer_tx: Some(buffer_tx),
            readings_rx,
            worker: Some(worker),
        }
    }

    /// Deliver one capture buffer; returns false if it was dropped because
    /// the tracker has not kept up
    pub fn push(&self, buffer: Vec<f32>) -> bool {
        let Some(tx) = self.buffer_tx.as_ref() else {
            return false;
        };
        match tx.try_send(buffer) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("live buffer dropped: pitch tracker behind");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Tracker results, one per accepted buffer
    pub fn readings(&self) -> &Receiver<PitchReading> {
        &self.readings_rx
    }
}

impl Drop for LivePitchService {
    fn drop(&mut self) {
        // Closing the feed lets the worker drain and exit
        self.buffer_tx = None;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;
    use std::time::Duration;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.6 * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_live_tone_is_tracked() {
        let service = LivePitchService::new(44100);
        assert!(service.push(sine(440.0, 44100, 2048)));

        let reading = service
            .readings()
            .recv_timeout(Duration::from_secs(5))
            .unwrap();
        let estimate = reading.estimate.expect("pitch");
        assert_eq!(estimate.note, "A4");
    }

    #[test]
    fn test_silent_buffer_reads_no_pitch() {
        let service = LivePitchService::new(44100);
        assert!(service.push(vec![0.0; 2048]));

        let reading = service
            .readings()
            .recv_timeout(Duration::from_secs(5))
            .unwrap();
        assert!(reading.estimate.is_none());
    }

    #[test]
    fn test_one_reading_per_buffer() {
        let service = LivePitchService::new(48000);
        for _ in 0..4 {
            assert!(service.push(sine(330.0, 48000, 2048)));
        }

        for _ in 0..4 {
            service
                .readings()
                .recv_timeout(Duration::from_secs(5))
                .unwrap();
        }
        assert!(service
            .readings()
            .recv_timeout(Duration::from_millis(100))
            .is_err());
    }
}
