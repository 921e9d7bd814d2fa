//! Serialized batch-analysis queue
//!
//! Recordings are analyzed strictly one at a time: one task in flight
//! globally, FIFO order, with progress reported to observers. A detector
//! with no answer leaves that field unset; it never aborts the rest of the
//! recording's analysis.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use motif_analysis::{
    KeyEstimate, KeyEstimator, QualityAnalyzer, QualityMetrics, SampleBuffer, TempoEstimate,
    TempoEstimator,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Identifier assigned to a recording by the persistence collaborator
pub type RecordingId = u64;

/// Capacity of the command and observer channels
const CHANNEL_BUFFER: usize = 256;

/// Which detectors to run for a task
#[derive(Debug, Clone, Copy)]
pub struct AnalysisOptions {
    pub tempo: bool,
    pub key: bool,
    pub quality: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            tempo: true,
            key: true,
            quality: true,
        }
    }
}

/// Detector results for one recording; absent fields had no estimate
#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    pub tempo: Option<TempoEstimate>,
    pub key: Option<KeyEstimate>,
    pub quality: Option<QualityMetrics>,
}

/// Seam to the persistence collaborator that owns recordings
pub trait RecordingStore: Send + Sync {
    /// Decoded samples for a recording, or `None` if it no longer exists
    fn samples(&self, id: RecordingId) -> Option<SampleBuffer>;

    /// Whether this recording already has stored analysis results
    fn is_analyzed(&self, id: RecordingId) -> bool;

    /// Persist a finished report
    fn apply(&self, id: RecordingId, report: AnalysisReport);
}

/// Which detector is currently running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStage {
    Tempo,
    Key,
    Quality,
}

/// Progress notifications for observers
#[derive(Debug, Clone, Copy)]
pub enum AnalysisProgress {
    Started {
        id: RecordingId,
        queue_depth: usize,
    },
    Stage {
        id: RecordingId,
        stage: AnalysisStage,
    },
    Finished {
        id: RecordingId,
        queue_depth: usize,
    },
    /// Already analyzed (idempotent re-queue) or samples unavailable
    Skipped {
        id: RecordingId,
        queue_depth: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct Task {
    id: RecordingId,
    options: AnalysisOptions,
}

enum Command {
    Enqueue(Task),
    Clear,
    Shutdown,
}

/// FIFO analysis queue with a single worker thread
pub struct AnalysisCoordinator {
    cmd_tx: Sender<Command>,
    observers: Arc<Mutex<Vec<Sender<AnalysisProgress>>>>,
    queue_depth: Arc<AtomicUsize>,
    worker: Option<JoinHandle<()>>,
}

impl AnalysisCoordinator {
    pub fn new(store: Arc<dyn RecordingStore>) -> Self {
        let (cmd_tx, cmd_rx) = bounded(CHANNEL_BUFFER);
        let observers: Arc<Mutex<Vec<Sender<AnalysisProgress>>>> = Arc::new(Mutex::new(Vec::new()));
        let queue_depth = Arc::new(AtomicUsize::new(0));

        let worker = {
            let observers = observers.clone();
            let queue_depth = queue_depth.clone();
            thread::spawn(move || run_worker(store, cmd_rx, observers, queue_depth))
        };

        Self {
            cmd_tx,
            observers,
            queue_depth,
            worker: Some(worker),
        }
    }

    /// Queue one recording for analysis
    pub fn enqueue(&self, id: RecordingId, options: AnalysisOptions) {
        let _ = self.cmd_tx.send(Command::Enqueue(Task { id, options }));
    }

    /// Queue several recordings, preserving order
    pub fn enqueue_batch(&self, ids: &[RecordingId], options: AnalysisOptions) {
        for &id in ids {
            self.enqueue(id, options);
        }
    }

    /// Discard all pending tasks; the task in flight finishes normally
    pub fn clear_queue(&self) {
        let _ = self.cmd_tx.send(Command::Clear);
    }

    /// Number of tasks waiting (excludes the one in flight)
    pub fn queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Relaxed)
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> Receiver<AnalysisProgress> {
        let (tx, rx) = bounded(CHANNEL_BUFFER);
        self.observers.lock().push(tx);
        rx
    }
}

impl Drop for AnalysisCoordinator {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_worker(
    store: Arc<dyn RecordingStore>,
    cmd_rx: Receiver<Command>,
    observers: Arc<Mutex<Vec<Sender<AnalysisProgress>>>>,
    queue_depth: Arc<AtomicUsize>,
) {
    // Detector processors are reused across tasks so FFT plans and scratch
    // buffers are built once.
    let mut tempo = TempoEstimator::new();
    let mut key = KeyEstimator::new();
    let mut queue: VecDeque<Task> = VecDeque::new();

    loop {
        // Apply every command that has arrived since the last task finished
        loop {
            match cmd_rx.try_recv() {
                Ok(Command::Enqueue(task)) => {
                    // Idempotent: one pending task per recording
                    if !queue.iter().any(|t| t.id == task.id) {
                        queue.push_back(task);
                    }
                }
                Ok(Command::Clear) => {
                    debug!(discarded = queue.len(), "analysis queue cleared");
                    queue.clear();
                }
                Ok(Command::Shutdown) => return,
                Err(_) => break,
            }
        }
        queue_depth.store(queue.len(), Ordering::Relaxed);

        let Some(task) = queue.pop_front() else {
            // Idle: block until something arrives
            match cmd_rx.recv_timeout(Duration::from_millis(50)) {
                Ok(Command::Enqueue(task)) => queue.push_back(task),
                Ok(Command::Clear) => queue.clear(),
                Ok(Command::Shutdown) => return,
                Err(_) => {}
            }
            continue;
        };
        queue_depth.store(queue.len(), Ordering::Relaxed);

        process_task(&store, &observers, &queue_depth, &mut tempo, &mut key, task);

        // Yield between tasks so a host UI thread stays responsive
        thread::yield_now();
    }
}

fn process_task(
    store: &Arc<dyn RecordingStore>,
    observers: &Mutex<Vec<Sender<AnalysisProgress>>>,
    queue_depth: &AtomicUsize,
    tempo: &mut TempoEstimator,
    key: &mut KeyEstimator,
    task: Task,
) {
    let depth = queue_depth.load(Ordering::Relaxed);

    if store.is_analyzed(task.id) {
        debug!(id = task.id, "recording already analyzed, skipping");
        notify(observers, AnalysisProgress::Skipped { id: task.id, queue_depth: depth });
        return;
    }

    let Some(buffer) = store.samples(task.id) else {
        warn!(id = task.id, "recording samples unavailable, skipping");
        notify(observers, AnalysisProgress::Skipped { id: task.id, queue_depth: depth });
        return;
    };

    notify(observers, AnalysisProgress::Started { id: task.id, queue_depth: depth });
    let mut report = AnalysisReport::default();

    // Each detector fails or abstains on its own; the report keeps whatever
    // the others produced.
    if task.options.tempo {
        notify(observers, AnalysisProgress::Stage { id: task.id, stage: AnalysisStage::Tempo });
        match tempo.estimate(&buffer) {
            Ok(estimate) => report.tempo = estimate,
            Err(e) => warn!(id = task.id, "tempo detector failed: {e}"),
        }
    }

    if task.options.key {
        notify(observers, AnalysisProgress::Stage { id: task.id, stage: AnalysisStage::Key });
        match key.estimate(&buffer) {
            Ok(estimate) => report.key = estimate,
            Err(e) => warn!(id = task.id, "key detector failed: {e}"),
        }
    }

    if task.options.quality {
        notify(observers, AnalysisProgress::Stage { id: task.id, stage: AnalysisStage::Quality });
        match QualityAnalyzer::analyze(&buffer) {
            Ok(metrics) => report.quality = Some(metrics),
            Err(e) => warn!(id = task.id, "quality analyzer failed: {e}"),
        }
    }

    store.apply(task.id, report);
    info!(id = task.id, "analysis finished");
    notify(
        observers,
        AnalysisProgress::Finished { id: task.id, queue_depth: depth },
    );
}

fn notify(observers: &Mutex<Vec<Sender<AnalysisProgress>>>, progress: AnalysisProgress) {
    observers.lock().retain(|tx| {
        !matches!(tx.try_send(progress), Err(TrySendError::Disconnected(_)))
    });
}
