//! Synthetic progress: a timer-driven step indicator for an opaque call.
//!
//! The remote conversion is a single request/response — none of its internal
//! stages are observable. What the user sees instead is a fixed sequence of
//! named steps advanced by a timer at a fixed interval, running concurrently
//! with the real call and synchronised with it through exactly one signal:
//! "done". The timer halts at the last step if the call is still in flight,
//! and `finish` jumps straight to "all steps complete" and cancels the timer.
//!
//! The reporter carries no correctness contract with the real work. Its only
//! guarantees: the index is monotonic, it never reaches the final index
//! before `finish`, and it always reaches the final index once `finish` is
//! called.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// One named step in the displayed sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressStep {
    pub id: String,
    pub label: String,
}

impl ProgressStep {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// The step sequence shown while a document conversion is in flight.
pub fn default_steps() -> Vec<ProgressStep> {
    vec![
        ProgressStep::new("detect-layout", "Detecting Layout"),
        ProgressStep::new("detect-language", "Detecting Language"),
        ProgressStep::new("ocr-text", "OCR Text"),
        ProgressStep::new("detect-equations", "Detecting Equations"),
        ProgressStep::new("rebuild-document", "Rebuilding Document"),
    ]
}

/// Default per-step display interval.
pub const DEFAULT_STEP_INTERVAL: Duration = Duration::from_millis(1500);

/// A running synthetic progress reporter.
///
/// The displayed index ranges over `0..=steps.len()`: an index of `n` means
/// `n` steps are shown complete, and `steps.len()` means everything is done.
/// The spawned timer task advances the index up to `steps.len() - 1` and no
/// further; only [`finish`](SyntheticProgress::finish) produces the final
/// value.
pub struct SyntheticProgress {
    steps: Vec<ProgressStep>,
    current: Arc<AtomicUsize>,
    done_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SyntheticProgress {
    /// Start the timer task. The first advance happens one `interval` after
    /// this call, not immediately.
    pub fn start(steps: Vec<ProgressStep>, interval: Duration) -> Self {
        let total = steps.len();
        let current = Arc::new(AtomicUsize::new(0));
        let (done_tx, mut done_rx) = watch::channel(false);

        let counter = Arc::clone(&current);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval completes immediately;
            // consume it so the first visible advance waits a full interval.
            ticker.tick().await;

            loop {
                tokio::select! {
                    changed = done_rx.changed() => {
                        // Sender dropped or done signalled: stop ticking.
                        let _ = changed;
                        break;
                    }
                    _ = ticker.tick() => {
                        // Advance, but never past the last step. The final
                        // index belongs to `finish` alone.
                        let _ = counter.fetch_update(
                            Ordering::SeqCst,
                            Ordering::SeqCst,
                            |c| (c + 1 < total).then_some(c + 1),
                        );
                    }
                }
            }
        });

        Self {
            steps,
            current,
            done_tx,
            task,
        }
    }

    /// The configured steps.
    pub fn steps(&self) -> &[ProgressStep] {
        &self.steps
    }

    /// Number of steps; also the final displayed index.
    pub fn total(&self) -> usize {
        self.steps.len()
    }

    /// The current displayed index, `0..=total()`.
    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    /// The label of the step currently in flight, if any.
    pub fn current_label(&self) -> Option<&str> {
        self.steps.get(self.current()).map(|s| s.label.as_str())
    }

    /// True once `finish` has moved the index to the final value.
    pub fn is_done(&self) -> bool {
        self.current() >= self.total()
    }

    /// Signal that the real work has returned: jump the index to the final
    /// value immediately, regardless of where the timer got to, and cancel
    /// the timer. Idempotent.
    pub fn finish(&self) {
        self.current.store(self.total(), Ordering::SeqCst);
        let _ = self.done_tx.send(true);
    }
}

impl Drop for SyntheticProgress {
    fn drop(&mut self) {
        // Dropping the reporter abandons its display; the timer must not
        // keep running behind it.
        self.task.abort();
    }
}
