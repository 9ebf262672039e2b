//! Progress reporting for the two pipeline phases.
//!
//! The pipeline emits `(phase, completed, total)` events; it holds no state
//! that a display layer reads directly. Inject an
//! [`Arc<dyn UnmarkProgressCallback>`] via
//! [`crate::config::UnmarkConfigBuilder::progress_callback`] to receive them.
//! Use [`ChannelProgress`] when the consumer would rather poll a queue than be
//! called back from the pipeline's worker thread.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf_unmark::{ChannelProgress, ProgressCallback, UnmarkConfig};
//! use std::sync::Arc;
//!
//! let (progress, mut events) = ChannelProgress::new();
//! let config = UnmarkConfig::builder()
//!     .progress_callback(Arc::new(progress) as ProgressCallback)
//!     .build()
//!     .unwrap();
//! // later: while let Some(ev) = events.recv().await { … ev.percent() … }
//! # drop(events);
//! ```

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// The two discrete phases of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    /// Rasterize each page and mask it immediately.
    RasterizingMasking,
    /// Fit, place and serialize the masked pages.
    Composing,
}

impl Phase {
    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Phase::RasterizingMasking => "rasterizing+masking",
            Phase::Composing => "composing",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One progress sample: `completed` of `total` pages done in `phase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub completed: usize,
    pub total: usize,
}

impl ProgressEvent {
    /// `completed / total * 100`, clamped to `[0, 100]`.
    ///
    /// An empty phase counts as finished.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.completed as f64 / self.total as f64 * 100.0).clamp(0.0, 100.0)
    }
}

/// Called by the pipeline as pages move through each phase.
///
/// All methods have no-op defaults. Events for one phase are delivered in
/// order from a single worker thread, so `completed` never decreases within a
/// phase.
pub trait UnmarkProgressCallback: Send + Sync {
    /// Called once when `phase` begins, before its first page.
    fn on_phase_start(&self, phase: Phase, total_pages: usize) {
        let _ = (phase, total_pages);
    }

    /// Called after each page of the current phase.
    fn on_progress(&self, event: ProgressEvent) {
        let _ = event;
    }

    /// Called once after the last page of `phase`.
    fn on_phase_complete(&self, phase: Phase, total_pages: usize) {
        let _ = (phase, total_pages);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl UnmarkProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::UnmarkConfig`].
pub type ProgressCallback = Arc<dyn UnmarkProgressCallback>;

/// Forwards every [`ProgressEvent`] into an unbounded tokio channel.
///
/// Phase start emits a `0/total` event and phase completion a `total/total`
/// event, so a consumer sees both ends of every phase even for empty ones.
/// Events are dropped silently once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl UnmarkProgressCallback for ChannelProgress {
    fn on_phase_start(&self, phase: Phase, total_pages: usize) {
        let _ = self.tx.send(ProgressEvent {
            phase,
            completed: 0,
            total: total_pages,
        });
    }

    fn on_progress(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }

    fn on_phase_complete(&self, phase: Phase, total_pages: usize) {
        let _ = self.tx.send(ProgressEvent {
            phase,
            completed: total_pages,
            total: total_pages,
        });
    }
}

/// Per-phase helper the pipeline drives; keeps the page counter in one place.
pub(crate) struct PhaseReporter<'a> {
    callback: Option<&'a dyn UnmarkProgressCallback>,
    phase: Phase,
    total: usize,
    completed: usize,
}

impl<'a> PhaseReporter<'a> {
    pub(crate) fn start(
        callback: Option<&'a dyn UnmarkProgressCallback>,
        phase: Phase,
        total: usize,
    ) -> Self {
        if let Some(cb) = callback {
            cb.on_phase_start(phase, total);
        }
        Self {
            callback,
            phase,
            total,
            completed: 0,
        }
    }

    pub(crate) fn completed(&self) -> usize {
        self.completed
    }

    pub(crate) fn page_done(&mut self) {
        self.completed += 1;
        if let Some(cb) = self.callback {
            cb.on_progress(ProgressEvent {
                phase: self.phase,
                completed: self.completed,
                total: self.total,
            });
        }
    }

    pub(crate) fn finish(self) {
        if let Some(cb) = self.callback {
            cb.on_phase_complete(self.phase, self.total);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<ProgressEvent>>,
        phases: Mutex<Vec<(Phase, bool)>>,
    }

    impl UnmarkProgressCallback for Recorder {
        fn on_phase_start(&self, phase: Phase, _total_pages: usize) {
            self.phases.lock().unwrap().push((phase, true));
        }

        fn on_progress(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }

        fn on_phase_complete(&self, phase: Phase, _total_pages: usize) {
            self.phases.lock().unwrap().push((phase, false));
        }
    }

    #[test]
    fn percent_is_pages_over_total() {
        let ev = ProgressEvent {
            phase: Phase::Composing,
            completed: 1,
            total: 4,
        };
        assert_eq!(ev.percent(), 25.0);
        let done = ProgressEvent { completed: 4, ..ev };
        assert_eq!(done.percent(), 100.0);
        let empty = ProgressEvent {
            completed: 0,
            total: 0,
            ..ev
        };
        assert_eq!(empty.percent(), 100.0);
    }

    #[test]
    fn phase_labels() {
        assert_eq!(Phase::RasterizingMasking.to_string(), "rasterizing+masking");
        assert_eq!(Phase::Composing.to_string(), "composing");
    }

    #[test]
    fn reporter_emits_monotonic_events() {
        let rec = Recorder::default();
        let mut reporter = PhaseReporter::start(Some(&rec as &dyn UnmarkProgressCallback), Phase::RasterizingMasking, 3);
        for _ in 0..3 {
            reporter.page_done();
        }
        assert_eq!(reporter.completed(), 3);
        reporter.finish();

        let events = rec.events.lock().unwrap();
        let percents: Vec<f64> = events.iter().map(ProgressEvent::percent).collect();
        assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
        assert_eq!(events.last().map(|e| e.completed), Some(3));
        assert_eq!(
            *rec.phases.lock().unwrap(),
            vec![
                (Phase::RasterizingMasking, true),
                (Phase::RasterizingMasking, false)
            ]
        );
    }

    #[test]
    fn reporter_without_callback_still_counts() {
        let mut reporter = PhaseReporter::start(None, Phase::Composing, 2);
        reporter.page_done();
        assert_eq!(reporter.completed(), 1);
        reporter.finish();
    }

    #[test]
    fn channel_progress_delivers_both_ends_of_a_phase() {
        let (progress, mut rx) = ChannelProgress::new();
        let cb: ProgressCallback = Arc::new(progress);

        cb.on_phase_start(Phase::Composing, 2);
        cb.on_progress(ProgressEvent {
            phase: Phase::Composing,
            completed: 1,
            total: 2,
        });
        cb.on_phase_complete(Phase::Composing, 2);
        drop(cb);

        let received = tokio_test::block_on(async {
            let mut out = Vec::new();
            while let Some(ev) = rx.recv().await {
                out.push(ev.completed);
            }
            out
        });
        assert_eq!(received, vec![0, 1, 2]);
    }

    #[test]
    fn channel_progress_ignores_dropped_receiver() {
        let (progress, rx) = ChannelProgress::new();
        drop(rx);
        progress.on_phase_start(Phase::RasterizingMasking, 1);
    }
}
