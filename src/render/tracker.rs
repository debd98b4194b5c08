//! Render state tracking.

use log::debug;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Where a render currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RenderState {
    /// Not started.
    Idle,
    /// Checking render parameters.
    Validating,
    /// Applying the stage at this stack index.
    Applying(usize),
    /// Resizing and encoding the final raster.
    Encoding,
    /// Finished successfully.
    Done,
    /// Aborted; no output was produced.
    Failed,
}

impl RenderState {
    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RenderState::Done | RenderState::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(&self, next: RenderState) -> bool {
        use RenderState::*;
        match (*self, next) {
            (Done, _) | (Failed, _) => false,
            (_, Failed) => true,
            (Idle, Validating) => true,
            (Validating, Applying(0)) | (Validating, Encoding) => true,
            (Applying(i), Applying(j)) => j == i + 1,
            (Applying(_), Encoding) => true,
            (Encoding, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderState::Idle => write!(f, "idle"),
            RenderState::Validating => write!(f, "validating"),
            RenderState::Applying(i) => write!(f, "applying({})", i),
            RenderState::Encoding => write!(f, "encoding"),
            RenderState::Done => write!(f, "done"),
            RenderState::Failed => write!(f, "failed"),
        }
    }
}

/// Callback type for state updates.
pub type RenderCallback = Box<dyn Fn(RenderState) + Send + Sync>;

/// Timing and counts of a finished render.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderStats {
    /// Stages applied.
    pub stages_applied: usize,
    /// Stages whose options left the raster unchanged.
    pub noop_stages: usize,
    /// Time spent applying stages.
    pub apply_ms: u64,
    /// Time spent resizing and encoding.
    pub encode_ms: u64,
    /// Wall-clock time of the whole render.
    pub total_ms: u64,
    /// Dimensions of the delivered raster.
    pub output_dimensions: (u32, u32),
}

/// Tracks the state machine of one render.
///
/// Shared between the async driver and the blocking apply task.
pub struct RenderTracker {
    state: Mutex<RenderState>,
    history: Mutex<Vec<RenderState>>,
    start_time: Instant,
    callback: Option<Arc<RenderCallback>>,
}

impl RenderTracker {
    /// Create a tracker in the `Idle` state.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RenderState::Idle),
            history: Mutex::new(vec![RenderState::Idle]),
            start_time: Instant::now(),
            callback: None,
        }
    }

    /// Create a tracker wrapped in Arc for sharing.
    pub fn new_shared(callback: Option<Arc<RenderCallback>>) -> Arc<Self> {
        let mut tracker = Self::new();
        tracker.callback = callback;
        Arc::new(tracker)
    }

    /// Move to `next`. Illegal transitions are ignored and return `false`.
    pub fn advance(&self, next: RenderState) -> bool {
        let mut state = self.state.lock();
        if !state.can_advance_to(next) {
            debug!("Ignoring render transition {} -> {}", *state, next);
            return false;
        }
        debug!("Render {} -> {}", *state, next);
        *state = next;
        drop(state);

        self.history.lock().push(next);
        if let Some(callback) = &self.callback {
            callback(next);
        }
        true
    }

    /// Move to `Failed` unless already terminal.
    pub fn fail(&self) {
        self.advance(RenderState::Failed);
    }

    /// Current state.
    pub fn state(&self) -> RenderState {
        *self.state.lock()
    }

    /// Every state visited so far, starting with `Idle`.
    pub fn history(&self) -> Vec<RenderState> {
        self.history.lock().clone()
    }

    /// Milliseconds since the tracker was created.
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }
}

impl Default for RenderTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_happy_path() {
        let tracker = RenderTracker::new();
        assert!(tracker.advance(RenderState::Validating));
        assert!(tracker.advance(RenderState::Applying(0)));
        assert!(tracker.advance(RenderState::Applying(1)));
        assert!(tracker.advance(RenderState::Encoding));
        assert!(tracker.advance(RenderState::Done));

        assert_eq!(tracker.history().len(), 6);
        assert!(tracker.state().is_terminal());
    }

    #[test]
    fn test_illegal_transitions_are_ignored() {
        let tracker = RenderTracker::new();
        assert!(!tracker.advance(RenderState::Encoding));
        assert!(tracker.advance(RenderState::Validating));
        assert!(!tracker.advance(RenderState::Applying(2)));

        tracker.fail();
        assert_eq!(tracker.state(), RenderState::Failed);
        assert!(!tracker.advance(RenderState::Done));
    }

    #[test]
    fn test_callback_sees_each_transition() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let tracker = RenderTracker::new_shared(Some(Arc::new(Box::new(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        }))));

        tracker.advance(RenderState::Validating);
        tracker.advance(RenderState::Encoding);
        tracker.advance(RenderState::Done);
        assert_eq!(seen.load(Ordering::Relaxed), 3);
    }
}
