//! Cooperative cancellation plumbing for the solver's inner loops.
//!
//! Grounded on `common.hpp`'s `Work_State` enum and the teacher's
//! `keep_working`-style flags threaded through `optimize.rs`/the FFI
//! boundary. Two levels are modeled, matching SPEC_FULL §5's
//! "Cancellation & timeout": a per-block `keep_working` flag set by
//! `stop()`, and a thread-local `WorkState` set by a worker-pool shutdown.

use std::sync::atomic::{AtomicBool, Ordering};

/// Mirrors `common.hpp::Work_State`: the worker-pool-wide exit policy a
/// shutting-down pool communicates to in-flight solves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkState {
    KeepWorking,
    AbortComputation,
}

impl WorkState {
    #[inline]
    pub fn should_stop(self) -> bool {
        matches!(self, WorkState::AbortComputation)
    }
}

/// Per-block cooperative-cancellation flag, flipped by `BlockDecoder::stop`.
#[derive(Debug)]
pub struct KeepWorking(AtomicBool);

impl KeepWorking {
    pub fn new() -> Self {
        KeepWorking(AtomicBool::new(true))
    }

    #[inline]
    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        !self.0.load(Ordering::SeqCst)
    }

    /// Reset after `clear_data()` revives a block for a new round of input.
    pub fn reset(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl Default for KeepWorking {
    fn default() -> Self {
        Self::new()
    }
}

/// Combined check the solver polls between loop iterations and at each
/// phase boundary, mirroring `Precode_Matrix_Solver.hpp`'s `stop()` helper.
#[inline]
pub fn stop(keep_working: &KeepWorking, thread_state: Option<WorkState>) -> bool {
    keep_working.is_stopped() || thread_state.map(WorkState::should_stop).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_flag_is_sticky() {
        let kw = KeepWorking::new();
        assert!(!kw.is_stopped());
        kw.stop();
        assert!(kw.is_stopped());
        kw.reset();
        assert!(!kw.is_stopped());
    }

    #[test]
    fn stop_checks_both_levels() {
        let kw = KeepWorking::new();
        assert!(!stop(&kw, Some(WorkState::KeepWorking)));
        assert!(stop(&kw, Some(WorkState::AbortComputation)));
        kw.stop();
        assert!(stop(&kw, None));
    }
}
