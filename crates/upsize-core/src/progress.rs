//! Advisory progress reporting for UI shells.
//!
//! The orchestrator emits two kinds of events: the computed plan (once,
//! before any remote work) and per-pass completion. Observers carry no
//! control-flow significance: a panicking or slow observer is the
//! embedder's problem, and the default observer does nothing.

use crate::types::UpscalePlan;

/// Receives advisory progress events from the orchestrator.
pub trait ProgressObserver {
    /// The plan was computed; no remote work has started yet.
    fn plan_ready(&self, _plan: &UpscalePlan) {}

    /// Pass `pass` of `total` finished successfully.
    fn pass_completed(&self, _pass: u32, _total: u32) {}
}

/// The default observer: ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {}
