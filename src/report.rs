//! Run reports: the terminal artifact of a controller invocation.
//!
//! Nothing is silently dropped: the report aggregates the setup outcome,
//! every worker's hard and soft failures, and the teardown outcome. Each
//! hard failure carries the attribution (`tid`, `state`, `iteration`,
//! derived seed) needed to replay that worker alone.

use std::time::Duration;

use crate::error::{HookError, WorkerFailure};

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No setup, hard, or teardown errors. Soft errors may be present.
    Pass,
    /// At least one setup, hard, or teardown error.
    Fail,
}

/// Outcome of a single worker's walk.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    /// Worker identifier within the run.
    pub tid: usize,
    /// The derived seed this worker ran with; replaying `run_worker` with
    /// this seed reproduces the identical state sequence.
    pub seed: u64,
    /// Iterations that ran to completion (a hard failure at iteration `i`
    /// leaves this at `i`).
    pub iterations_completed: u64,
    /// The failure that stopped this worker, if any.
    pub hard_error: Option<WorkerFailure>,
    /// Tolerated discrepancies recorded along the way.
    pub soft_errors: Vec<WorkerFailure>,
}

impl WorkerReport {
    /// Creates an empty report for a worker about to run.
    #[must_use]
    pub(crate) const fn new(tid: usize, seed: u64) -> Self {
        Self {
            tid,
            seed,
            iterations_completed: 0,
            hard_error: None,
            soft_errors: Vec::new(),
        }
    }

    /// Creates a report for a worker that failed before (or outside) its
    /// FSM loop: a failed connect, or an abnormally dead thread.
    pub(crate) fn aborted(tid: usize, seed: u64, state: &str, message: String) -> Self {
        Self {
            tid,
            seed,
            iterations_completed: 0,
            hard_error: Some(WorkerFailure {
                tid,
                state: state.to_string(),
                iteration: 0,
                severity: crate::error::Severity::Hard,
                message,
            }),
            soft_errors: Vec::new(),
        }
    }

    /// Whether this worker hard-failed.
    #[must_use]
    pub const fn failed(&self) -> bool {
        self.hard_error.is_some()
    }
}

/// The aggregated outcome of one controller invocation.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Global seed the run used, the reproduction handle.
    pub seed: u64,
    /// Setup failure, if the run aborted before spawning workers.
    pub setup_error: Option<HookError>,
    /// Per-worker outcomes, in tid order. Empty if setup failed.
    pub workers: Vec<WorkerReport>,
    /// Teardown failure, recorded alongside (never instead of) worker
    /// errors.
    pub teardown_error: Option<HookError>,
    /// Wall-clock time for the whole run.
    pub elapsed: Duration,
}

impl RunReport {
    /// Creates an empty report for a run about to start.
    #[must_use]
    pub(crate) const fn new(seed: u64) -> Self {
        Self {
            seed,
            setup_error: None,
            workers: Vec::new(),
            teardown_error: None,
            elapsed: Duration::ZERO,
        }
    }

    /// The run's verdict. Soft errors are informational only.
    #[must_use]
    pub fn verdict(&self) -> Verdict {
        let any_hard = self.workers.iter().any(WorkerReport::failed);
        if self.setup_error.is_some() || any_hard || self.teardown_error.is_some() {
            Verdict::Fail
        } else {
            Verdict::Pass
        }
    }

    /// Whether the run passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.verdict() == Verdict::Pass
    }

    /// Iterates every hard failure across all workers.
    pub fn hard_failures(&self) -> impl Iterator<Item = &WorkerFailure> {
        self.workers.iter().filter_map(|w| w.hard_error.as_ref())
    }

    /// Total soft errors across all workers.
    #[must_use]
    pub fn soft_error_count(&self) -> usize {
        self.workers.iter().map(|w| w.soft_errors.len()).sum()
    }

    /// Prints a human-readable summary.
    #[allow(clippy::cast_possible_truncation)] // millis won't overflow u64 for test runs.
    pub fn print_summary(&self) {
        println!("=== Workload Run ===");
        println!(
            "Verdict: {} (seed {}, {} workers, {}ms)",
            match self.verdict() {
                Verdict::Pass => "PASS",
                Verdict::Fail => "FAIL",
            },
            self.seed,
            self.workers.len(),
            self.elapsed.as_millis() as u64
        );
        if let Some(err) = &self.setup_error {
            println!("Setup failed: {err}");
        }
        for worker in &self.workers {
            if let Some(failure) = &worker.hard_error {
                println!(
                    "  worker {} HARD at state `{}` iteration {} (replay seed {}): {}",
                    failure.tid, failure.state, failure.iteration, worker.seed, failure.message
                );
            }
        }
        let soft = self.soft_error_count();
        if soft > 0 {
            println!("Soft errors: {soft} (informational)");
        }
        if let Some(err) = &self.teardown_error {
            println!("Teardown failed: {err}");
        }
    }
}
