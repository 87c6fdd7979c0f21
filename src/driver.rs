//! Per-worker FSM execution.
//!
//! [`run_worker`] is one worker's private walk through the state graph:
//! invoke the current state's handler, classify any error by the severity
//! the call site attached, pick the next state by weighted random selection
//! in declared order, repeat. The walk is deterministic for a fixed
//! `(config, tid, seed)` and fixed handler RNG consumption, independent of
//! external latency, which is what makes a failing thread replayable in
//! isolation with `thread_count = 1` and that tid's derived seed.

use std::panic::{self, AssertUnwindSafe};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::Value;
use tracing::{error, trace, warn};

use crate::asserts::Asserts;
use crate::config::{Ownership, Transition, WorkloadConfig};
use crate::error::{Severity, WorkerFailure};
use crate::report::WorkerReport;
use crate::system::{ConnCache, Namespace};

/// Private execution context of one worker. Never shared between workers.
pub struct WorkerContext {
    tid: usize,
    /// Deterministic per-worker RNG. Handlers draw from this for their own
    /// randomized decisions; the driver draws from it for transitions.
    pub rng: ChaCha8Rng,
    /// Private deep copy of the workload's seed data, mutable across this
    /// worker's iterations.
    pub data: Value,
    /// Tolerance-classifying assertion helpers bound to the workload's
    /// declared ownership.
    pub checks: Asserts,
    state: String,
    iteration: u64,
}

impl WorkerContext {
    fn new(tid: usize, seed: u64, data: Value, ownership: Ownership, start_state: &str) -> Self {
        Self {
            tid,
            rng: ChaCha8Rng::seed_from_u64(seed),
            data,
            checks: Asserts::new(ownership),
            state: start_state.to_string(),
            iteration: 0,
        }
    }

    /// Worker identifier, unique in `0..thread_count` for the run. Embed it
    /// in external resource names to avoid unintended collisions.
    #[must_use]
    pub const fn tid(&self) -> usize {
        self.tid
    }

    /// State currently executing.
    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Iteration index of the current handler call.
    #[must_use]
    pub const fn iteration(&self) -> u64 {
        self.iteration
    }
}

/// Executes one worker's walk through the state graph, blocking until the
/// worker finishes its iterations, reaches a terminal state, or hard-fails.
///
/// Public so a failing worker from a full run can be replayed alone: pass
/// the same config, the failing tid, and that tid's derived seed (recorded
/// in its [`WorkerReport`]).
pub fn run_worker<H>(
    config: &WorkloadConfig<H>,
    tid: usize,
    seed: u64,
    conn: &H,
    namespace: &Namespace,
    conn_cache: Option<&ConnCache<H>>,
) -> WorkerReport {
    let mut ctx = WorkerContext::new(
        tid,
        seed,
        config.data().clone(),
        config.ownership(),
        config.start_state(),
    );
    let mut report = WorkerReport::new(tid, seed);
    let mut state = config.start_state().to_string();

    for iteration in 0..config.iterations() {
        ctx.state.clone_from(&state);
        ctx.iteration = iteration;

        // Validation makes this unreachable for built configs; replayed or
        // hand-assembled walks still get a clean failure instead of a panic.
        let Some(handler) = config.state(&state) else {
            report.hard_error = Some(WorkerFailure {
                tid,
                state,
                iteration,
                severity: Severity::Hard,
                message: "no handler defined for state".to_string(),
            });
            return report;
        };

        trace!(tid, iteration, %state, "entering state");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            handler(&mut ctx, conn, namespace, conn_cache)
        }));

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let failure = WorkerFailure::attribute(tid, &state, iteration, &err);
                match err.severity {
                    Severity::Hard => {
                        error!(tid, iteration, %state, message = %err.message, "hard failure");
                        report.hard_error = Some(failure);
                        return report;
                    }
                    Severity::Soft => {
                        warn!(tid, iteration, %state, message = %err.message, "soft failure");
                        report.soft_errors.push(failure);
                    }
                }
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(tid, iteration, %state, %message, "handler panicked");
                report.hard_error = Some(WorkerFailure {
                    tid,
                    state,
                    iteration,
                    severity: Severity::Hard,
                    message: format!("handler panicked: {message}"),
                });
                return report;
            }
        }

        report.iterations_completed = iteration + 1;

        // A state with no outgoing edges is terminal for this worker.
        let Some(edges) = config.transitions(&state) else {
            break;
        };
        let roll = ctx.rng.gen::<f64>();
        let Some(next) = Transition::choose(edges, roll) else {
            break;
        };
        state.clone_from(&next.target);
    }

    report
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload.downcast_ref::<&str>().map_or_else(
        || {
            payload
                .downcast_ref::<String>()
                .cloned()
                .unwrap_or_else(|| "unknown panic payload".to_string())
        },
        |s| (*s).to_string(),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::error::StateError;

    fn namespace() -> Namespace {
        Namespace::new("testdb", "driver")
    }

    #[test]
    fn test_fixed_iteration_count() {
        let calls = Arc::new(AtomicU64::new(0));
        let calls_in = Arc::clone(&calls);
        let config = WorkloadConfig::<()>::builder()
            .iterations(3)
            .state("init", move |_, _, _, _| {
                calls_in.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .transition("init", "init", 1.0)
            .build()
            .unwrap();

        let report = run_worker(&config, 0, 42, &(), &namespace(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.iterations_completed, 3);
        assert!(!report.failed());
    }

    #[test]
    fn test_terminal_state_stops_early() {
        let calls = Arc::new(AtomicU64::new(0));
        let calls_in = Arc::clone(&calls);
        // "done" has no outgoing edges, so the walk ends after entering it.
        let config = WorkloadConfig::<()>::builder()
            .iterations(100)
            .state("init", |_, _, _, _| Ok(()))
            .state("done", move |_, _, _, _| {
                calls_in.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .transition("init", "done", 1.0)
            .build()
            .unwrap();

        let report = run_worker(&config, 0, 42, &(), &namespace(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.iterations_completed, 2);
    }

    #[test]
    fn test_hard_error_stops_and_attributes() {
        let config = WorkloadConfig::<()>::builder()
            .iterations(10)
            .state("init", |ctx, _, _, _| {
                if ctx.iteration() == 2 {
                    Err(StateError::hard("invariant broken"))
                } else {
                    Ok(())
                }
            })
            .transition("init", "init", 1.0)
            .build()
            .unwrap();

        let report = run_worker(&config, 5, 42, &(), &namespace(), None);
        let failure = report.hard_error.as_ref().unwrap();
        assert_eq!(failure.tid, 5);
        assert_eq!(failure.state, "init");
        assert_eq!(failure.iteration, 2);
        assert_eq!(report.iterations_completed, 2);
    }

    #[test]
    fn test_soft_errors_are_recorded_and_tolerated() {
        let config = WorkloadConfig::<()>::builder()
            .iterations(4)
            .state("init", |_, _, _, _| Err(StateError::soft("drift")))
            .transition("init", "init", 1.0)
            .build()
            .unwrap();

        let report = run_worker(&config, 0, 42, &(), &namespace(), None);
        assert!(!report.failed());
        assert_eq!(report.soft_errors.len(), 4);
        assert_eq!(report.iterations_completed, 4);
    }

    #[test]
    fn test_panicking_handler_is_contained() {
        let config = WorkloadConfig::<()>::builder()
            .iterations(3)
            .state("init", |_, _, _, _| panic!("handler bug"))
            .transition("init", "init", 1.0)
            .build()
            .unwrap();

        let report = run_worker(&config, 0, 42, &(), &namespace(), None);
        let failure = report.hard_error.as_ref().unwrap();
        assert!(failure.message.contains("handler bug"));
        assert_eq!(report.iterations_completed, 0);
    }

    #[test]
    fn test_worker_data_is_private_copy() {
        let config = WorkloadConfig::<()>::builder()
            .iterations(2)
            .data(json!({"n": 0}))
            .state("init", |ctx, _, _, _| {
                let n = ctx.data["n"].as_u64().unwrap_or(0);
                ctx.data["n"] = json!(n + 1);
                Ok(())
            })
            .transition("init", "init", 1.0)
            .build()
            .unwrap();

        run_worker(&config, 0, 1, &(), &namespace(), None);
        run_worker(&config, 1, 2, &(), &namespace(), None);
        // Mutations in workers never reach the config's seed payload.
        assert_eq!(config.data()["n"], 0);
    }

    #[test]
    fn test_same_seed_same_walk() {
        let walk = |seed: u64| -> Vec<String> {
            let visited = Arc::new(parking_lot::Mutex::new(Vec::new()));
            let record = |visited: &Arc<parking_lot::Mutex<Vec<String>>>| {
                let visited = Arc::clone(visited);
                move |ctx: &mut WorkerContext,
                      _: &(),
                      _: &Namespace,
                      _: Option<&ConnCache<()>>|
                      -> Result<(), StateError> {
                    visited.lock().push(ctx.state().to_string());
                    Ok(())
                }
            };
            let config = WorkloadConfig::<()>::builder()
                .iterations(64)
                .state("a", record(&visited))
                .state("b", record(&visited))
                .state("c", record(&visited))
                .start_state("a")
                .transition("a", "b", 0.5)
                .transition("a", "c", 0.5)
                .transition("b", "a", 0.3)
                .transition("b", "c", 0.7)
                .transition("c", "a", 1.0)
                .build()
                .unwrap();
            run_worker(&config, 0, seed, &(), &namespace(), None);
            let guard = visited.lock();
            guard.clone()
        };

        assert_eq!(walk(1234), walk(1234));
        assert_ne!(walk(1234), walk(4321));
    }
}
