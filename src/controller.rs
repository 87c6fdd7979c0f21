//! Run orchestration: setup, parallel workers, unconditional join, teardown.
//!
//! The controller guarantees exactly two ordering points: `setup` fully
//! completes before any worker's first handler call, and every worker has
//! fully completed (successfully or not) before `teardown` runs. Between
//! workers no ordering exists; that absence is the property under test.

use std::thread;
use std::time::Instant;

use tracing::{debug, error, info};

use crate::config::WorkloadConfig;
use crate::driver::run_worker;
use crate::error::HookError;
use crate::fixture::ClusterFixture;
use crate::profiles::RunOptions;
use crate::report::{RunReport, Verdict, WorkerReport};
use crate::rng::derive_seed;
use crate::system::{ConnCache, Namespace, SystemClient};

/// Executes a full workload run and returns the aggregated report.
///
/// 1. Applies the options' multipliers to the config.
/// 2. Runs `setup` once on a controller-owned connection. A setup failure
///    aborts immediately: no workers are spawned and teardown is skipped
///    (setup never ran to completion, so there is nothing to tear down).
/// 3. Spawns one native thread per worker. Each opens its own connection;
///    a failed connect is that worker's hard failure, not the run's abort.
/// 4. Joins every worker unconditionally: one worker's hard failure never
///    cancels siblings. A thread that dies abnormally is itself recorded as
///    a hard failure.
/// 5. Runs `teardown` exactly once after the join, regardless of worker
///    outcomes; its error is recorded alongside any worker errors.
#[allow(clippy::cast_possible_truncation)] // elapsed millis won't overflow u64.
pub fn run<C>(
    config: &WorkloadConfig<C::Conn>,
    client: &C,
    namespace: &Namespace,
    fixture: &dyn ClusterFixture,
    options: &RunOptions,
) -> RunReport
where
    C: SystemClient + Sync,
{
    let start = Instant::now();
    let config = config.apply(options);
    let mut report = RunReport::new(options.seed);

    info!(
        threads = config.thread_count(),
        iterations = config.iterations(),
        seed = options.seed,
        %namespace,
        "workload run starting"
    );

    if let Some(setup) = config.setup() {
        let outcome = client
            .connect()
            .map_err(HookError::from)
            .and_then(|conn| setup(&conn, namespace, fixture));
        if let Err(err) = outcome {
            error!(%err, "setup failed, aborting run");
            report.setup_error = Some(err);
            report.elapsed = start.elapsed();
            return report;
        }
    }

    let config_ref = &config;
    report.workers = thread::scope(|scope| {
        let handles: Vec<_> = (0..config_ref.thread_count())
            .map(|tid| {
                let seed = derive_seed(options.seed, tid);
                debug!(tid, seed, "spawning worker");
                scope.spawn(move || -> WorkerReport {
                    let conn = match client.connect() {
                        Ok(conn) => conn,
                        Err(err) => {
                            return WorkerReport::aborted(
                                tid,
                                seed,
                                config_ref.start_state(),
                                format!("failed to connect: {err}"),
                            );
                        }
                    };
                    let conn_cache = if config_ref.needs_conn_cache() {
                        match ConnCache::build(client) {
                            Ok(cache) => Some(cache),
                            Err(err) => {
                                return WorkerReport::aborted(
                                    tid,
                                    seed,
                                    config_ref.start_state(),
                                    format!("failed to build connection cache: {err}"),
                                );
                            }
                        }
                    } else {
                        None
                    };
                    let worker =
                        run_worker(config_ref, tid, seed, &conn, namespace, conn_cache.as_ref());
                    debug!(
                        tid,
                        iterations = worker.iterations_completed,
                        failed = worker.failed(),
                        "worker finished"
                    );
                    worker
                })
            })
            .collect();

        handles
            .into_iter()
            .enumerate()
            .map(|(tid, handle)| {
                handle.join().unwrap_or_else(|_| {
                    WorkerReport::aborted(
                        tid,
                        derive_seed(options.seed, tid),
                        config_ref.start_state(),
                        "worker thread died abnormally".to_string(),
                    )
                })
            })
            .collect()
    });

    if let Some(teardown) = config.teardown() {
        let outcome = client
            .connect()
            .map_err(HookError::from)
            .and_then(|conn| teardown(&conn, namespace, fixture));
        if let Err(err) = outcome {
            error!(%err, "teardown failed");
            report.teardown_error = Some(err);
        }
    }

    report.elapsed = start.elapsed();
    match report.verdict() {
        Verdict::Pass => info!(
            soft_errors = report.soft_error_count(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "workload run passed"
        ),
        Verdict::Fail => error!(
            hard_failures = report.hard_failures().count(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "workload run failed"
        ),
    }
    report
}
