//! Scrimmage: probabilistic FSM concurrency-workload engine.
//!
//! Each workload declares an immutable [`WorkloadConfig`]: named states,
//! weighted transitions, per-worker seed data, setup/teardown hooks. The
//! engine spawns many independent worker threads that each walk a
//! randomized path through the state graph while issuing real operations
//! against a live, shared external system, deliberately provoking the
//! interleavings that expose correctness bugs under contention.
//!
//! The system under test stays non-deterministic; that is the point. The
//! engine's own scheduling is deterministic: for a fixed global seed, each
//! worker's state sequence is fully determined by its tid, so a failing
//! worker can be replayed alone with [`run_worker`] and its derived seed.
//!
//! # Example
//!
//! ```ignore
//! use scrimmage::{controller, Namespace, RunOptions, SimCluster, WorkloadConfig};
//!
//! let workload = WorkloadConfig::builder()
//!     .thread_count(8)
//!     .iterations(200)
//!     .state("init", |ctx, conn, ns, _| { /* seed documents */ Ok(()) })
//!     .state("read", |ctx, conn, ns, _| { /* assert on counts */ Ok(()) })
//!     .transition("init", "read", 1.0)
//!     .transition("read", "read", 1.0)
//!     .build()?;
//!
//! let cluster = SimCluster::new(&["alpha", "beta"]);
//! let namespace = Namespace::new("testdb", "accounts");
//! let report = controller::run(
//!     &workload,
//!     &cluster,
//!     &namespace,
//!     &cluster,
//!     &RunOptions::with_seed(42),
//! );
//! assert!(report.passed());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod asserts;
mod compose;
mod config;
mod driver;
mod error;
mod fixture;
mod report;
mod rng;
mod sim;
mod system;

pub mod controller;
pub mod profiles;

pub use asserts::Asserts;
pub use compose::Compose;
pub use config::{
    HookFn, Ownership, StateFn, Transition, WorkloadBuilder, WorkloadConfig, WEIGHT_SUM_TOLERANCE,
};
pub use driver::{run_worker, WorkerContext};
pub use error::{
    ConfigError, HookError, Severity, StateError, SystemError, WorkerFailure,
};
pub use fixture::{ClusterFixture, UnmanagedCluster};
pub use report::{RunReport, Verdict, WorkerReport};
pub use rng::derive_seed;
pub use sim::{SimCluster, SimConn};
pub use system::{ConnCache, Namespace, SystemClient};

// Re-export run options next to the controller entry point.
pub use profiles::{RunOptions, RunProfile};
