//! Error taxonomy for the workload engine.
//!
//! Errors fall into distinct tiers with distinct fates:
//!
//! - [`ConfigError`]: detected at build/compose time, before any run starts.
//! - [`StateError`]: raised by a state handler; its [`Severity`] decides
//!   whether the reporting worker stops.
//! - [`HookError`]: setup/teardown failures, fatal to the run's verdict.
//! - [`SystemError`]: connection and fixture failures from the system
//!   contracts.
//! - [`WorkerFailure`]: a [`StateError`] attributed with enough context to
//!   replay the failing worker in isolation.

use std::fmt;

use thiserror::Error;

/// Classification of a state-handler failure.
///
/// The classification is decided at the assertion call site (see
/// [`crate::asserts::Asserts`]), never by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// An invariant that must hold under every interleaving was violated.
    /// Stops the reporting worker and fails the run.
    Hard,
    /// An expected discrepancy caused by legitimate concurrent interference.
    /// Recorded, does not fail the run.
    Soft,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hard => write!(f, "hard"),
            Self::Soft => write!(f, "soft"),
        }
    }
}

/// Configuration error detected before any run starts.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// The workload defines no states at all.
    #[error("workload defines no states")]
    NoStates,

    /// `thread_count` is zero.
    #[error("thread_count must be at least 1")]
    NoThreads,

    /// `iterations` is zero.
    #[error("iterations must be at least 1")]
    NoIterations,

    /// The start state is not a defined state.
    #[error("start state `{0}` is not a defined state")]
    UnknownStartState(String),

    /// A transition origin is not a defined state.
    #[error("transition origin `{0}` is not a defined state")]
    UnknownOrigin(String),

    /// A transition target is not a defined state.
    #[error("transition `{origin}` -> `{target}` references an undefined state")]
    UnknownTarget {
        /// Origin state of the offending edge.
        origin: String,
        /// Undefined target state.
        target: String,
    },

    /// A transition weight is non-positive or non-finite.
    #[error("transition `{origin}` -> `{target}` has invalid weight {weight}")]
    InvalidWeight {
        /// Origin state of the offending edge.
        origin: String,
        /// Target state of the offending edge.
        target: String,
        /// The rejected weight.
        weight: f64,
    },

    /// Outgoing weights for a state do not sum to 1.
    #[error("outgoing weights for `{origin}` sum to {sum}, expected 1")]
    WeightSum {
        /// Origin state whose weights drifted.
        origin: String,
        /// Actual sum of the declared weights.
        sum: f64,
    },

    /// A composition override references a state absent from both the parent
    /// and the override set.
    #[error("override references unknown state `{0}`")]
    UnknownOverride(String),

    /// `merge_data` was given a non-object value to merge into an object
    /// (or vice versa).
    #[error("data merge requires JSON objects on both sides")]
    DataMerge,
}

/// Error raised by a state handler, tagged with its severity at the call
/// site.
#[derive(Debug, Clone, Error)]
#[error("[{severity}] {message}")]
pub struct StateError {
    /// Hard or soft.
    pub severity: Severity,
    /// What went wrong.
    pub message: String,
}

impl StateError {
    /// Creates a hard (invariant-violation) error.
    pub fn hard(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Hard,
            message: message.into(),
        }
    }

    /// Creates a soft (tolerated-discrepancy) error.
    pub fn soft(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Soft,
            message: message.into(),
        }
    }
}

impl From<SystemError> for StateError {
    /// A system error surfacing in a handler is hard unless the handler
    /// downgrades it explicitly.
    fn from(err: SystemError) -> Self {
        Self::hard(err.to_string())
    }
}

/// Error from a setup or teardown hook. Always fatal to the run's verdict.
#[derive(Debug, Clone, Error)]
pub enum HookError {
    /// The hook itself failed.
    #[error("{0}")]
    Failed(String),

    /// The hook's system interaction failed.
    #[error(transparent)]
    System(#[from] SystemError),
}

impl HookError {
    /// Creates a hook failure from a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Error from the system-client or cluster-fixture contracts.
#[derive(Debug, Clone, Error)]
pub enum SystemError {
    /// No connection could be established for the requested role.
    #[error("no reachable node for role `{role}`")]
    NoConnection {
        /// The role that could not be reached.
        role: String,
    },

    /// The targeted node is currently down.
    #[error("node `{node}` is down")]
    NodeDown {
        /// The unreachable node.
        node: String,
    },

    /// The named node does not exist in the cluster.
    #[error("unknown node `{node}`")]
    UnknownNode {
        /// The unrecognized node name.
        node: String,
    },

    /// The fixture does not manage node lifecycle (e.g. an externally
    /// provisioned cluster).
    #[error("cluster fixture does not manage node lifecycle")]
    Unmanaged,

    /// Any other system-level failure.
    #[error("{0}")]
    Other(String),
}

/// A state-handler failure attributed with everything needed to replay the
/// failing worker in isolation.
#[derive(Debug, Clone, Error)]
#[error("worker {tid} in state `{state}` at iteration {iteration} ({severity}): {message}")]
pub struct WorkerFailure {
    /// Worker identifier within the run.
    pub tid: usize,
    /// State the worker was executing.
    pub state: String,
    /// Iteration index at the time of failure.
    pub iteration: u64,
    /// Hard or soft.
    pub severity: Severity,
    /// The originating message.
    pub message: String,
}

impl WorkerFailure {
    /// Attributes a [`StateError`] to a specific worker position.
    #[must_use]
    pub fn attribute(tid: usize, state: &str, iteration: u64, err: &StateError) -> Self {
        Self {
            tid,
            state: state.to_string(),
            iteration,
            severity: err.severity,
            message: err.message.clone(),
        }
    }
}
