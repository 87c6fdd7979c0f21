//! Workload configuration: the declarative value every workload exports.
//!
//! A [`WorkloadConfig`] is built once (directly through [`WorkloadBuilder`],
//! or derived via [`crate::compose::Compose`]) before a run starts and is
//! treated as immutable for the run's duration. Validation is part of
//! construction: a config that builds is a config that can run.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::driver::WorkerContext;
use crate::error::{ConfigError, HookError, StateError};
use crate::fixture::ClusterFixture;
use crate::profiles::RunOptions;
use crate::system::{ConnCache, Namespace};

/// Maximum drift the declared weights of one origin state may show from 1.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// A state handler: one synchronous interaction with the external system.
///
/// Receives the worker's private context, the worker's own connection, the
/// target namespace, and (for topology-aware workloads) the role-addressed
/// connection cache.
pub type StateFn<H> = Arc<
    dyn Fn(&mut WorkerContext, &H, &Namespace, Option<&ConnCache<H>>) -> Result<(), StateError>
        + Send
        + Sync,
>;

/// A setup or teardown hook, run once per lifecycle point on the
/// controller's own connection.
pub type HookFn<H> =
    Arc<dyn Fn(&H, &Namespace, &dyn ClusterFixture) -> Result<(), HookError> + Send + Sync>;

/// Whether the workload owns its target namespace exclusively.
///
/// Feeds the tolerance classifier: `when_exclusive` checks are hard under
/// [`Ownership::Exclusive`] and soft under [`Ownership::Shared`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ownership {
    /// No other workload or induced fault touches this namespace.
    Exclusive,
    /// Concurrent interference on the namespace is expected.
    #[default]
    Shared,
}

/// One weighted outgoing edge of the state graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Target state name.
    pub target: String,
    /// Selection weight; per-origin weights sum to 1.
    pub weight: f64,
}

impl Transition {
    /// Creates a weighted edge.
    pub fn new(target: impl Into<String>, weight: f64) -> Self {
        Self {
            target: target.into(),
            weight,
        }
    }

    /// Selects an edge for a roll in `[0, 1)` by walking the declared order
    /// and accumulating weight; the first edge whose cumulative weight
    /// reaches the roll wins. If floating-point drift leaves no edge
    /// reaching the roll, the last declared edge absorbs the remainder.
    ///
    /// Returns `None` only for an empty edge list (a terminal state).
    #[must_use]
    pub fn choose(edges: &[Self], roll: f64) -> Option<&Self> {
        let mut cumulative = 0.0;
        for edge in edges {
            cumulative += edge.weight;
            if cumulative >= roll {
                return Some(edge);
            }
        }
        edges.last()
    }
}

/// The immutable value one workload declares: states, weighted transitions,
/// per-thread seed data, and lifecycle hooks.
///
/// Generic over the connection handle type `H` so handlers stay fully typed
/// against their system's client API.
pub struct WorkloadConfig<H> {
    thread_count: usize,
    iterations: u64,
    start_state: String,
    states: BTreeMap<String, StateFn<H>>,
    transitions: BTreeMap<String, Vec<Transition>>,
    data: Value,
    setup: Option<HookFn<H>>,
    teardown: Option<HookFn<H>>,
    ownership: Ownership,
    needs_conn_cache: bool,
}

impl<H> WorkloadConfig<H> {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> WorkloadBuilder<H> {
        WorkloadBuilder::new()
    }

    /// Number of independent concurrent workers.
    #[must_use]
    pub const fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// State-transition steps each worker performs.
    #[must_use]
    pub const fn iterations(&self) -> u64 {
        self.iterations
    }

    /// State every worker begins in.
    #[must_use]
    pub fn start_state(&self) -> &str {
        &self.start_state
    }

    /// The handler for a state, if defined.
    #[must_use]
    pub fn state(&self, name: &str) -> Option<&StateFn<H>> {
        self.states.get(name)
    }

    /// Defined state names, sorted.
    pub fn state_names(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }

    /// The outgoing edges of a state in declared order, if any. A state with
    /// no entry (or an empty entry) is terminal.
    #[must_use]
    pub fn transitions(&self, origin: &str) -> Option<&[Transition]> {
        self.transitions.get(origin).map(Vec::as_slice)
    }

    /// The seed payload deep-copied into each worker's context.
    #[must_use]
    pub const fn data(&self) -> &Value {
        &self.data
    }

    /// The setup hook, if declared.
    #[must_use]
    pub const fn setup(&self) -> Option<&HookFn<H>> {
        self.setup.as_ref()
    }

    /// The teardown hook, if declared.
    #[must_use]
    pub const fn teardown(&self) -> Option<&HookFn<H>> {
        self.teardown.as_ref()
    }

    /// Declared namespace ownership.
    #[must_use]
    pub const fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Whether workers should build a role-addressed connection cache.
    #[must_use]
    pub const fn needs_conn_cache(&self) -> bool {
        self.needs_conn_cache
    }

    /// Returns a copy with the run options' multipliers applied to
    /// `thread_count` and `iterations`, each clamped to at least 1.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    #[allow(clippy::cast_possible_truncation)] // clamped below, multipliers are small.
    #[allow(clippy::cast_sign_loss)] // negative products clamp to 1.
    pub fn apply(&self, options: &RunOptions) -> Self {
        let mut scaled = self.clone();
        scaled.thread_count =
            ((self.thread_count as f64 * options.thread_multiplier).round() as usize).max(1);
        scaled.iterations =
            ((self.iterations as f64 * options.iteration_multiplier).round() as u64).max(1);
        scaled
    }

    /// Checks every structural invariant of the config.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.states.is_empty() {
            return Err(ConfigError::NoStates);
        }
        if self.thread_count == 0 {
            return Err(ConfigError::NoThreads);
        }
        if self.iterations == 0 {
            return Err(ConfigError::NoIterations);
        }
        if !self.states.contains_key(&self.start_state) {
            return Err(ConfigError::UnknownStartState(self.start_state.clone()));
        }
        for (origin, edges) in &self.transitions {
            if !self.states.contains_key(origin) {
                return Err(ConfigError::UnknownOrigin(origin.clone()));
            }
            if edges.is_empty() {
                continue;
            }
            let mut sum = 0.0;
            for edge in edges {
                if !self.states.contains_key(&edge.target) {
                    return Err(ConfigError::UnknownTarget {
                        origin: origin.clone(),
                        target: edge.target.clone(),
                    });
                }
                if !edge.weight.is_finite() || edge.weight <= 0.0 {
                    return Err(ConfigError::InvalidWeight {
                        origin: origin.clone(),
                        target: edge.target.clone(),
                        weight: edge.weight,
                    });
                }
                sum += edge.weight;
            }
            if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
                return Err(ConfigError::WeightSum {
                    origin: origin.clone(),
                    sum,
                });
            }
        }
        Ok(())
    }

    /// Internal accessors for the composer, which rebuilds these maps.
    pub(crate) fn parts_mut(
        &mut self,
    ) -> (
        &mut BTreeMap<String, StateFn<H>>,
        &mut BTreeMap<String, Vec<Transition>>,
        &mut Value,
    ) {
        (&mut self.states, &mut self.transitions, &mut self.data)
    }

    pub(crate) fn set_thread_count(&mut self, n: usize) {
        self.thread_count = n;
    }

    pub(crate) fn set_iterations(&mut self, n: u64) {
        self.iterations = n;
    }

    pub(crate) fn set_start_state(&mut self, s: String) {
        self.start_state = s;
    }

    pub(crate) fn set_setup(&mut self, hook: Option<HookFn<H>>) {
        self.setup = hook;
    }

    pub(crate) fn set_teardown(&mut self, hook: Option<HookFn<H>>) {
        self.teardown = hook;
    }

    pub(crate) fn set_ownership(&mut self, ownership: Ownership) {
        self.ownership = ownership;
    }

    pub(crate) fn set_needs_conn_cache(&mut self, needs: bool) {
        self.needs_conn_cache = needs;
    }
}

// Manual impl: handlers are `Arc`s, so cloning never requires `H: Clone`.
impl<H> Clone for WorkloadConfig<H> {
    fn clone(&self) -> Self {
        Self {
            thread_count: self.thread_count,
            iterations: self.iterations,
            start_state: self.start_state.clone(),
            states: self.states.clone(),
            transitions: self.transitions.clone(),
            data: self.data.clone(),
            setup: self.setup.clone(),
            teardown: self.teardown.clone(),
            ownership: self.ownership,
            needs_conn_cache: self.needs_conn_cache,
        }
    }
}

impl<H> fmt::Debug for WorkloadConfig<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkloadConfig")
            .field("thread_count", &self.thread_count)
            .field("iterations", &self.iterations)
            .field("start_state", &self.start_state)
            .field("states", &self.states.keys().collect::<Vec<_>>())
            .field("transitions", &self.transitions)
            .field("data", &self.data)
            .field("ownership", &self.ownership)
            .field("needs_conn_cache", &self.needs_conn_cache)
            .finish_non_exhaustive()
    }
}

/// Builder for [`WorkloadConfig`]. `build()` validates the whole graph, so
/// configuration errors surface before any run starts.
pub struct WorkloadBuilder<H> {
    config: WorkloadConfig<H>,
}

impl<H> WorkloadBuilder<H> {
    /// Creates a builder with one worker, one iteration, and start state
    /// `"init"`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: WorkloadConfig {
                thread_count: 1,
                iterations: 1,
                start_state: "init".to_string(),
                states: BTreeMap::new(),
                transitions: BTreeMap::new(),
                data: Value::Null,
                setup: None,
                teardown: None,
                ownership: Ownership::default(),
                needs_conn_cache: false,
            },
        }
    }

    /// Sets the number of concurrent workers.
    #[must_use]
    pub const fn thread_count(mut self, count: usize) -> Self {
        self.config.thread_count = count;
        self
    }

    /// Sets the number of state-transition steps per worker.
    #[must_use]
    pub const fn iterations(mut self, iterations: u64) -> Self {
        self.config.iterations = iterations;
        self
    }

    /// Sets the state every worker begins in.
    #[must_use]
    pub fn start_state(mut self, name: impl Into<String>) -> Self {
        self.config.start_state = name.into();
        self
    }

    /// Defines (or replaces) a state handler.
    #[must_use]
    pub fn state<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut WorkerContext, &H, &Namespace, Option<&ConnCache<H>>) -> Result<(), StateError>
            + Send
            + Sync
            + 'static,
    {
        self.config.states.insert(name.into(), Arc::new(handler));
        self
    }

    /// Appends one weighted outgoing edge to a state. Declared order is
    /// selection order.
    #[must_use]
    pub fn transition(
        mut self,
        origin: impl Into<String>,
        target: impl Into<String>,
        weight: f64,
    ) -> Self {
        self.config
            .transitions
            .entry(origin.into())
            .or_default()
            .push(Transition::new(target, weight));
        self
    }

    /// Replaces the full outgoing edge list of a state.
    #[must_use]
    pub fn transitions(mut self, origin: impl Into<String>, edges: Vec<Transition>) -> Self {
        self.config.transitions.insert(origin.into(), edges);
        self
    }

    /// Sets the seed payload deep-copied into every worker.
    #[must_use]
    pub fn data(mut self, data: Value) -> Self {
        self.config.data = data;
        self
    }

    /// Sets the setup hook, run once before any worker.
    #[must_use]
    pub fn setup<F>(mut self, hook: F) -> Self
    where
        F: Fn(&H, &Namespace, &dyn ClusterFixture) -> Result<(), HookError>
            + Send
            + Sync
            + 'static,
    {
        self.config.setup = Some(Arc::new(hook));
        self
    }

    /// Sets the teardown hook, run once after all workers.
    #[must_use]
    pub fn teardown<F>(mut self, hook: F) -> Self
    where
        F: Fn(&H, &Namespace, &dyn ClusterFixture) -> Result<(), HookError>
            + Send
            + Sync
            + 'static,
    {
        self.config.teardown = Some(Arc::new(hook));
        self
    }

    /// Declares whether the workload owns its namespace exclusively.
    #[must_use]
    pub const fn ownership(mut self, ownership: Ownership) -> Self {
        self.config.ownership = ownership;
        self
    }

    /// Declares that workers need a role-addressed connection cache.
    #[must_use]
    pub const fn needs_conn_cache(mut self, needs: bool) -> Self {
        self.config.needs_conn_cache = needs;
        self
    }

    /// Validates and returns the config.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for an unknown start state, an edge
    /// referencing an undefined state, an invalid weight, per-origin weights
    /// drifting from 1 by more than [`WEIGHT_SUM_TOLERANCE`], an empty state
    /// set, or zero threads/iterations.
    pub fn build(self) -> Result<WorkloadConfig<H>, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl<H> Default for WorkloadBuilder<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop<H>() -> impl Fn(
        &mut WorkerContext,
        &H,
        &Namespace,
        Option<&ConnCache<H>>,
    ) -> Result<(), StateError>
           + Send
           + Sync
           + 'static {
        |_, _, _, _| Ok(())
    }

    fn two_state() -> WorkloadConfig<()> {
        WorkloadConfig::builder()
            .thread_count(2)
            .iterations(3)
            .state("init", noop())
            .state("step", noop())
            .transition("init", "step", 1.0)
            .transition("step", "step", 1.0)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_valid_config() {
        let config = two_state();
        assert_eq!(config.thread_count(), 2);
        assert_eq!(config.iterations(), 3);
        assert_eq!(config.start_state(), "init");
        assert!(config.state("init").is_some());
        assert!(config.state("missing").is_none());
        assert_eq!(config.transitions("init").unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_start_state_rejected() {
        let result = WorkloadConfig::<()>::builder()
            .start_state("nowhere")
            .state("init", noop())
            .build();
        assert!(matches!(result, Err(ConfigError::UnknownStartState(s)) if s == "nowhere"));
    }

    #[test]
    fn test_unknown_transition_target_rejected() {
        let result = WorkloadConfig::<()>::builder()
            .state("init", noop())
            .transition("init", "ghost", 1.0)
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::UnknownTarget { target, .. }) if target == "ghost"
        ));
    }

    #[test]
    fn test_unknown_transition_origin_rejected() {
        let result = WorkloadConfig::<()>::builder()
            .state("init", noop())
            .transition("ghost", "init", 1.0)
            .build();
        assert!(matches!(result, Err(ConfigError::UnknownOrigin(s)) if s == "ghost"));
    }

    #[test]
    fn test_weight_sum_drift_rejected() {
        let result = WorkloadConfig::<()>::builder()
            .state("init", noop())
            .state("a", noop())
            .state("b", noop())
            .transition("init", "a", 0.5)
            .transition("init", "b", 0.4)
            .build();
        assert!(matches!(result, Err(ConfigError::WeightSum { .. })));
    }

    #[test]
    fn test_weight_sum_within_tolerance_accepted() {
        let result = WorkloadConfig::<()>::builder()
            .state("init", noop())
            .state("a", noop())
            .transition("init", "a", 1.0 - 1e-12)
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_non_positive_weight_rejected() {
        let result = WorkloadConfig::<()>::builder()
            .state("init", noop())
            .transition("init", "init", 0.0)
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidWeight { .. })));
    }

    #[test]
    fn test_zero_threads_rejected() {
        let result = WorkloadConfig::<()>::builder()
            .thread_count(0)
            .state("init", noop())
            .build();
        assert!(matches!(result, Err(ConfigError::NoThreads)));
    }

    #[test]
    fn test_empty_states_rejected() {
        let result = WorkloadConfig::<()>::builder().build();
        assert!(matches!(result, Err(ConfigError::NoStates)));
    }

    #[test]
    fn test_choose_declared_order() {
        // Fixed draws for a 0.5/0.5 split declared b then c.
        let edges = vec![Transition::new("b", 0.5), Transition::new("c", 0.5)];
        let picks: Vec<&str> = [0.2, 0.7, 0.4, 0.9]
            .iter()
            .map(|&roll| Transition::choose(&edges, roll).unwrap().target.as_str())
            .collect();
        assert_eq!(picks, ["b", "c", "b", "c"]);
    }

    #[test]
    fn test_choose_remainder_absorbed_by_last() {
        let edges = vec![Transition::new("a", 0.3), Transition::new("b", 0.7 - 1e-12)];
        let picked = Transition::choose(&edges, 0.999_999_999_999_9).unwrap();
        assert_eq!(picked.target, "b");
    }

    #[test]
    fn test_choose_empty_is_none() {
        assert!(Transition::choose(&[], 0.5).is_none());
    }

    #[test]
    fn test_apply_scales_and_clamps() {
        let config = two_state();
        let scaled = config.apply(&RunOptions {
            seed: 0,
            thread_multiplier: 2.0,
            iteration_multiplier: 0.01,
        });
        assert_eq!(scaled.thread_count(), 4);
        assert_eq!(scaled.iterations(), 1); // clamped up from 0.
        // The original is untouched.
        assert_eq!(config.thread_count(), 2);
        assert_eq!(config.iterations(), 3);
    }
}
