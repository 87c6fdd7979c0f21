//! Workload composition: derive a new config from a parent plus overrides.
//!
//! Families of related workloads share a base definition; each derived
//! workload replaces a handful of states, re-tunes weights or thread counts,
//! and merges extra seed data. Composition is pure: the parent is cloned
//! up front and never mutated, so one base is safely shared across many
//! derived workloads.
//!
//! A replacement handler that needs the parent's behavior captures it
//! explicitly through [`Compose::wrap_state`]: the parent handler is handed
//! to the wrapper as a plain `Arc`'d function value at composition time.
//! This works transitively: wrapping a state of an already-composed parent
//! captures the immediate parent's (already-overridden) handler, not the
//! root's.

use serde_json::Value;

use crate::config::{HookFn, Ownership, StateFn, Transition, WorkloadConfig};
use crate::driver::WorkerContext;
use crate::error::{ConfigError, HookError, StateError};
use crate::fixture::ClusterFixture;
use crate::system::{ConnCache, Namespace};

/// Builder for a derived [`WorkloadConfig`].
///
/// Override errors (an unknown state reference, a bad data merge) are
/// captured as they occur and reported by [`Compose::finish`], which also
/// fully re-validates the derived graph. The first error wins.
pub struct Compose<H> {
    config: WorkloadConfig<H>,
    error: Option<ConfigError>,
}

impl<H> Compose<H> {
    /// Starts a composition from a parent config. The parent is cloned and
    /// left untouched.
    #[must_use]
    pub fn new(parent: &WorkloadConfig<H>) -> Self {
        Self {
            config: parent.clone(),
            error: None,
        }
    }

    /// Replaces or adds a state handler.
    #[must_use]
    pub fn state<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut WorkerContext, &H, &Namespace, Option<&ConnCache<H>>) -> Result<(), StateError>
            + Send
            + Sync
            + 'static,
    {
        let (states, _, _) = self.config.parts_mut();
        states.insert(name.into(), std::sync::Arc::new(handler));
        self
    }

    /// Replaces a state handler with a wrapper around the immediate
    /// parent's handler, the explicit "super call".
    ///
    /// `wrap` receives the handler currently bound to `name` (the parent's
    /// original, or an earlier override in this same composition) and
    /// returns the replacement. Referencing a state absent from both parent
    /// and override set is a composition error reported by `finish`.
    #[must_use]
    pub fn wrap_state<F>(mut self, name: &str, wrap: F) -> Self
    where
        F: FnOnce(StateFn<H>) -> StateFn<H>,
    {
        let (states, _, _) = self.config.parts_mut();
        let parent_handler = states.get(name).map(std::sync::Arc::clone);
        match parent_handler {
            Some(parent_handler) => {
                states.insert(name.to_string(), wrap(parent_handler));
            }
            None => {
                self.error
                    .get_or_insert(ConfigError::UnknownOverride(name.to_string()));
            }
        }
        self
    }

    /// Replaces the full outgoing edge list of a state.
    #[must_use]
    pub fn transitions(mut self, origin: impl Into<String>, edges: Vec<Transition>) -> Self {
        let (_, transitions, _) = self.config.parts_mut();
        transitions.insert(origin.into(), edges);
        self
    }

    /// Shallow-merges a JSON object into the parent's seed data. Keys in
    /// `extra` win. A `Null` parent payload is treated as an empty object.
    #[must_use]
    pub fn merge_data(mut self, extra: Value) -> Self {
        let (_, _, data) = self.config.parts_mut();
        match (&mut *data, extra) {
            (Value::Object(base), Value::Object(extra)) => {
                for (key, value) in extra {
                    base.insert(key, value);
                }
            }
            (slot @ Value::Null, extra @ Value::Object(_)) => {
                *slot = extra;
            }
            _ => {
                self.error.get_or_insert(ConfigError::DataMerge);
            }
        }
        self
    }

    /// Replaces the setup hook.
    #[must_use]
    pub fn setup<F>(mut self, hook: F) -> Self
    where
        F: Fn(&H, &Namespace, &dyn ClusterFixture) -> Result<(), HookError>
            + Send
            + Sync
            + 'static,
    {
        self.config
            .set_setup(Some(std::sync::Arc::new(hook) as HookFn<H>));
        self
    }

    /// Replaces the teardown hook.
    #[must_use]
    pub fn teardown<F>(mut self, hook: F) -> Self
    where
        F: Fn(&H, &Namespace, &dyn ClusterFixture) -> Result<(), HookError>
            + Send
            + Sync
            + 'static,
    {
        self.config
            .set_teardown(Some(std::sync::Arc::new(hook) as HookFn<H>));
        self
    }

    /// Overrides the worker count.
    #[must_use]
    pub fn thread_count(mut self, count: usize) -> Self {
        self.config.set_thread_count(count);
        self
    }

    /// Overrides the per-worker iteration count.
    #[must_use]
    pub fn iterations(mut self, iterations: u64) -> Self {
        self.config.set_iterations(iterations);
        self
    }

    /// Overrides the start state.
    #[must_use]
    pub fn start_state(mut self, name: impl Into<String>) -> Self {
        self.config.set_start_state(name.into());
        self
    }

    /// Overrides the namespace-ownership declaration.
    #[must_use]
    pub fn ownership(mut self, ownership: Ownership) -> Self {
        self.config.set_ownership(ownership);
        self
    }

    /// Overrides whether workers build a connection cache.
    #[must_use]
    pub fn needs_conn_cache(mut self, needs: bool) -> Self {
        self.config.set_needs_conn_cache(needs);
        self
    }

    /// Validates and returns the derived config.
    ///
    /// # Errors
    ///
    /// Returns the first override error captured during composition, or any
    /// structural invariant the derived graph violates.
    pub fn finish(self) -> Result<WorkloadConfig<H>, ConfigError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        self.config.validate()?;
        Ok(self.config)
    }
}
