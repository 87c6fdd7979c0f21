//! Tolerance-classifying assertion helpers.
//!
//! Handlers interact with a live system that other workers (and induced
//! faults) are deliberately disturbing, so not every failed check is a bug.
//! `always*` checks guard invariants that hold under every interleaving;
//! `when_exclusive*` checks guard invariants that only hold absent
//! concurrent interference, and are downgraded to soft when the workload
//! declared [`Ownership::Shared`].
//!
//! Classification happens here, at the call site. The driver only reads the
//! severity off the returned [`StateError`].

use std::fmt::Debug;

use crate::config::Ownership;
use crate::error::{Severity, StateError};

/// Assertion helpers bound to a workload's declared namespace ownership.
///
/// Available on every worker context as `ctx.checks`.
#[derive(Debug, Clone, Copy)]
pub struct Asserts {
    ownership: Ownership,
}

impl Asserts {
    /// Binds the helpers to an ownership declaration.
    #[must_use]
    pub const fn new(ownership: Ownership) -> Self {
        Self { ownership }
    }

    /// The ownership these helpers classify against.
    #[must_use]
    pub const fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Severity a `when_exclusive` failure carries under this ownership.
    const fn interference_severity(&self) -> Severity {
        match self.ownership {
            Ownership::Exclusive => Severity::Hard,
            Ownership::Shared => Severity::Soft,
        }
    }

    /// Checks an invariant that must hold under every interleaving.
    ///
    /// # Errors
    ///
    /// Returns a hard [`StateError`] if `cond` is false.
    pub fn always(&self, cond: bool, msg: impl Into<String>) -> Result<(), StateError> {
        if cond {
            Ok(())
        } else {
            Err(StateError::hard(msg))
        }
    }

    /// Checks equality of an invariant that must hold under every
    /// interleaving.
    ///
    /// # Errors
    ///
    /// Returns a hard [`StateError`] naming both values if they differ.
    pub fn always_eq<T: PartialEq + Debug>(
        &self,
        actual: T,
        expected: T,
        what: &str,
    ) -> Result<(), StateError> {
        if actual == expected {
            Ok(())
        } else {
            Err(StateError::hard(format!(
                "{what}: expected {expected:?}, got {actual:?}"
            )))
        }
    }

    /// Checks an invariant that only holds absent concurrent interference.
    ///
    /// # Errors
    ///
    /// Returns a [`StateError`] if `cond` is false: hard when the workload
    /// declared exclusive ownership, soft otherwise.
    pub fn when_exclusive(&self, cond: bool, msg: impl Into<String>) -> Result<(), StateError> {
        if cond {
            Ok(())
        } else {
            Err(StateError {
                severity: self.interference_severity(),
                message: msg.into(),
            })
        }
    }

    /// Checks equality of an invariant that only holds absent concurrent
    /// interference.
    ///
    /// # Errors
    ///
    /// Returns a [`StateError`] naming both values if they differ: hard
    /// when the workload declared exclusive ownership, soft otherwise.
    pub fn when_exclusive_eq<T: PartialEq + Debug>(
        &self,
        actual: T,
        expected: T,
        what: &str,
    ) -> Result<(), StateError> {
        if actual == expected {
            Ok(())
        } else {
            Err(StateError {
                severity: self.interference_severity(),
                message: format!("{what}: expected {expected:?}, got {actual:?}"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_always_is_hard_regardless_of_ownership() {
        for ownership in [Ownership::Exclusive, Ownership::Shared] {
            let checks = Asserts::new(ownership);
            let err = checks.always(false, "broken").unwrap_err();
            assert_eq!(err.severity, Severity::Hard);
            assert!(checks.always(true, "fine").is_ok());
        }
    }

    #[test]
    fn test_when_exclusive_tracks_ownership() {
        let exclusive = Asserts::new(Ownership::Exclusive);
        let err = exclusive.when_exclusive(false, "count drifted").unwrap_err();
        assert_eq!(err.severity, Severity::Hard);

        let shared = Asserts::new(Ownership::Shared);
        let err = shared.when_exclusive(false, "count drifted").unwrap_err();
        assert_eq!(err.severity, Severity::Soft);
    }

    #[test]
    fn test_eq_variants_name_both_values() {
        let checks = Asserts::new(Ownership::Shared);
        let err = checks
            .when_exclusive_eq(4, 7, "document count")
            .unwrap_err();
        assert_eq!(err.severity, Severity::Soft);
        assert!(err.message.contains("expected 7"));
        assert!(err.message.contains("got 4"));

        let err = checks.always_eq("a", "b", "marker").unwrap_err();
        assert_eq!(err.severity, Severity::Hard);
    }
}
