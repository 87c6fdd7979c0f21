//! Cluster-fixture contract for fault injection.
//!
//! Setup/teardown hooks receive a fixture by reference; specialized state
//! handlers that inject faults mid-run capture a clone of their fixture in
//! their closures. Either way the engine stays ignorant of how nodes are
//! actually started and stopped.

use crate::error::SystemError;

/// Lifecycle operations on the cluster under test.
///
/// Implementations use interior mutability: faults are injected concurrently
/// with FSM traffic, so all operations take `&self`.
pub trait ClusterFixture {
    /// Names of the nodes this fixture manages.
    fn nodes(&self) -> Vec<String>;

    /// Brings a node up.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is unknown or cannot be started.
    fn start_node(&self, node: &str) -> Result<(), SystemError>;

    /// Takes a node down.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is unknown or cannot be stopped.
    fn stop_node(&self, node: &str) -> Result<(), SystemError>;

    /// Stops and immediately restarts a node.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is unknown or either step fails.
    fn restart_node(&self, node: &str) -> Result<(), SystemError> {
        self.stop_node(node)?;
        self.start_node(node)
    }
}

/// Stand-in fixture for runs against a cluster the harness does not manage.
/// Every lifecycle operation fails with [`SystemError::Unmanaged`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UnmanagedCluster;

impl ClusterFixture for UnmanagedCluster {
    fn nodes(&self) -> Vec<String> {
        Vec::new()
    }

    fn start_node(&self, _node: &str) -> Result<(), SystemError> {
        Err(SystemError::Unmanaged)
    }

    fn stop_node(&self, _node: &str) -> Result<(), SystemError> {
        Err(SystemError::Unmanaged)
    }
}
