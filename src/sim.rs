//! In-process simulated cluster: the engine's self-test bed.
//!
//! [`SimCluster`] is a namespaced document store behind role-addressed
//! connections, with per-node up/down switches so fault-injection paths can
//! be exercised without a real system. It implements both [`SystemClient`]
//! (connections) and [`ClusterFixture`] (lifecycle faults), which is exactly
//! the pair a workload needs end to end.
//!
//! The store is genuinely shared mutable state reached from many worker
//! threads at once, the same contention profile the engine produces against
//! a real system, minus the network.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::error::SystemError;
use crate::fixture::ClusterFixture;
use crate::system::{Namespace, SystemClient};

struct SimState {
    /// Node name -> up. Declared order decides the default connect target.
    nodes: RwLock<Vec<(String, bool)>>,
    /// `namespace.full()` -> documents keyed by id.
    store: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl SimState {
    fn node_up(&self, node: &str) -> Result<bool, SystemError> {
        self.nodes
            .read()
            .iter()
            .find(|(name, _)| name == node)
            .map(|(_, up)| *up)
            .ok_or_else(|| SystemError::UnknownNode {
                node: node.to_string(),
            })
    }

    fn set_node(&self, node: &str, up: bool) -> Result<(), SystemError> {
        let mut nodes = self.nodes.write();
        let entry = nodes
            .iter_mut()
            .find(|(name, _)| name == node)
            .ok_or_else(|| SystemError::UnknownNode {
                node: node.to_string(),
            })?;
        entry.1 = up;
        Ok(())
    }
}

/// A simulated multi-node cluster over a shared in-memory document store.
#[derive(Clone)]
pub struct SimCluster {
    state: Arc<SimState>,
}

impl SimCluster {
    /// Creates a cluster with the given node roles, all up. The first role
    /// is the default connect target.
    ///
    /// # Panics
    ///
    /// Panics if `roles` is empty.
    #[must_use]
    pub fn new(roles: &[&str]) -> Self {
        assert!(!roles.is_empty(), "a cluster needs at least one node");
        Self {
            state: Arc::new(SimState {
                nodes: RwLock::new(roles.iter().map(|r| ((*r).to_string(), true)).collect()),
                store: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Creates a single-node cluster named `"node0"`.
    #[must_use]
    pub fn single_node() -> Self {
        Self::new(&["node0"])
    }

    /// Total documents currently stored in a namespace, bypassing any
    /// connection. Test-inspection helper.
    #[must_use]
    pub fn stored_count(&self, namespace: &Namespace) -> usize {
        self.state
            .store
            .read()
            .get(&namespace.full())
            .map_or(0, BTreeMap::len)
    }
}

impl SystemClient for SimCluster {
    type Conn = SimConn;

    fn connect(&self) -> Result<SimConn, SystemError> {
        let nodes = self.state.nodes.read();
        let (name, up) = &nodes[0];
        if !up {
            return Err(SystemError::NoConnection { role: name.clone() });
        }
        Ok(SimConn {
            node: name.clone(),
            state: Arc::clone(&self.state),
        })
    }

    fn connect_to(&self, role: &str) -> Result<SimConn, SystemError> {
        if !self.state.node_up(role)? {
            return Err(SystemError::NoConnection {
                role: role.to_string(),
            });
        }
        Ok(SimConn {
            node: role.to_string(),
            state: Arc::clone(&self.state),
        })
    }

    fn roles(&self) -> Vec<String> {
        self.state
            .nodes
            .read()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl ClusterFixture for SimCluster {
    fn nodes(&self) -> Vec<String> {
        self.roles()
    }

    fn start_node(&self, node: &str) -> Result<(), SystemError> {
        self.state.set_node(node, true)
    }

    fn stop_node(&self, node: &str) -> Result<(), SystemError> {
        self.state.set_node(node, false)
    }
}

/// A live connection bound to one simulated node.
///
/// Every operation checks the bound node's up switch first, so a stopped
/// node fails its connections exactly like a killed process would.
pub struct SimConn {
    node: String,
    state: Arc<SimState>,
}

impl SimConn {
    /// The node this connection is bound to.
    #[must_use]
    pub fn node(&self) -> &str {
        &self.node
    }

    fn check_up(&self) -> Result<(), SystemError> {
        if self.state.node_up(&self.node)? {
            Ok(())
        } else {
            Err(SystemError::NodeDown {
                node: self.node.clone(),
            })
        }
    }

    /// Inserts (or overwrites) a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the bound node is down.
    pub fn insert(
        &self,
        namespace: &Namespace,
        key: impl Into<String>,
        doc: Value,
    ) -> Result<(), SystemError> {
        self.check_up()?;
        self.state
            .store
            .write()
            .entry(namespace.full())
            .or_default()
            .insert(key.into(), doc);
        Ok(())
    }

    /// Fetches a document by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the bound node is down.
    pub fn get(&self, namespace: &Namespace, key: &str) -> Result<Option<Value>, SystemError> {
        self.check_up()?;
        Ok(self
            .state
            .store
            .read()
            .get(&namespace.full())
            .and_then(|docs| docs.get(key).cloned()))
    }

    /// Replaces a document if it exists; returns whether it did.
    ///
    /// # Errors
    ///
    /// Returns an error if the bound node is down.
    pub fn update(
        &self,
        namespace: &Namespace,
        key: &str,
        doc: Value,
    ) -> Result<bool, SystemError> {
        self.check_up()?;
        let mut store = self.state.store.write();
        match store.get_mut(&namespace.full()).and_then(|d| d.get_mut(key)) {
            Some(slot) => {
                *slot = doc;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Removes a document by key; returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the bound node is down.
    pub fn remove(&self, namespace: &Namespace, key: &str) -> Result<bool, SystemError> {
        self.check_up()?;
        Ok(self
            .state
            .store
            .write()
            .get_mut(&namespace.full())
            .is_some_and(|docs| docs.remove(key).is_some()))
    }

    /// Counts the documents in a namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the bound node is down.
    pub fn count(&self, namespace: &Namespace) -> Result<usize, SystemError> {
        self.check_up()?;
        Ok(self
            .state
            .store
            .read()
            .get(&namespace.full())
            .map_or(0, BTreeMap::len))
    }

    /// Drops a namespace and everything in it.
    ///
    /// # Errors
    ///
    /// Returns an error if the bound node is down.
    pub fn drop_namespace(&self, namespace: &Namespace) -> Result<(), SystemError> {
        self.check_up()?;
        self.state.store.write().remove(&namespace.full());
        Ok(())
    }
}
