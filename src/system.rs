//! Contracts between the engine and the external system under test.
//!
//! The engine never talks to the system itself; it mints connections through
//! [`SystemClient`] and hands them to state handlers. The connection type is
//! fully opaque to the engine, so workload files stay typed against their
//! system's real client API.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SystemError;

/// A target namespace on the external system (database + collection, topic,
/// keyspace, whatever the system calls it).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    /// Containing database/scope.
    pub database: String,
    /// Collection/table name within the database.
    pub collection: String,
}

impl Namespace {
    /// Creates a namespace.
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }

    /// Derives a per-worker namespace by embedding the tid in the collection
    /// name. Workloads that do not want shared contention use this to keep
    /// workers off each other's data.
    #[must_use]
    pub fn for_worker(&self, tid: usize) -> Self {
        Self {
            database: self.database.clone(),
            collection: format!("{}_{tid}", self.collection),
        }
    }

    /// Returns the fully qualified `database.collection` form.
    #[must_use]
    pub fn full(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Mints live connections to the external system.
///
/// The controller opens one connection for setup/teardown and each worker
/// opens its own; connections are never shared between workers.
pub trait SystemClient {
    /// A live connection handle. Must be `Send` so each worker thread can
    /// own its handle.
    type Conn: Send;

    /// Opens a dedicated connection to the system's default entry point.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection can be established.
    fn connect(&self) -> Result<Self::Conn, SystemError>;

    /// Opens a connection addressed to a specific node role (a shard name,
    /// `"config"`, ...). Serves topology-aware workloads.
    ///
    /// # Errors
    ///
    /// Returns an error if the role is unknown or unreachable.
    fn connect_to(&self, role: &str) -> Result<Self::Conn, SystemError>;

    /// Lists the node roles this client can address.
    fn roles(&self) -> Vec<String>;
}

/// Role-addressed connection cache built once per worker.
///
/// Workers whose workload declares `needs_conn_cache` get one of these,
/// passed opaquely into every state handler. The engine never inspects the
/// handles.
pub struct ConnCache<H> {
    conns: BTreeMap<String, H>,
}

impl<H> ConnCache<H> {
    /// Builds a cache holding one live connection per role the client
    /// advertises.
    ///
    /// # Errors
    ///
    /// Returns the first connection failure encountered.
    pub fn build<C>(client: &C) -> Result<Self, SystemError>
    where
        C: SystemClient<Conn = H> + ?Sized,
    {
        let mut conns = BTreeMap::new();
        for role in client.roles() {
            let conn = client.connect_to(&role)?;
            conns.insert(role, conn);
        }
        Ok(Self { conns })
    }

    /// Returns the connection for a role, if cached.
    #[must_use]
    pub fn get(&self, role: &str) -> Option<&H> {
        self.conns.get(role)
    }

    /// Iterates the cached roles in sorted order.
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.conns.keys().map(String::as_str)
    }

    /// Number of cached connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.conns.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }
}

impl<H> fmt::Debug for ConnCache<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnCache")
            .field("roles", &self.conns.keys().collect::<Vec<_>>())
            .finish()
    }
}
