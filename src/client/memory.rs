use {
    super::{NodeClient, Session},
    crate::{ConnectError, FetchError, RemoteAddress, RouteTable},
    async_trait::async_trait,
    parking_lot::{Mutex, RwLock},
    std::{collections::HashMap, future, sync::Arc, time::Duration},
};

/// How a node registered with [`MemoryNodeClient`] responds.
#[derive(Debug, Clone)]
pub enum NodeBehavior {
    /// Accept the connection and serve the given table.
    Serve(RouteTable),

    /// Refuse the connection.
    Refuse,

    /// Never complete the connection.
    Unresponsive,

    /// Accept the connection, then fail the request.
    FailFetch(FetchError),

    /// Accept the connection, then never answer.
    Stall,
}

/// In-process node client.
///
/// Nodes are registered per address together with their behavior; addresses
/// nobody registered refuse connections. Clones share the registry, so
/// behaviors may be changed while a fetch is running.
#[derive(Debug, Clone, Default)]
pub struct MemoryNodeClient {
    nodes: Arc<RwLock<HashMap<RemoteAddress, NodeBehavior>>>,
    attempts: Arc<Mutex<HashMap<RemoteAddress, usize>>>,
}

impl MemoryNodeClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node, builder style.
    pub fn with_node(self, remote: RemoteAddress, behavior: NodeBehavior) -> Self {
        self.set(remote, behavior);
        self
    }

    /// Registers a node, replacing any previous behavior.
    pub fn set(&self, remote: RemoteAddress, behavior: NodeBehavior) {
        self.nodes.write().insert(remote, behavior);
    }

    /// Number of connection attempts made to the given remote.
    pub fn attempts(&self, remote: &RemoteAddress) -> usize {
        self.attempts.lock().get(remote).copied().unwrap_or(0)
    }
}

#[async_trait]
impl NodeClient for MemoryNodeClient {
    type Session = MemorySession;

    async fn connect(
        &self,
        remote: &RemoteAddress,
        _timeout: Duration,
    ) -> Result<Self::Session, ConnectError> {
        *self.attempts.lock().entry(remote.clone()).or_default() += 1;

        let behavior = self.nodes.read().get(remote).cloned();
        match behavior {
            None | Some(NodeBehavior::Refuse) => Err(ConnectError::Refused),
            Some(NodeBehavior::Unresponsive) => future::pending().await,
            Some(NodeBehavior::Serve(table)) => Ok(MemorySession(Some(Ok(table)))),
            Some(NodeBehavior::FailFetch(err)) => Ok(MemorySession(Some(Err(err)))),
            Some(NodeBehavior::Stall) => Ok(MemorySession(None)),
        }
    }
}

/// Session opened by [`MemoryNodeClient`]. `None` never answers.
#[derive(Debug)]
pub struct MemorySession(Option<Result<RouteTable, FetchError>>);

#[async_trait]
impl Session for MemorySession {
    async fn fetch_route_table(&mut self) -> Result<RouteTable, FetchError> {
        match &self.0 {
            Some(reply) => reply.clone(),
            None => future::pending().await,
        }
    }
}
