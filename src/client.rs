mod memory;
mod tcp;

use {
    super::{ConnectError, FetchError, RemoteAddress, RouteTable},
    async_trait::async_trait,
    std::time::Duration,
};

pub use {
    memory::{MemoryNodeClient, MemorySession, NodeBehavior},
    tcp::{MAX_FRAME_SIZE, NodeRequest, NodeResponse, TcpNodeClient, TcpSession, read_frame, write_frame},
};

/// Client able to open sessions with storage nodes.
///
/// Connection attempts are never retried by the fetcher: whatever retry
/// policy exists belongs to the client.
#[async_trait]
pub trait NodeClient: Send + Sync {
    type Session: Session;

    /// Opens a session with the given remote.
    ///
    /// `timeout` is the caller's budget for the attempt. The fetcher enforces
    /// it on its own too, so honouring it is a courtesy.
    async fn connect(
        &self,
        remote: &RemoteAddress,
        timeout: Duration,
    ) -> Result<Self::Session, ConnectError>;
}

/// Established session with one storage node.
#[async_trait]
pub trait Session: Send {
    /// Requests the routing table as the node currently sees it.
    async fn fetch_route_table(&mut self) -> Result<RouteTable, FetchError>;
}
