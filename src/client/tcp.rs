use {
    super::{NodeClient, Session},
    crate::{AddressFamily, ConnectError, FetchError, RemoteAddress, RouteEntry, RouteTable},
    async_trait::async_trait,
    serde::{Deserialize, Serialize, de::DeserializeOwned},
    std::{io, time::Duration},
    tokio::{
        io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
        net::{TcpStream, lookup_host},
        time,
    },
};

/// Largest frame accepted from or sent to a node.
pub const MAX_FRAME_SIZE: usize = 16 << 20;

/// Request sent to a storage node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRequest {
    /// Ask for the node's routing table.
    RouteTable,
}

/// Reply of a storage node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeResponse {
    /// Route entries, as known to the node.
    Routes(Vec<RouteEntry>),

    /// Node could not serve the request.
    Error(String),
}

/// Node client talking to storage nodes over TCP.
///
/// Messages are JSON documents, each framed by its length as a big-endian
/// `u32`. A session sends one [`NodeRequest`] per fetch and reads one
/// [`NodeResponse`] back.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpNodeClient;

impl TcpNodeClient {
    pub fn new() -> Self {
        Self
    }

    async fn open(remote: &RemoteAddress) -> Result<TcpStream, ConnectError> {
        let addrs = lookup_host((remote.host(), remote.port()))
            .await
            .map_err(|err| ConnectError::Unresolved(format!("{remote}: {err}")))?;

        let addr = addrs
            .into_iter()
            .find(|addr| match remote.family() {
                AddressFamily::Inet => addr.is_ipv4(),
                AddressFamily::Inet6 => addr.is_ipv6(),
            })
            .ok_or_else(|| ConnectError::Unresolved(remote.to_string()))?;

        let stream = TcpStream::connect(addr).await.map_err(|err| match err.kind() {
            io::ErrorKind::ConnectionRefused => ConnectError::Refused,
            _ => ConnectError::Io(err.to_string()),
        })?;
        stream
            .set_nodelay(true)
            .map_err(|err| ConnectError::Io(err.to_string()))?;
        Ok(stream)
    }
}

#[async_trait]
impl NodeClient for TcpNodeClient {
    type Session = TcpSession;

    async fn connect(
        &self,
        remote: &RemoteAddress,
        timeout: Duration,
    ) -> Result<Self::Session, ConnectError> {
        let stream = time::timeout(timeout, Self::open(remote))
            .await
            .map_err(|_| ConnectError::Timeout(timeout))??;
        tracing::trace!(remote = %remote, "connected");
        Ok(TcpSession { stream, timeout })
    }
}

/// Session opened by [`TcpNodeClient`].
#[derive(Debug)]
pub struct TcpSession {
    stream: TcpStream,
    timeout: Duration,
}

impl TcpSession {
    async fn round_trip(&mut self) -> Result<RouteTable, FetchError> {
        write_frame(&mut self.stream, &NodeRequest::RouteTable).await?;
        match read_frame(&mut self.stream).await? {
            NodeResponse::Routes(entries) => Ok(RouteTable::from_entries(entries)),
            NodeResponse::Error(msg) => Err(FetchError::Remote(msg)),
        }
    }
}

#[async_trait]
impl Session for TcpSession {
    async fn fetch_route_table(&mut self) -> Result<RouteTable, FetchError> {
        let timeout = self.timeout;
        time::timeout(timeout, self.round_trip())
            .await
            .map_err(|_| FetchError::Timeout(timeout))?
    }
}

/// Writes one length-prefixed JSON frame.
pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<(), FetchError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(msg).map_err(|err| FetchError::Protocol(err.to_string()))?;
    if payload.len() > MAX_FRAME_SIZE {
        return Err(FetchError::Protocol(format!(
            "frame of {} bytes exceeds limit",
            payload.len()
        )));
    }

    writer
        .write_u32(payload.len() as u32)
        .await
        .map_err(transport_error)?;
    writer.write_all(&payload).await.map_err(transport_error)?;
    writer.flush().await.map_err(transport_error)
}

/// Reads one length-prefixed JSON frame.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, FetchError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = reader.read_u32().await.map_err(transport_error)? as usize;
    if len > MAX_FRAME_SIZE {
        return Err(FetchError::Protocol(format!("frame of {len} bytes exceeds limit")));
    }

    let mut payload = vec![0; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(transport_error)?;
    serde_json::from_slice(&payload).map_err(|err| FetchError::Protocol(err.to_string()))
}

fn transport_error(err: io::Error) -> FetchError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => FetchError::Closed,
        _ => FetchError::Protocol(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{Host, RingPosition},
        tokio::net::TcpListener,
    };

    async fn serve_once(reply: NodeResponse) -> RemoteAddress {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request: NodeRequest = read_frame(&mut stream).await.unwrap();
            assert_eq!(request, NodeRequest::RouteTable);
            write_frame(&mut stream, &reply).await.unwrap();
        });
        RemoteAddress::new("127.0.0.1", port, AddressFamily::Inet)
    }

    #[tokio::test]
    async fn fetch_over_tcp() {
        let entries = vec![
            RouteEntry {
                group: 1,
                id: RingPosition::from_prefix(&[0x00]),
                host: Host::new("10.0.0.1:1025"),
            },
            RouteEntry {
                group: 1,
                id: RingPosition::from_prefix(&[0x80]),
                host: Host::new("10.0.0.2:1025"),
            },
        ];
        let remote = serve_once(NodeResponse::Routes(entries.clone())).await;

        let mut session = TcpNodeClient::new()
            .connect(&remote, Duration::from_secs(5))
            .await
            .unwrap();
        let table = session.fetch_route_table().await.unwrap();
        assert_eq!(table, RouteTable::from_entries(entries));
        assert_eq!(table.group(1).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn remote_error() {
        let remote = serve_once(NodeResponse::Error("not ready".to_string())).await;
        let mut session = TcpNodeClient::new()
            .connect(&remote, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(
            session.fetch_route_table().await,
            Err(FetchError::Remote("not ready".to_string()))
        );
    }

    #[tokio::test]
    async fn wrong_family_does_not_resolve() {
        let remote = RemoteAddress::new("127.0.0.1", 1025, AddressFamily::Inet6);
        let result = TcpNodeClient::new()
            .connect(&remote, Duration::from_secs(5))
            .await;
        assert!(matches!(result, Err(ConnectError::Unresolved(_))));
    }

    #[tokio::test]
    async fn oversized_frame() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_u32(MAX_FRAME_SIZE as u32 + 1).await.unwrap();
        let result: Result<NodeResponse, _> = read_frame(&mut server).await;
        assert!(matches!(result, Err(FetchError::Protocol(_))));
    }

    #[tokio::test]
    async fn truncated_frame() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_u32(10).await.unwrap();
        client.write_all(b"{}").await.unwrap();
        drop(client);
        let result: Result<NodeResponse, _> = read_frame(&mut server).await;
        assert_eq!(result, Err(FetchError::Closed));
    }
}
