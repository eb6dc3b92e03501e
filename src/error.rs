use {
    crate::address::RemoteAddress,
    std::{fmt, time::Duration},
};

/// Malformed remote address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// Address is not of the `addr:port:family` form.
    #[error("Invalid remote `{0}`, expected addr:port:family")]
    Format(String),

    /// Port is not a valid non-zero 16-bit number.
    #[error("Invalid port in remote `{0}`")]
    Port(String),

    /// Address family is neither 2 (IPv4) nor 10 (IPv6).
    #[error("Unsupported address family in remote `{0}`")]
    Family(String),
}

/// Failure to establish a session with a remote node.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    /// Remote actively refused the connection.
    #[error("Connection refused")]
    Refused,

    /// Host name did not resolve to an address of the requested family.
    #[error("Unable to resolve address: {0}")]
    Unresolved(String),

    /// Connection was not established in time.
    #[error("Connect timed out after {0:?}")]
    Timeout(Duration),

    /// Any other transport failure.
    #[error("Connect failed: {0}")]
    Io(String),
}

/// Failure to retrieve a routing table over an established session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Remote did not answer in time.
    #[error("Route table request timed out after {0:?}")]
    Timeout(Duration),

    /// Reply could not be decoded.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Remote answered with an error of its own.
    #[error("Remote error: {0}")]
    Remote(String),

    /// Session was closed before a reply arrived.
    #[error("Connection closed")]
    Closed,
}

/// What went wrong with a single remote.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureKind {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl FailureKind {
    /// Whether the failure was caused by a timeout, either while connecting
    /// or while waiting for the reply.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            FailureKind::Connect(ConnectError::Timeout(_)) | FailureKind::Fetch(FetchError::Timeout(_))
        )
    }
}

/// Failure of one remote, tagged with its address.
///
/// Remote failures are never fatal on their own: they are collected and
/// returned next to whatever the other remotes produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFailure {
    pub remote: RemoteAddress,
    pub kind: FailureKind,
}

impl fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.remote, self.kind)
    }
}

/// Operation level errors.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// No remotes to poll.
    #[error("No remotes given")]
    NoRemotes,

    /// A remote could not be parsed. Nothing has been dispatched.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// Not a single remote returned a routing table.
    #[error("All {} remotes failed", .0.len())]
    AggregateFailure(Vec<RemoteFailure>),

    /// Operation was cancelled before all remotes completed.
    ///
    /// This is not a failure of the remotes: in-flight requests were
    /// abandoned on request of the caller.
    #[error("Route table fetch cancelled")]
    Cancelled,
}

pub type RouteResult<T> = Result<T, RouteError>;

/// Malformed textual ring position.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    /// More hex digits than a ring position can hold.
    #[error("Ring position has {0} hex digits, at most 128 allowed")]
    TooLong(usize),

    /// Empty input.
    #[error("Empty ring position")]
    Empty,

    /// Not a hex digit.
    #[error("Invalid hex digit `{0}` in ring position")]
    Digit(char),
}
