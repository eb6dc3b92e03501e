use {
    super::{
        ConnectError,
        FailureKind,
        FetchError,
        NodeClient,
        Options,
        RemoteAddress,
        RemoteFailure,
        RouteError,
        RouteResult,
        RouteTable,
        Session,
    },
    futures::stream::{self, StreamExt},
    std::{collections::HashSet, future, time::Duration},
    tokio::{sync::watch, time},
};

/// Upper bound on concurrently polled remotes, whatever the configuration.
pub const MAX_PARALLEL_FETCHES: usize = 32;

/// Default budget for connecting to a node, and again for its reply.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Signal telling an ongoing fetch to give up.
///
/// Obtained together with its [`CancelHandle`] from [`Cancellation::new()`].
/// The default value never fires.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Option<watch::Receiver<bool>>);

/// Fires the [`Cancellation`] it was created with.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl Cancellation {
    /// Creates a cancellation signal and the handle firing it.
    pub fn new() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle(tx), Self(Some(rx)))
    }

    /// Signal that never fires.
    pub fn never() -> Self {
        Self(None)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Completes once the signal fires.
    ///
    /// If the handle is dropped without firing, never completes.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.0 else {
            return future::pending().await;
        };

        let mut rx = rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            future::pending::<()>().await;
        }
    }
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Routing table as reported by one remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeView {
    pub remote: RemoteAddress,
    pub table: RouteTable,
}

/// Outcome of polling the remotes, when at least one of them answered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fetched {
    /// Tables of the remotes that answered, in completion order.
    pub views: Vec<NodeView>,

    /// Remotes that did not, in completion order.
    pub failures: Vec<RemoteFailure>,
}

/// Polls remotes for their routing tables.
///
/// Every remote is asked exactly once. Requests run concurrently, at most
/// [`parallelism()`](Self::parallelism) at a time, and each step of a
/// request (connecting, then waiting for the reply) is bounded by the
/// configured timeout. A failing remote never affects the others.
pub struct RouteTableFetcher<C> {
    client: C,
    timeout: Duration,
    max_parallel: Option<usize>,
}

impl<C: NodeClient> RouteTableFetcher<C> {
    /// Creates a fetcher with default timeout and parallelism.
    pub fn new(client: C) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
            max_parallel: None,
        }
    }

    /// Creates a fetcher configured by the given options.
    pub fn with_options(client: C, options: &Options) -> Self {
        Self {
            client,
            timeout: options.timeout_per_node,
            max_parallel: options.max_parallel_fetches,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel = Some(max);
        self
    }

    /// Number of remotes polled at once, out of `remotes` in total.
    ///
    /// Defaults to all of them, and is always within
    /// `1..=MAX_PARALLEL_FETCHES`.
    pub fn parallelism(&self, remotes: usize) -> usize {
        self.max_parallel
            .unwrap_or(remotes)
            .clamp(1, MAX_PARALLEL_FETCHES)
    }

    /// Fetches routing tables from all the given remotes.
    ///
    /// Duplicate remotes are polled once. Returns once every remote has
    /// either answered or failed, with
    /// [`AggregateFailure`](RouteError::AggregateFailure) if none answered.
    /// Firing `cancel` abandons the requests in flight and returns
    /// [`Cancelled`](RouteError::Cancelled).
    pub async fn fetch(
        &self,
        remotes: &[RemoteAddress],
        cancel: &Cancellation,
    ) -> RouteResult<Fetched> {
        if remotes.is_empty() {
            return Err(RouteError::NoRemotes);
        }

        let remotes: Vec<RemoteAddress> = {
            let mut seen = HashSet::new();
            remotes
                .iter()
                .filter(|r| seen.insert(*r))
                .cloned()
                .collect()
        };
        let parallelism = self.parallelism(remotes.len());
        tracing::debug!(remotes = remotes.len(), parallelism, "fetching route tables");

        let requests = stream::iter(remotes)
            .map(|remote| async move {
                let result = self.fetch_one(&remote).await;
                (remote, result)
            })
            .buffer_unordered(parallelism)
            .collect::<Vec<_>>();

        let results = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!("route table fetch cancelled");
                return Err(RouteError::Cancelled);
            }
            results = requests => results,
        };

        let mut fetched = Fetched::default();
        for (remote, result) in results {
            match result {
                Ok(table) => {
                    tracing::debug!(remote = %remote, entries = table.len(), "route table fetched");
                    fetched.views.push(NodeView { remote, table });
                }
                Err(kind) => {
                    tracing::warn!(remote = %remote, error = %kind, "route table fetch failed");
                    fetched.failures.push(RemoteFailure { remote, kind });
                }
            }
        }

        if fetched.views.is_empty() {
            return Err(RouteError::AggregateFailure(fetched.failures));
        }

        tracing::info!(
            succeeded = fetched.views.len(),
            failed = fetched.failures.len(),
            "route tables fetched"
        );
        Ok(fetched)
    }

    async fn fetch_one(&self, remote: &RemoteAddress) -> Result<RouteTable, FailureKind> {
        let timeout = self.timeout;
        let mut session = time::timeout(timeout, self.client.connect(remote, timeout))
            .await
            .map_err(|_| ConnectError::Timeout(timeout))??;

        let table = time::timeout(timeout, session.fetch_route_table())
            .await
            .map_err(|_| FetchError::Timeout(timeout))??;
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{AddressFamily, MemoryNodeClient, NodeBehavior, RingPosition, client::MemorySession},
        async_trait::async_trait,
        std::sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
    };

    /// Decrements the in-flight counter once a connect attempt is dropped.
    struct InFlight(Arc<AtomicUsize>);

    impl Drop for InFlight {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Client whose connects never complete, tracking how many overlap.
    #[derive(Default)]
    struct CountingClient {
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl NodeClient for CountingClient {
        type Session = MemorySession;

        async fn connect(
            &self,
            _remote: &RemoteAddress,
            _timeout: Duration,
        ) -> Result<Self::Session, ConnectError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let _guard = InFlight(self.in_flight.clone());
            future::pending().await
        }
    }

    fn remote(port: u16) -> RemoteAddress {
        RemoteAddress::new("10.0.0.1", port, AddressFamily::Inet)
    }

    fn table(host: &str) -> RouteTable {
        let mut table = RouteTable::new();
        table.assign(1, RingPosition::from_u64(0), RingPosition::from_u64(10), host);
        table
    }

    #[test]
    fn parallelism_bounds() {
        let fetcher = RouteTableFetcher::new(MemoryNodeClient::new());
        assert_eq!(fetcher.parallelism(3), 3);
        assert_eq!(fetcher.parallelism(0), 1);
        assert_eq!(fetcher.parallelism(1000), MAX_PARALLEL_FETCHES);

        let fetcher = fetcher.with_max_parallel(2);
        assert_eq!(fetcher.parallelism(10), 2);

        let fetcher = fetcher.with_max_parallel(0);
        assert_eq!(fetcher.parallelism(10), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn parallelism_is_enforced() {
        let client = CountingClient::default();
        let peak = client.peak.clone();
        let in_flight = client.in_flight.clone();
        let fetcher = RouteTableFetcher::new(client)
            .with_timeout(Duration::from_secs(1))
            .with_max_parallel(2);

        let remotes: Vec<_> = (1..=5).map(remote).collect();
        let result = fetcher.fetch(&remotes, &Cancellation::never()).await;
        match result {
            Err(RouteError::AggregateFailure(failures)) => {
                assert_eq!(failures.len(), 5);
                assert!(failures.iter().all(|f| f.kind.is_timeout()));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fetch_runs_on_spawned_task() {
        let client = MemoryNodeClient::new().with_node(remote(1), NodeBehavior::Serve(table("a")));
        let fetcher = Arc::new(RouteTableFetcher::new(client));

        let task = tokio::spawn({
            let fetcher = fetcher.clone();
            async move { fetcher.fetch(&[remote(1)], &Cancellation::never()).await }
        });
        let fetched = task.await.unwrap().unwrap();
        assert_eq!(fetched.views.len(), 1);
    }

    #[tokio::test]
    async fn no_remotes() {
        let fetcher = RouteTableFetcher::new(MemoryNodeClient::new());
        let result = fetcher.fetch(&[], &Cancellation::never()).await;
        assert!(matches!(result, Err(RouteError::NoRemotes)));
    }

    #[tokio::test]
    async fn duplicates_are_polled_once() {
        let client = MemoryNodeClient::new().with_node(remote(1), NodeBehavior::Serve(table("a")));
        let fetcher = RouteTableFetcher::new(client.clone());

        let fetched = fetcher
            .fetch(&[remote(1), remote(1), remote(1)], &Cancellation::never())
            .await
            .unwrap();
        assert_eq!(fetched.views.len(), 1);
        assert_eq!(client.attempts(&remote(1)), 1);
    }

    #[tokio::test]
    async fn partial_failure() {
        let client = MemoryNodeClient::new()
            .with_node(remote(1), NodeBehavior::Serve(table("a")))
            .with_node(remote(2), NodeBehavior::Refuse)
            .with_node(
                remote(3),
                NodeBehavior::FailFetch(FetchError::Protocol("garbage".to_string())),
            );
        let fetcher = RouteTableFetcher::new(client);

        let fetched = fetcher
            .fetch(&[remote(1), remote(2), remote(3)], &Cancellation::never())
            .await
            .unwrap();
        assert_eq!(fetched.views, vec![NodeView {
            remote: remote(1),
            table: table("a"),
        }]);

        let mut failures = fetched.failures.clone();
        failures.sort_by_key(|f| f.remote.port());
        assert_eq!(failures, vec![
            RemoteFailure {
                remote: remote(2),
                kind: ConnectError::Refused.into(),
            },
            RemoteFailure {
                remote: remote(3),
                kind: FetchError::Protocol("garbage".to_string()).into(),
            },
        ]);
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_are_failures() {
        let client = MemoryNodeClient::new()
            .with_node(remote(1), NodeBehavior::Unresponsive)
            .with_node(remote(2), NodeBehavior::Stall)
            .with_node(remote(3), NodeBehavior::Serve(table("c")));
        let fetcher = RouteTableFetcher::new(client).with_timeout(Duration::from_millis(500));

        let fetched = fetcher
            .fetch(&[remote(1), remote(2), remote(3)], &Cancellation::never())
            .await
            .unwrap();
        assert_eq!(fetched.views.len(), 1);
        assert_eq!(fetched.failures.len(), 2);
        assert!(fetched.failures.iter().all(|f| f.kind.is_timeout()));
    }

    #[tokio::test]
    async fn all_failed() {
        let fetcher = RouteTableFetcher::new(MemoryNodeClient::new());
        let result = fetcher
            .fetch(&[remote(1), remote(2)], &Cancellation::never())
            .await;
        match result {
            Err(RouteError::AggregateFailure(failures)) => assert_eq!(failures.len(), 2),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation() {
        let client = MemoryNodeClient::new().with_node(remote(1), NodeBehavior::Unresponsive);
        let fetcher = RouteTableFetcher::new(client).with_timeout(Duration::from_secs(3600));

        let (handle, cancel) = Cancellation::new();
        assert!(!cancel.is_cancelled());
        tokio::spawn(async move {
            time::sleep(Duration::from_secs(1)).await;
            handle.cancel();
        });

        let result = fetcher.fetch(&[remote(1)], &cancel).await;
        assert!(matches!(result, Err(RouteError::Cancelled)));
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_before_dispatch() {
        let client = MemoryNodeClient::new().with_node(remote(1), NodeBehavior::Serve(table("a")));
        let fetcher = RouteTableFetcher::new(client.clone());

        let (handle, cancel) = Cancellation::new();
        handle.cancel();
        let result = fetcher.fetch(&[remote(1)], &cancel).await;
        assert!(matches!(result, Err(RouteError::Cancelled)));
        assert_eq!(client.attempts(&remote(1)), 0);
    }
}
