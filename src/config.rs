use {
    super::{DEFAULT_TIMEOUT, OccupancyBase},
    std::time::Duration,
};

/// Options of a routing table snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Budget for connecting to a node, and again for its reply.
    pub timeout_per_node: Duration,

    /// Cap on concurrently polled remotes. Defaults to the number of
    /// remotes, and never exceeds
    /// [`MAX_PARALLEL_FETCHES`](crate::MAX_PARALLEL_FETCHES).
    pub max_parallel_fetches: Option<usize>,

    /// Report occupancy percentages rather than the merged routing table.
    pub percentage_mode: bool,

    pub occupancy_base: OccupancyBase,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout_per_node: DEFAULT_TIMEOUT,
            max_parallel_fetches: None,
            percentage_mode: false,
            occupancy_base: OccupancyBase::Covered,
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout_per_node(mut self, timeout: Duration) -> Self {
        self.timeout_per_node = timeout;
        self
    }

    pub fn with_max_parallel_fetches(mut self, max: usize) -> Self {
        self.max_parallel_fetches = Some(max);
        self
    }

    pub fn with_percentage_mode(mut self, enabled: bool) -> Self {
        self.percentage_mode = enabled;
        self
    }

    pub fn with_occupancy_base(mut self, base: OccupancyBase) -> Self {
        self.occupancy_base = base;
        self
    }
}
