use super::{
    Cancellation,
    Conflict,
    ConflictResolver,
    NodeClient,
    OccupancyCalculator,
    OccupancyReport,
    Options,
    RemoteAddress,
    RemoteFailure,
    RouteError,
    RouteResult,
    RouteTable,
    RouteTableFetcher,
    RouteTableMerger,
};

/// What a snapshot reports.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutput {
    /// Share of each group's ring owned by every host.
    Occupancy(OccupancyReport),

    /// Canonical routing table, as merged.
    Routes(RouteTable),
}

/// Point-in-time view of the cluster's ring assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub output: ReportOutput,

    /// Fingerprint of the canonical routing table.
    pub fingerprint: u64,

    /// Remotes that did not answer.
    pub failures: Vec<RemoteFailure>,

    /// Sub-ranges whose owner had to be settled by the conflict resolver.
    pub conflicts: Vec<Conflict>,
}

/// Parses remotes written as `addr:port:family`.
///
/// Fails on the first malformed remote, or if there are none.
pub fn parse_remotes<S: AsRef<str>>(remotes: &[S]) -> RouteResult<Vec<RemoteAddress>> {
    if remotes.is_empty() {
        return Err(RouteError::NoRemotes);
    }
    remotes
        .iter()
        .map(|remote| remote.as_ref().parse().map_err(RouteError::from))
        .collect()
}

/// Takes a snapshot: polls the remotes, merges their routing tables and
/// reports either occupancy or the merged table, depending on
/// [`Options::percentage_mode`].
pub async fn compute<C: NodeClient>(
    client: C,
    remotes: &[RemoteAddress],
    options: &Options,
    cancel: &Cancellation,
) -> RouteResult<Report> {
    compute_with(client, &RouteTableMerger::new(), remotes, options, cancel).await
}

/// Same as [`compute()`], with a custom merger.
pub async fn compute_with<C, R>(
    client: C,
    merger: &RouteTableMerger<R>,
    remotes: &[RemoteAddress],
    options: &Options,
    cancel: &Cancellation,
) -> RouteResult<Report>
where
    C: NodeClient,
    R: ConflictResolver,
{
    let fetched = RouteTableFetcher::with_options(client, options)
        .fetch(remotes, cancel)
        .await?;

    let merged = merger.merge(fetched.views.iter().map(|view| &view.table));
    let fingerprint = merged.table.fingerprint();
    tracing::debug!(
        groups = merged.table.groups().count(),
        conflicts = merged.conflicts.len(),
        fingerprint,
        "route tables merged"
    );

    let output = if options.percentage_mode {
        let calculator = OccupancyCalculator::with_base(options.occupancy_base);
        ReportOutput::Occupancy(calculator.compute(&merged.table))
    } else {
        ReportOutput::Routes(merged.table)
    };

    Ok(Report {
        output,
        fingerprint,
        failures: fetched.failures,
        conflicts: merged.conflicts,
    })
}
