
use {
    super::{Assignment, GroupId, Host, RingPosition, RingRange, RouteTable},
    auto_impl::auto_impl,
    std::collections::{BTreeMap, BTreeSet},
};

/// Ownership policy for ring sub-ranges claimed by more than one host.
///
/// Raw views carry no timestamps, so there is no way to tell which claim is
/// the most recent one. The resolver must be deterministic: given the same
/// claimants it must return the same host.
#[auto_impl(&, Box, Arc)]
pub trait ConflictResolver {
    /// Chooses the owner of `range` among `claimants`.
    ///
    /// Claimants are sorted in ascending order, deduplicated, and there are
    /// always at least two of them.
    fn resolve<'a>(&self, group: GroupId, range: &RingRange, claimants: &'a [Host]) -> &'a Host;
}

/// Default resolver: the lexicographically smallest host wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowestHostWins;

impl ConflictResolver for LowestHostWins {
    fn resolve<'a>(&self, _group: GroupId, _range: &RingRange, claimants: &'a [Host]) -> &'a Host {
        &claimants[0]
    }
}

/// Sub-range claimed by several hosts, and how the claim was settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub group: GroupId,
    pub range: RingRange,
    pub claimants: Vec<Host>,
    pub winner: Host,
}

/// Result of a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Merged {
    /// Canonical routing table.
    pub table: RouteTable,

    /// Sub-ranges with conflicting owners, in group and ring order.
    pub conflicts: Vec<Conflict>,
}

/// Reconciles routing tables reported by different nodes into one canonical
/// table.
///
/// For every group, the starts and ends of all ranges reported for it split
/// the ring into elementary sub-ranges. Each sub-range goes to the host
/// claiming it, or, when several hosts do, to the one picked by the
/// [`ConflictResolver`]. Sub-ranges nobody claims are left out.
///
/// Since claimants are collected into a sorted set, the outcome does not
/// depend on the order of the input views.
#[derive(Debug, Clone, Default)]
pub struct RouteTableMerger<R = LowestHostWins> {
    resolver: R,
}

impl RouteTableMerger {
    /// Creates a merger resolving conflicts with [`LowestHostWins`].
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: ConflictResolver> RouteTableMerger<R> {
    /// Creates a merger with a custom conflict resolver.
    pub fn with_resolver(resolver: R) -> Self {
        Self { resolver }
    }

    /// Merges the given views into a canonical routing table.
    ///
    /// Never fails. A group for which no range survives is kept, empty.
    pub fn merge<'a, I>(&self, views: I) -> Merged
    where
        I: IntoIterator<Item = &'a RouteTable>,
    {
        let mut by_group: BTreeMap<GroupId, Vec<&Assignment>> = BTreeMap::new();
        for view in views {
            for (group, assignments) in view.groups() {
                by_group.entry(group).or_default().extend(assignments);
            }
        }

        let mut merged = Merged::default();
        for (group, assignments) in by_group {
            let canonical = self.merge_group(group, &assignments, &mut merged.conflicts);
            if canonical.is_empty() {
                tracing::warn!(group, "no ring range assigned in group");
            }
            merged.table.insert_group(group, canonical);
        }

        debug_assert!(
            merged
                .table
                .groups()
                .all(|(group, _)| merged.table.is_disjoint(group))
        );
        merged
    }

    fn merge_group(
        &self,
        group: GroupId,
        assignments: &[&Assignment],
        conflicts: &mut Vec<Conflict>,
    ) -> Vec<Assignment> {
        let mut boundaries: Vec<RingPosition> = assignments
            .iter()
            .flat_map(|a| [*a.range.start(), *a.range.end()])
            .collect();
        boundaries.sort();
        boundaries.dedup();

        let mut canonical = Vec::with_capacity(boundaries.len());
        for (idx, start) in boundaries.iter().enumerate() {
            // Ends only coincide with starts when a single boundary exists,
            // i.e. every claim is for the full ring.
            let end = boundaries[(idx + 1) % boundaries.len()];
            let range = RingRange::new(*start, end).unwrap_or_else(|| RingRange::full(*start));

            // No boundary falls inside the sub-range, so a claim covering its
            // start covers all of it.
            let claimants: Vec<Host> = assignments
                .iter()
                .filter(|a| a.range.contains(start))
                .map(|a| a.host.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();

            let host = match claimants.len() {
                0 => {
                    tracing::trace!(group, %range, "unassigned sub-range");
                    continue;
                }
                1 => claimants[0].clone(),
                _ => {
                    let winner = self.resolver.resolve(group, &range, &claimants).clone();
                    tracing::warn!(
                        group,
                        %range,
                        claimants = claimants.len(),
                        %winner,
                        "conflicting ring ownership"
                    );
                    conflicts.push(Conflict {
                        group,
                        range,
                        claimants,
                        winner: winner.clone(),
                    });
                    winner
                }
            };

            canonical.push(Assignment { group, range, host });
        }
        canonical
    }
}
