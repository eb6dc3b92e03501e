use {
    super::{GroupId, Host, RingSpan, RouteTable},
    serde::{Deserialize, Serialize},
    std::collections::BTreeMap,
};

/// What occupancy percentages are relative to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OccupancyBase {
    /// The part of the ring actually assigned; shares of a group sum to 100.
    #[default]
    Covered,

    /// The whole ring; shares of a group sum to its coverage.
    FullRing,
}

/// Ring occupancy of one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupOccupancy {
    shares: BTreeMap<Host, f64>,
    coverage: f64,
}

impl GroupOccupancy {
    /// Percentage of the ring owned by each host. Hosts owning nothing are
    /// absent.
    pub fn shares(&self) -> &BTreeMap<Host, f64> {
        &self.shares
    }

    pub fn share(&self, host: &str) -> Option<f64> {
        self.shares.get(host).copied()
    }

    /// Percentage of the ring assigned to any host.
    pub fn coverage(&self) -> f64 {
        self.coverage
    }

    /// Sum of all shares.
    pub fn total(&self) -> f64 {
        self.shares.values().sum()
    }

    /// Hosts by ascending share, ties broken by host.
    pub fn ranked(&self) -> Vec<(&Host, f64)> {
        let mut ranked: Vec<_> = self.shares.iter().map(|(host, share)| (host, *share)).collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }
}

/// Ring occupancy of every group with at least one assignment.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OccupancyReport {
    groups: BTreeMap<GroupId, GroupOccupancy>,
}

impl OccupancyReport {
    pub fn group(&self, group: GroupId) -> Option<&GroupOccupancy> {
        self.groups.get(&group)
    }

    /// Iterator over groups, in ascending order.
    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &GroupOccupancy)> {
        self.groups.iter().map(|(group, occupancy)| (*group, occupancy))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Computes how much of each group's ring every host owns.
///
/// Range lengths are summed exactly; floating point only enters when a
/// host's total is divided by the base.
#[derive(Debug, Clone, Copy, Default)]
pub struct OccupancyCalculator {
    base: OccupancyBase,
}

impl OccupancyCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(base: OccupancyBase) -> Self {
        Self { base }
    }

    /// Computes occupancy of a canonical routing table.
    ///
    /// Groups without assignments are left out of the report.
    pub fn compute(&self, table: &RouteTable) -> OccupancyReport {
        let mut report = OccupancyReport::default();
        for (group, assignments) in table.groups() {
            let mut owned: BTreeMap<&Host, RingSpan> = BTreeMap::new();
            for assignment in assignments {
                *owned.entry(&assignment.host).or_default() += assignment.range.span();
            }

            let covered: RingSpan = owned.values().copied().sum();
            if covered.is_zero() {
                continue;
            }

            let base = match self.base {
                OccupancyBase::Covered => covered,
                OccupancyBase::FullRing => RingSpan::RING,
            };
            let shares = owned
                .into_iter()
                .filter(|(_, span)| !span.is_zero())
                .map(|(host, span)| (host.clone(), span.ratio(&base) * 100.0))
                .collect();

            report.groups.insert(group, GroupOccupancy {
                shares,
                coverage: covered.ratio(&RingSpan::RING) * 100.0,
            });
        }
        report
    }
}
