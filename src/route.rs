use {
    super::{RingPosition, RingRange, hash::Fingerprint},
    serde::{Deserialize, Serialize},
    std::{borrow::Borrow, collections::BTreeMap, fmt},
};

/// Replication group identifier.
pub type GroupId = u32;

/// Identity of a storage node, usually `addr:port`.
///
/// Compared lexicographically; that order is what breaks ownership ties.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Host(String);

impl Host {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Host {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl Borrow<str> for Host {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// One stretch of a group's ring, owned by one host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
    pub group: GroupId,
    pub range: RingRange,
    pub host: Host,
}

/// Route entry as storage nodes report it: the node `host` sits at `id` on
/// the ring of `group`.
///
/// Within a group, the node at `id` owns everything from `id` up to the next
/// id on the ring.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteEntry {
    pub group: GroupId,
    pub id: RingPosition,
    pub host: Host,
}

/// Routing table: ring assignments per group, each group sorted by range
/// start.
///
/// A table fetched from a single node may be stale, partial or overlapping.
/// Tables produced by [`RouteTableMerger`](crate::RouteTableMerger) are
/// canonical: within a group, ranges are pairwise disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteTable {
    groups: BTreeMap<GroupId, Vec<Assignment>>,
}

impl RouteTable {
    /// Creates a new empty routing table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table out of route entries.
    ///
    /// Each entry owns the ring from its id to the next id of the same group,
    /// the last one wrapping around to the first. A lone entry owns the whole
    /// ring. When several entries of a group share an id, the one with the
    /// smallest host is kept.
    pub fn from_entries<I: IntoIterator<Item = RouteEntry>>(entries: I) -> Self {
        let mut by_group: BTreeMap<GroupId, Vec<(RingPosition, Host)>> = BTreeMap::new();
        for entry in entries {
            by_group
                .entry(entry.group)
                .or_default()
                .push((entry.id, entry.host));
        }

        let mut table = Self::new();
        for (group, mut points) in by_group {
            points.sort();
            points.dedup_by(|next, kept| {
                let duplicate = next.0 == kept.0;
                if duplicate {
                    tracing::debug!(group, id = %next.0.short(), host = %next.1, "duplicate route id");
                }
                duplicate
            });

            let assignments = if let [(id, host)] = points.as_slice() {
                vec![Assignment {
                    group,
                    range: RingRange::full(*id),
                    host: host.clone(),
                }]
            } else {
                points
                    .iter()
                    .zip(points.iter().cycle().skip(1))
                    .filter_map(|((start, host), (end, _))| {
                        RingRange::new(*start, *end).map(|range| Assignment {
                            group,
                            range,
                            host: host.clone(),
                        })
                    })
                    .collect()
            };
            table.groups.insert(group, assignments);
        }
        table
    }

    /// Assigns `[start, end)` of the group's ring to `host`.
    ///
    /// Zero-width ranges are dropped, in which case `false` is returned.
    pub fn assign(
        &mut self,
        group: GroupId,
        start: RingPosition,
        end: RingPosition,
        host: impl Into<Host>,
    ) -> bool {
        let host = host.into();
        match RingRange::new(start, end) {
            Some(range) => {
                self.push(Assignment { group, range, host });
                true
            }
            None => {
                tracing::debug!(group, %host, at = %start.short(), "dropping zero-width range");
                false
            }
        }
    }

    /// Adds an assignment, keeping the group sorted by range start.
    pub fn push(&mut self, assignment: Assignment) {
        let assignments = self.groups.entry(assignment.group).or_default();
        let key = (assignment.range.start(), &assignment.host);
        let idx = assignments.partition_point(|a| (a.range.start(), &a.host) <= key);
        assignments.insert(idx, assignment);
    }

    /// Replaces the assignments of a group, which must already be sorted.
    pub(crate) fn insert_group(&mut self, group: GroupId, assignments: Vec<Assignment>) {
        self.groups.insert(group, assignments);
    }

    /// Assignments of a group, sorted by range start.
    pub fn group(&self, group: GroupId) -> Option<&[Assignment]> {
        self.groups.get(&group).map(Vec::as_slice)
    }

    /// Iterator over groups and their assignments, in ascending group order.
    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &[Assignment])> {
        self.groups
            .iter()
            .map(|(group, assignments)| (*group, assignments.as_slice()))
    }

    /// Iterator over all assignments of all groups.
    pub fn assignments(&self) -> impl Iterator<Item = &Assignment> {
        self.groups.values().flatten()
    }

    /// Total number of assignments.
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks that no two ranges of the group overlap.
    pub fn is_disjoint(&self, group: GroupId) -> bool {
        let Some(assignments) = self.groups.get(&group) else {
            return true;
        };
        match assignments.as_slice() {
            [first, .., last] => {
                // Sorted by start: each range must end before the next one
                // starts, and only the last one may wrap around zero.
                let ordered = assignments.windows(2).all(|pair| {
                    let (a, b) = (&pair[0].range, &pair[1].range);
                    !a.wraps() && a.end() <= b.start()
                });
                ordered
                    && !last.range.is_full()
                    && (!last.range.wraps() || last.range.end() <= first.range.start())
            }
            _ => true,
        }
    }

    /// Stable digest of the table.
    ///
    /// Two tables with the same assignments have the same fingerprint,
    /// regardless of which nodes they were assembled from or which machine
    /// computed it. Each group is encoded as its id and assignment count,
    /// followed by every assignment's start, end and host.
    pub fn fingerprint(&self) -> u64 {
        let mut fp = Fingerprint::new();
        for (group, assignments) in self.groups() {
            fp.write_u32(group);
            fp.write_u32(assignments.len() as u32);
            for assignment in assignments {
                fp.write_bytes(assignment.range.start().as_bytes());
                fp.write_bytes(assignment.range.end().as_bytes());
                fp.write_str(assignment.host.as_str());
            }
        }
        fp.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(v: u64) -> RingPosition {
        RingPosition::from_u64(v)
    }

    fn entry(group: GroupId, id: u64, host: &str) -> RouteEntry {
        RouteEntry {
            group,
            id: at(id),
            host: host.into(),
        }
    }

    #[test]
    fn assign_keeps_order() {
        let mut table = RouteTable::new();
        assert!(table.assign(1, at(50), at(100), "hostY"));
        assert!(table.assign(1, at(0), at(50), "hostX"));
        assert!(!table.assign(1, at(70), at(70), "hostZ"));

        let group = table.group(1).unwrap();
        assert_eq!(group.len(), 2);
        assert_eq!(group[0].host.as_str(), "hostX");
        assert_eq!(group[1].host.as_str(), "hostY");
        assert!(table.is_disjoint(1));
        assert!(table.group(2).is_none());
    }

    #[test]
    fn entries_to_ranges() {
        let table = RouteTable::from_entries(vec![
            entry(1, 300, "c"),
            entry(1, 100, "a"),
            entry(1, 200, "b"),
            entry(2, 42, "solo"),
        ]);

        let group = table.group(1).unwrap();
        let ranges: Vec<_> = group
            .iter()
            .map(|a| (*a.range.start(), *a.range.end(), a.host.as_str()))
            .collect();
        assert_eq!(
            ranges,
            vec![
                (at(100), at(200), "a"),
                (at(200), at(300), "b"),
                (at(300), at(100), "c"),
            ]
        );
        assert!(table.is_disjoint(1));

        let solo = table.group(2).unwrap();
        assert_eq!(solo.len(), 1);
        assert!(solo[0].range.is_full());
    }

    #[test]
    fn duplicate_ids_keep_smallest_host() {
        let table = RouteTable::from_entries(vec![
            entry(1, 100, "zed"),
            entry(1, 100, "alpha"),
            entry(1, 200, "beta"),
        ]);
        let group = table.group(1).unwrap();
        assert_eq!(group.len(), 2);
        assert_eq!(group[0].host.as_str(), "alpha");
    }

    #[test]
    fn overlap_detection() {
        let mut table = RouteTable::new();
        table.assign(1, at(0), at(50), "a");
        table.assign(1, at(40), at(60), "b");
        assert!(!table.is_disjoint(1));

        let mut wrapping = RouteTable::new();
        wrapping.assign(1, at(10), at(50), "a");
        wrapping.assign(1, at(50), at(20), "b");
        assert!(!wrapping.is_disjoint(1));

        let mut fine = RouteTable::new();
        fine.assign(1, at(10), at(50), "a");
        fine.assign(1, at(50), at(10), "b");
        assert!(fine.is_disjoint(1));
    }

    #[test]
    fn fingerprint_tracks_content() {
        let mut a = RouteTable::new();
        a.assign(1, at(0), at(50), "x");
        a.assign(1, at(50), at(100), "y");

        let mut b = RouteTable::new();
        b.assign(1, at(50), at(100), "y");
        b.assign(1, at(0), at(50), "x");
        assert_eq!(a.fingerprint(), b.fingerprint());

        b.assign(2, at(0), at(1), "x");
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_is_pinned() {
        let mut table = RouteTable::new();
        table.assign(1, at(0), at(50), "hostX");
        table.assign(1, at(50), at(100), "hostY");
        assert_eq!(table.fingerprint(), 0x8251_9fa1_fc16_8480);

        // An empty group still counts.
        let mut with_empty = table.clone();
        with_empty.insert_group(7, Vec::new());
        assert_ne!(with_empty.fingerprint(), table.fingerprint());
    }
}
