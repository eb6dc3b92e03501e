//! Text rendering of snapshots.

use {
    super::{Conflict, OccupancyReport, ReportOutput, RouteTable},
    std::fmt,
};

/// One block per group, hosts by ascending share:
///
/// ```text
/// Group: 1
/// host 10.0.0.1:1025 25.00
/// host 10.0.0.2:1025 75.00
/// ```
///
/// Groups whose ring is only partly assigned mention their coverage.
impl fmt::Display for OccupancyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (group, occupancy) in self.groups() {
            write!(f, "Group: {group}")?;
            if occupancy.coverage() < 100.0 {
                write!(f, " (ring coverage {:.2}%)", occupancy.coverage())?;
            }
            writeln!(f)?;
            for (host, share) in occupancy.ranked() {
                writeln!(f, "host {host} {share:.2}")?;
            }
        }
        Ok(())
    }
}

/// One block per group, ranges in ring order, ids in short form.
impl fmt::Display for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (group, assignments) in self.groups() {
            writeln!(f, "Group: {group}")?;
            for assignment in assignments {
                writeln!(f, "  {} {}", assignment.range, assignment.host)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for ReportOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportOutput::Occupancy(report) => fmt::Display::fmt(report, f),
            ReportOutput::Routes(table) => fmt::Display::fmt(table, f),
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group {} range {} claimed by ", self.group, self.range)?;
        for (i, host) in self.claimants.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{host}")?;
        }
        write!(f, "; assigned to {}", self.winner)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{Host, OccupancyCalculator, RingPosition, RingRange},
    };

    fn quarter(n: u8) -> RingPosition {
        RingPosition::from_prefix(&[n * 0x40])
    }

    #[test]
    fn occupancy_text() {
        let mut table = RouteTable::new();
        table.assign(2, quarter(0), quarter(2), "hostC");
        table.assign(2, quarter(2), quarter(3), "hostB");
        table.assign(2, quarter(3), quarter(0), "hostA");
        table.assign(1, quarter(0), quarter(1), "hostX");

        let report = OccupancyCalculator::new().compute(&table);
        assert_eq!(
            report.to_string(),
            "Group: 1 (ring coverage 25.00%)\n\
             host hostX 100.00\n\
             Group: 2\n\
             host hostA 25.00\n\
             host hostB 25.00\n\
             host hostC 50.00\n"
        );
    }

    #[test]
    fn routes_text() {
        let mut table = RouteTable::new();
        table.assign(1, quarter(1), quarter(0), "hostY");
        table.assign(1, quarter(0), quarter(1), "hostX");
        assert_eq!(
            ReportOutput::Routes(table).to_string(),
            "Group: 1\n\
             \x20 [000000000000, 400000000000) hostX\n\
             \x20 [400000000000, 000000000000) hostY\n"
        );
    }

    #[test]
    fn conflict_text() {
        let conflict = Conflict {
            group: 3,
            range: RingRange::new(quarter(1), quarter(2)).unwrap(),
            claimants: vec![Host::new("a"), Host::new("b")],
            winner: Host::new("a"),
        };
        assert_eq!(
            conflict.to_string(),
            "group 3 range [400000000000, 800000000000) claimed by a, b; assigned to a"
        );
    }
}
