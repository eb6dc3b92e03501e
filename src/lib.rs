//! Ring occupancy diagnostics for consistent-hash partitioned storage.
//!
//! Every replication group of the store splits a 512-bit identifier ring
//! between its nodes. This crate takes a point-in-time snapshot of that
//! assignment:
//!
//! 1. [`RouteTableFetcher`] polls a set of seed nodes concurrently for their
//!    routing tables, through a [`NodeClient`].
//! 2. [`RouteTableMerger`] reconciles the (possibly stale or partial) views
//!    into one canonical table per group.
//! 3. [`OccupancyCalculator`] computes which share of the ring each host
//!    owns.
//!
//! [`compute()`] runs all three steps. Nothing is cached between snapshots
//! and the cluster is never modified.

mod address;
pub mod client;
mod config;
mod error;
mod fetch;
mod hash;
mod merge;
mod occupancy;
mod report;
mod ring;
mod route;
mod snapshot;

pub use {
    address::{AddressFamily, RemoteAddress},
    client::{MemoryNodeClient, NodeBehavior, NodeClient, Session, TcpNodeClient},
    config::Options,
    error::{
        AddressError,
        ConnectError,
        FailureKind,
        FetchError,
        PositionError,
        RemoteFailure,
        RouteError,
        RouteResult,
    },
    fetch::{
        CancelHandle,
        Cancellation,
        DEFAULT_TIMEOUT,
        Fetched,
        MAX_PARALLEL_FETCHES,
        NodeView,
        RouteTableFetcher,
    },
    merge::{Conflict, ConflictResolver, LowestHostWins, Merged, RouteTableMerger},
    occupancy::{GroupOccupancy, OccupancyBase, OccupancyCalculator, OccupancyReport},
    ring::{ID_SIZE, RingPosition, RingRange, RingSpan, ShortPosition},
    route::{Assignment, GroupId, Host, RouteEntry, RouteTable},
    snapshot::{Report, ReportOutput, compute, compute_with, parse_remotes},
};
