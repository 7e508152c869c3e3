//! Trellis Topology - aggregates Network Diagnostic observations from
//! many Border Routers into one deduplicated view of every mesh.
//!
//! Nodes are keyed by `(partition_id, ext_addr)`: stable across
//! reconnects and RLOC renumbering, distinct across partition
//! reformations. Router↔router links are undirected; parent→child
//! links are directed. All topology is memory-resident and rebuilt —
//! there is no durable store.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod aggregator;
mod records;
mod sample;

pub use aggregator::TopologyAggregator;
pub use records::{
    ChildLinkRecord, ChildLinkSnapshot, NodeKey, NodeRecord, RouterLinkRecord,
    RouterLinkSnapshot, TopologySnapshot, TopologyStats,
};
pub use sample::{ChildLinkSample, DiagnosticNode, RouterLinkSample};
