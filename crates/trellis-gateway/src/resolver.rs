//! Layered IPv6 → business-name resolution.
//!
//! Resolution order:
//!
//! 1. Direct ML-EID match in the node inventory.
//! 2. RLOC input: find the node currently holding that RLOC16 in the
//!    topology, then resolve any of its ML-EIDs through the inventory.
//! 3. ML-EID not in the inventory but known to the topology: same
//!    indirect path via the node's other ML-EIDs.
//!
//! Nodes that resolve nowhere get a synthesized `unknown-…` name so
//! their events still propagate.

use std::collections::BTreeSet;
use std::net::Ipv6Addr;
use std::sync::Arc;

use tracing::debug;
use trellis_config::NodeInventory;
use trellis_core::addr::rloc16_of;
use trellis_registry::NodeAddressMap;
use trellis_topology::TopologyAggregator;

/// Name resolver over the inventory, the topology, and the dynamic
/// mapping. Cheap to clone; collaborators are shared.
#[derive(Clone)]
pub struct NameResolver {
    inventory: Arc<NodeInventory>,
    topology: Arc<TopologyAggregator>,
    mapping: Arc<NodeAddressMap>,
}

impl NameResolver {
    /// Wire the resolver to its collaborators.
    #[must_use]
    pub fn new(
        inventory: Arc<NodeInventory>,
        topology: Arc<TopologyAggregator>,
        mapping: Arc<NodeAddressMap>,
    ) -> Self {
        Self {
            inventory,
            topology,
            mapping,
        }
    }

    /// Resolve an IPv6 string to a business name, if any layer knows it.
    #[must_use]
    pub fn name_for_ipv6(&self, ipv6: &str) -> Option<String> {
        // Layer 1: direct inventory match.
        if let Some(name) = self.inventory.name_for_address(ipv6) {
            return Some(name);
        }

        let parsed: Ipv6Addr = ipv6.parse().ok()?;

        // Layer 2: RLOC → topology → ML-EID → inventory.
        if let Some(rloc) = rloc16_of(&parsed) {
            let node = self.topology.find_by_rloc16(rloc)?;
            let name = self.name_from_mleids(&node.mleids);
            if name.is_none() {
                debug!(%rloc, "RLOC known to topology but no ML-EID maps to a name");
            }
            return name;
        }

        // Layer 3: unlisted ML-EID → topology sibling ML-EIDs → inventory.
        let node = self.topology.find_by_mleid(ipv6)?;
        self.name_from_mleids(&node.mleids)
    }

    /// First business name any of the ML-EIDs resolves to.
    #[must_use]
    pub fn name_from_mleids(&self, mleids: &BTreeSet<String>) -> Option<String> {
        mleids
            .iter()
            .find_map(|mleid| self.inventory.name_for_address(mleid))
    }

    /// Inventory address for a business name.
    #[must_use]
    pub fn address_for_name(&self, name: &str) -> Option<String> {
        self.inventory.address_for_name(name)
    }

    /// The dynamic mapping this resolver records into.
    #[must_use]
    pub fn mapping(&self) -> &NodeAddressMap {
        &self.mapping
    }

    /// Synthesized placeholder name for an unknown address.
    #[must_use]
    pub fn synthesized_name(ipv6: &str) -> String {
        let tail: String = ipv6
            .chars()
            .rev()
            .take(8)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("unknown-{tail}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing;
    use trellis_topology::DiagnosticNode;

    #[test]
    fn direct_inventory_match() {
        let test = testing::build();
        assert_eq!(
            test.ctx.resolver.name_for_ipv6("FD78:8E78:3BFE:1::ABCD"),
            Some("n01".to_string())
        );
    }

    #[test]
    fn rloc_back_resolution_through_topology() {
        let test = testing::build();
        // Topology learns: node with rloc 0xc400 owns n07's ML-EID.
        test.ctx.topology.upsert_node(
            &DiagnosticNode {
                partition: Some(0x1a2b),
                ext_addr: Some("0123456789abcdef".into()),
                rloc16: Some("0xc400".into()),
                mleids: vec!["fd78:8e78:3bfe:1::7777".into()],
                ..DiagnosticNode::default()
            },
            "BR-001",
        );

        assert_eq!(
            test.ctx
                .resolver
                .name_for_ipv6("fdc7:4097:c896:f63b:0:ff:fe00:c400"),
            Some("n07".to_string())
        );
    }

    #[test]
    fn unlisted_mleid_resolves_via_sibling() {
        let test = testing::build();
        // The node holds two ML-EIDs; only one is in the inventory.
        test.ctx.topology.upsert_node(
            &DiagnosticNode {
                partition: Some(1),
                ext_addr: Some("aabbccddeeff0011".into()),
                mleids: vec![
                    "fd78:8e78:3bfe:1::dead".into(),
                    "fd78:8e78:3bfe:1::7777".into(),
                ],
                ..DiagnosticNode::default()
            },
            "BR-001",
        );

        assert_eq!(
            test.ctx.resolver.name_for_ipv6("fd78:8e78:3bfe:1::dead"),
            Some("n07".to_string())
        );
    }

    #[test]
    fn unknown_everywhere_is_none() {
        let test = testing::build();
        assert_eq!(test.ctx.resolver.name_for_ipv6("fd00::9999"), None);
        assert_eq!(test.ctx.resolver.name_for_ipv6("not-an-address"), None);
    }

    #[test]
    fn synthesized_name_uses_address_tail() {
        assert_eq!(
            NameResolver::synthesized_name("fd78:8e78:3bfe:1::abcd"),
            "unknown-:1::abcd"
        );
        assert_eq!(NameResolver::synthesized_name("fd00::1"), "unknown-fd00::1");
    }
}
