//! Inbound diagnostic samples, as deserialized from BR frames.
//!
//! Field names are the wire names. Everything is optional at this
//! layer; the aggregator decides what an acceptable sample is.

use serde::Deserialize;

/// A Network Diagnostic node observation (`diagnostic_node` frame, or
/// synthesized from a `scan_node_result` network view).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiagnosticNode {
    /// Thread partition id.
    pub partition: Option<u32>,
    /// EUI-64 as hex.
    pub ext_addr: Option<String>,
    /// Current RLOC16 as hex.
    pub rloc16: Option<String>,
    /// Reported role (`leader`/`router`/`reed`/`child`).
    pub role: Option<String>,
    /// Every IPv6 the node holds; ML-EIDs are extracted from it.
    #[serde(default)]
    pub ipv6_list: Vec<String>,
    /// Pre-extracted ML-EIDs, when the BR did the classification.
    #[serde(default)]
    pub mleids: Vec<String>,
    /// Whether the node is itself a Border Router.
    #[serde(default)]
    pub is_br: bool,
}

/// A router↔router radio sample (`diagnostic_link` frame, from
/// `meshdiag routerneighbortable`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouterLinkSample {
    /// First endpoint RLOC16.
    pub a_rloc16: Option<String>,
    /// Second endpoint RLOC16.
    pub b_rloc16: Option<String>,
    /// Average RSSI (dBm).
    pub avg_rssi: Option<i32>,
    /// Most recent RSSI (dBm).
    pub last_rssi: Option<i32>,
    /// Link quality indicator.
    pub lqi: Option<u8>,
    /// Link margin in dB.
    pub margin_db: Option<i32>,
    /// Frame error rate.
    pub frame_err: Option<f64>,
    /// Message error rate.
    pub msg_err: Option<f64>,
}

/// A parent→child radio sample (`diagnostic_child` frame, from
/// `meshdiag childtable`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChildLinkSample {
    /// Parent router RLOC16.
    pub parent_rloc16: Option<String>,
    /// Child RLOC16.
    pub child_rloc16: Option<String>,
    /// Child's EUI-64, when the BR resolved it.
    pub child_ext_addr: Option<String>,
    /// Partition the pair belongs to.
    pub partition: Option<u32>,
    /// Child's ML-EIDs.
    #[serde(default)]
    pub child_mleids: Vec<String>,
    /// Average RSSI (dBm).
    pub avg_rssi: Option<i32>,
    /// Most recent RSSI (dBm).
    pub last_rssi: Option<i32>,
    /// Link quality indicator.
    pub lqi: Option<u8>,
    /// Child mode (`rx-on`/`mtd`/`sed`).
    pub mode: Option<String>,
    /// Thread protocol version.
    pub version: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_node_parses_sparse_frames() {
        let node: DiagnosticNode = serde_json::from_str(
            r#"{"partition": 6699, "ext_addr": "0123456789abcdef"}"#,
        )
        .unwrap();
        assert_eq!(node.partition, Some(6699));
        assert!(node.ipv6_list.is_empty());
        assert!(!node.is_br);
    }

    #[test]
    fn child_sample_parses_full_frame() {
        let sample: ChildLinkSample = serde_json::from_str(
            r#"{
                "parent_rloc16": "0xc400", "child_rloc16": "0xc401",
                "child_ext_addr": "aabbccddeeff0011", "partition": 1,
                "child_mleids": ["fd00::1"], "avg_rssi": -60,
                "mode": "sed", "version": 4
            }"#,
        )
        .unwrap();
        assert_eq!(sample.mode.as_deref(), Some("sed"));
        assert_eq!(sample.version, Some(4));
    }
}
