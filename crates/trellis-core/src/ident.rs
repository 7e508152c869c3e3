//! Node identity types: extended addresses, routing locators, roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ── Extended address (EUI-64) ────────────────────────────────

/// 64-bit hardware-unique identifier of a Thread node.
///
/// Bit 1 of the first byte (the U/L bit) is flipped to form the
/// interface-identifier portion of link-local and ML-EID addresses.
/// Parsed from and displayed as 16 lowercase hex digits; colon
/// separators on input are tolerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExtAddr(pub [u8; 8]);

impl ExtAddr {
    /// The raw 8 bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// The EUI-64 with the U/L bit (bit 1 of byte 0) flipped, as used
    /// in interface identifiers.
    #[must_use]
    pub fn to_iid(self) -> [u8; 8] {
        let mut iid = self.0;
        iid[0] ^= 0x02;
        iid
    }
}

impl fmt::Display for ExtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for ExtAddr {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s.chars().filter(|c| *c != ':').collect();
        let bytes = hex::decode(cleaned.to_ascii_lowercase())
            .map_err(|_| CoreError::InvalidExtAddr(s.to_string()))?;
        let arr: [u8; 8] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidExtAddr(s.to_string()))?;
        Ok(Self(arr))
    }
}

impl TryFrom<String> for ExtAddr {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ExtAddr> for String {
    fn from(addr: ExtAddr) -> Self {
        addr.to_string()
    }
}

// ── RLOC16 ───────────────────────────────────────────────────

/// 16-bit Routing Locator assigned by the Thread network.
///
/// Topology-dependent: it changes when a node is renumbered, so it is
/// a set-valued attribute on node records. Displayed as `0x%04x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rloc16(pub u16);

impl fmt::Display for Rloc16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

impl FromStr for Rloc16 {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        u16::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|_| CoreError::InvalidRloc16(s.to_string()))
    }
}

impl TryFrom<String> for Rloc16 {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Rloc16> for String {
    fn from(r: Rloc16) -> Self {
        r.to_string()
    }
}

// ── Role ─────────────────────────────────────────────────────

/// Thread device role.
///
/// Ordered by "strength": when multiple BRs report conflicting roles
/// for the same node, the display layer picks the maximum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Minimal/sleepy end device attached to a parent.
    Child,
    /// Router-eligible end device.
    Reed,
    /// Active router.
    Router,
    /// Partition leader.
    Leader,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Child => "child",
            Self::Reed => "reed",
            Self::Router => "router",
            Self::Leader => "leader",
        };
        f.write_str(name)
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "child" => Ok(Self::Child),
            "reed" => Ok(Self::Reed),
            "router" => Ok(Self::Router),
            "leader" => Ok(Self::Leader),
            _ => Err(CoreError::UnknownRole(s.to_string())),
        }
    }
}
