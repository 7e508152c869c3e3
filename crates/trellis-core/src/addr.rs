//! Thread IPv6 address classification.
//!
//! Three address classes matter to the coordinator:
//!
//! - **RLOC/ALOC** — routing/anycast locators whose interface identifier
//!   is `00:00:00:ff:fe:00:<rloc16>`; topology-dependent.
//! - **ML-EID** — mesh-local endpoint identifier: inside the mesh-local
//!   prefix and *not* a RLOC/ALOC; stable across re-parenting.
//! - **Link-local** — `fe80::/10` with the IID derived from the EUI-64
//!   (U/L bit flipped); always reachable within one radio hop.
//!
//! [`classify`] is total: every IPv6 address falls in exactly one class.

use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ident::{ExtAddr, Rloc16};

// ── Prefix ───────────────────────────────────────────────────

/// An IPv6 prefix such as `fd78:8e78:3bfe:1::/64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv6Prefix {
    network: Ipv6Addr,
    len: u8,
}

impl Ipv6Prefix {
    /// Build a prefix from a network address and length.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPrefix`] if `len > 128`.
    pub fn new(network: Ipv6Addr, len: u8) -> Result<Self, CoreError> {
        if len > 128 {
            return Err(CoreError::InvalidPrefix(format!("{network}/{len}")));
        }
        Ok(Self { network, len })
    }

    /// Prefix length in bits.
    #[must_use]
    pub fn len(&self) -> u8 {
        self.len
    }

    /// Whether the prefix is `::/0`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether `addr` falls inside this prefix.
    #[must_use]
    pub fn contains(&self, addr: &Ipv6Addr) -> bool {
        if self.len == 0 {
            return true;
        }
        let shift = 128 - u32::from(self.len);
        (u128::from(*addr) >> shift) == (u128::from(self.network) >> shift)
    }
}

impl fmt::Display for Ipv6Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.len)
    }
}

impl FromStr for Ipv6Prefix {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_part, len_part) = s
            .split_once('/')
            .ok_or_else(|| CoreError::InvalidPrefix(s.to_string()))?;
        let network: Ipv6Addr = addr_part
            .parse()
            .map_err(|_| CoreError::InvalidPrefix(s.to_string()))?;
        let len: u8 = len_part
            .parse()
            .map_err(|_| CoreError::InvalidPrefix(s.to_string()))?;
        Self::new(network, len)
    }
}

impl TryFrom<String> for Ipv6Prefix {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Ipv6Prefix> for String {
    fn from(p: Ipv6Prefix) -> Self {
        p.to_string()
    }
}

// ── Classification ───────────────────────────────────────────

/// The class of a Thread IPv6 address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddrClass {
    /// `fe80::/10`.
    LinkLocal,
    /// RLOC/ALOC locator pattern in the IID.
    Rloc,
    /// Mesh-local, non-locator: the stable endpoint identifier.
    MeshLocalEid,
    /// Anything else (GUA, loopback, multicast, ...).
    Other,
}

/// Whether the address is a RLOC/ALOC locator.
///
/// Locators have the interface identifier `00:00:00:ff:fe:00:xx:xx`;
/// the low 16 bits are the RLOC16.
#[must_use]
pub fn is_rloc(addr: &Ipv6Addr) -> bool {
    let o = addr.octets();
    o[8] == 0 && o[9] == 0 && o[10] == 0 && o[11] == 0xff && o[12] == 0xfe && o[13] == 0
}

/// Extract the RLOC16 embedded in a locator address.
#[must_use]
pub fn rloc16_of(addr: &Ipv6Addr) -> Option<Rloc16> {
    if is_rloc(addr) {
        let o = addr.octets();
        Some(Rloc16(u16::from_be_bytes([o[14], o[15]])))
    } else {
        None
    }
}

/// Whether the address is link-local (`fe80::/10`).
#[must_use]
pub fn is_link_local(addr: &Ipv6Addr) -> bool {
    let o = addr.octets();
    o[0] == 0xfe && (o[1] & 0xc0) == 0x80
}

/// Derive a node's link-local address from its EUI-64.
///
/// The interface identifier is the EUI-64 with the U/L bit flipped,
/// behind the `fe80::` prefix. This is the address a BR can always
/// reach a one-hop neighbor at, regardless of RLOC renumbering.
#[must_use]
pub fn link_local_from_eui64(ext: &ExtAddr) -> Ipv6Addr {
    let iid = ext.to_iid();
    let mut octets = [0u8; 16];
    octets[0] = 0xfe;
    octets[1] = 0x80;
    octets[8..].copy_from_slice(&iid);
    Ipv6Addr::from(octets)
}

/// Whether `addr`'s interface identifier matches the EUI-64.
///
/// Used to associate an ML-EID observation with a known extended
/// address: the lower 64 bits must equal the EUI-64 with the U/L
/// bit flipped.
#[must_use]
pub fn eui64_matches_iid(ext: &ExtAddr, addr: &Ipv6Addr) -> bool {
    addr.octets()[8..] == ext.to_iid()
}

/// Classify an IPv6 address against a mesh-local prefix.
///
/// Total over all inputs; each address falls in exactly one class.
/// Link-local wins over the locator pattern (a `fe80::` address is
/// never routed by RLOC), and the locator pattern wins over the
/// mesh-local prefix (locators live inside it).
#[must_use]
pub fn classify(addr: &Ipv6Addr, mesh_local: &Ipv6Prefix) -> AddrClass {
    if is_link_local(addr) {
        AddrClass::LinkLocal
    } else if is_rloc(addr) {
        AddrClass::Rloc
    } else if mesh_local.contains(addr) {
        AddrClass::MeshLocalEid
    } else {
        AddrClass::Other
    }
}
