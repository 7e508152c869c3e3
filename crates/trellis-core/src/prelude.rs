//! Convenience re-exports for downstream crates.

pub use crate::addr::{
    AddrClass, Ipv6Prefix, classify, eui64_matches_iid, is_link_local, is_rloc,
    link_local_from_eui64, rloc16_of,
};
pub use crate::error::CoreError;
pub use crate::ident::{ExtAddr, Rloc16, Role};
pub use crate::epoch_secs;
