//! Per-namespace IP address management for the cluster network controller.
//!
//! Two concerns, kept as separate types so callers can reason about them
//! independently (see spec §4.2):
//!
//! - [`pool::FreeCidrPool`]: the cluster-wide set of not-yet-materialized
//!   per-namespace subnet prefixes, carved once from the cluster CIDR.
//! - [`range::SubnetRange`]: a per-subnet bitmap allocator handing out
//!   individual addresses.

pub mod error;
pub mod mac;
pub mod pool;
pub mod range;

pub use error::{Error, Result};
