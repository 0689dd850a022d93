//! Per-source API clients implementing the normalized fetch contract.
//!
//! Each client owns its own request construction and response parsing;
//! the sync layer only sees `(timestamp, values)` rows and the three
//! error classes of the fetch contract.

pub mod fingrid;
pub mod fmi;
pub mod porssisahko;

pub use fingrid::{FingridAuth, FingridClient};
pub use fmi::FmiClient;
pub use porssisahko::PorssisahkoClient;
