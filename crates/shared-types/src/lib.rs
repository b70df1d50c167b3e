//! Guest Network Shared Types
//!
//! Metadata-facing descriptors shared by every guest network crate.

pub mod error;
pub mod events;
pub mod network;

pub use error::{SharedResult, SharedTypeError};
pub use events::{ChangeType, ConfigChange};
pub use network::{DesiredTopology, MacAddr, NetworkInterface, VlanInterface};
