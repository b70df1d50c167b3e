//! Guest Network Core
//!
//! Descriptors, error taxonomy and the OS collaborators (command runner,
//! PATH lookup, live interface listing) shared by the guest network engine.

pub mod error;
pub mod interface;
pub mod lookup;
pub mod runner;
pub mod types;
pub mod vlan;

pub use error::NetworkError;
pub use types::*;

/// Result type for network operations
pub type Result<T> = std::result::Result<T, NetworkError>;
