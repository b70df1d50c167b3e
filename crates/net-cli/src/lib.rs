//! Guest Network CLI
//!
//! Command-line front end of the guest network engine: detect which network
//! manager owns the primary NIC, reconcile its configuration from a metadata
//! snapshot, roll engine-written files back, and report what is installed.

pub mod commands;
pub mod context;

#[cfg(test)]
mod tests;
