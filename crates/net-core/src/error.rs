//! Error types for network operations

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for network operations
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Probe failures keep the command's stderr as the whole message
    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("System error: {0}")]
    System(#[from] SystemError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl NetworkError {
    /// Whether the pass was aborted by its cancellation token
    pub fn is_cancelled(&self) -> bool {
        matches!(self, NetworkError::System(SystemError::Cancelled { .. }))
    }
}

/// Backend probe anomalies. Absence of a backend is never one of these.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("error looking up {binary} path: {message}")]
    Lookup { binary: String, message: String },

    #[error("error checking {binary} version: {stderr}")]
    Version { binary: String, stderr: String },

    #[error("failed to check {backend} network status: {stderr}")]
    Status { backend: String, stderr: String },

    #[error("could not determine interface state, one of [{}] was not present", .keys.join(" "))]
    MissingStateKeys { keys: Vec<String> },

    #[error("unexpected output from {command}: {message}")]
    MalformedOutput { command: String, message: String },
}

/// Errors scoped to a single interface or VLAN descriptor
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("invalid VLAN parent interface reference: {reference}")]
    InvalidParentReference { reference: String },

    #[error("VLAN {tag} parent index {index} is out of range ({count} ethernet interfaces)")]
    ParentIndexOutOfRange { tag: u16, index: usize, count: usize },

    #[error("invalid MAC address: {mac}")]
    InvalidMac { mac: String },

    #[error("no live interface found with MAC address {mac}")]
    NoInterfaceForMac { mac: String },

    #[error("MAC address {mac} matches several interfaces: {}", .names.join(", "))]
    AmbiguousMac { mac: String, names: Vec<String> },

    #[error("invalid VLAN tag: {tag}")]
    InvalidVlanTag { tag: u16 },

    #[error("Invalid interface name: {name}")]
    InvalidInterfaceName { name: String },
}

/// Configuration parsing and generation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}

/// System operation errors
#[derive(Debug, Error)]
pub enum SystemError {
    #[error("failed to execute {command}: {message}")]
    CommandSpawn { command: String, message: String },

    #[error("{command} timed out after {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("{operation} was cancelled")]
    Cancelled { operation: String },

    #[error("failed to create config directory {path:?}: {source}")]
    ConfigDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write config file {path:?}: {source}")]
    ConfigWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to delete config file {path:?}: {source}")]
    ConfigDelete {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to list interfaces in {path:?}: {source}")]
    InterfaceListing {
        path: PathBuf,
        source: std::io::Error,
    },
}
