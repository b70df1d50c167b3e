//! PATH lookup for backend control binaries

use std::path::PathBuf;

use thiserror::Error;

/// Lookup failure. `NotFound` is an absence signal, anything else is an
/// anomaly the probes surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("executable file not found in $PATH")]
    NotFound,

    #[error("{0}")]
    Other(String),
}

impl LookupError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LookupError::NotFound)
    }
}

/// Resolves a binary name to a path
pub trait PathLookup: Send + Sync {
    fn lookup(&self, binary: &str) -> std::result::Result<PathBuf, LookupError>;
}

/// Resolves binaries against the process `PATH`
#[derive(Debug, Clone, Default)]
pub struct SystemPathLookup;

impl PathLookup for SystemPathLookup {
    fn lookup(&self, binary: &str) -> std::result::Result<PathBuf, LookupError> {
        which::which(binary).map_err(|e| match e {
            which::Error::CannotFindBinaryPath => LookupError::NotFound,
            other => LookupError::Other(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_shell() {
        let path = SystemPathLookup.lookup("sh").unwrap();
        assert!(path.ends_with("sh"));
    }

    #[test]
    fn test_missing_binary_is_not_found() {
        let err = SystemPathLookup
            .lookup("guest-netctl-definitely-missing")
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
