//! Guest Network Apply
//!
//! Detects which network manager owns the primary NIC and reconciles that
//! manager's config directory with the desired topology.

pub mod backend;
pub mod backends;
pub mod reconcile;
pub mod selector;
pub mod service;
pub mod settings;

#[cfg(test)]
mod testing;

pub use backend::NetworkBackend;
pub use backends::BackendRegistry;
pub use guest_shared_types::{ChangeType, ConfigChange};
pub use reconcile::{ArtifactUnit, ReconcileReport, Reconciler};
pub use selector::select_backend;
pub use service::{BackendStatus, NetworkService, SetupPlan, SetupReport};
pub use settings::{Settings, SettingsError, DEFAULT_SETTINGS_PATH};
