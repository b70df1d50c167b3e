//! Authoritative backend selection

use std::sync::Arc;

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use guest_network_core::Result;

use crate::backend::NetworkBackend;

/// Probe `backends` in order and return the first that manages `iface`.
///
/// `backends` must already be in priority order (see
/// [`BackendRegistry`](crate::backends::BackendRegistry)). The first probe
/// error stops selection; when every probe says no, the result is `None`.
pub async fn select_backend(
    backends: &[Arc<dyn NetworkBackend>],
    cancel: &CancellationToken,
    iface: &str,
) -> Result<Option<Arc<dyn NetworkBackend>>> {
    for backend in backends {
        debug!("Probing {} for {}", backend.name(), iface);
        if backend.is_managing(cancel, iface).await? {
            info!("{} is managing {}", backend.name(), iface);
            return Ok(Some(backend.clone()));
        }
    }

    info!("No network manager is managing {}", iface);
    Ok(None)
}
