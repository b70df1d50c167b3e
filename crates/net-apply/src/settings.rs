//! Engine settings
//!
//! Loaded from an optional TOML file plus `GUEST_NETWORK_*` environment
//! overrides, e.g. `GUEST_NETWORK_COMMAND_TIMEOUT_SECS=30` or
//! `GUEST_NETWORK_BACKENDS__WICKED__ENABLED=false`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use guest_network_core::interface::DEFAULT_SYSFS_NET_DIR;
use guest_network_core::BackendKind;

/// Default settings file location
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/default/guest-netctl.toml";

const ENV_PREFIX: &str = "GUEST_NETWORK";

/// Settings loading errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Settings file {0:?} does not exist")]
    MissingFile(PathBuf),

    #[error("Invalid setting {field}: {message}")]
    Invalid { field: String, message: String },
}

/// Per-backend overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSettings {
    pub priority: u32,
    /// Directory the backend's artifacts are written to; `None` for
    /// backends that take no files
    pub config_dir: Option<PathBuf>,
    pub enabled: bool,
}

impl BackendSettings {
    fn new(priority: u32, config_dir: Option<&str>) -> Self {
        Self {
            priority,
            config_dir: config_dir.map(PathBuf::from),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendsSettings {
    pub netplan: BackendSettings,
    pub systemd_networkd: BackendSettings,
    pub wicked: BackendSettings,
    pub network_manager: BackendSettings,
    pub dhclient: BackendSettings,
}

impl Default for BackendsSettings {
    fn default() -> Self {
        Self {
            netplan: BackendSettings::new(1, Some("/etc/netplan")),
            systemd_networkd: BackendSettings::new(1, Some("/etc/systemd/network")),
            wicked: BackendSettings::new(2, Some("/etc/sysconfig/network")),
            network_manager: BackendSettings::new(
                3,
                Some("/etc/NetworkManager/system-connections"),
            ),
            dhclient: BackendSettings::new(4, None),
        }
    }
}

impl BackendsSettings {
    pub fn get(&self, kind: BackendKind) -> &BackendSettings {
        match kind {
            BackendKind::Netplan => &self.netplan,
            BackendKind::SystemdNetworkd => &self.systemd_networkd,
            BackendKind::Wicked => &self.wicked,
            BackendKind::NetworkManager => &self.network_manager,
            BackendKind::Dhclient => &self.dhclient,
        }
    }

    pub fn get_mut(&mut self, kind: BackendKind) -> &mut BackendSettings {
        match kind {
            BackendKind::Netplan => &mut self.netplan,
            BackendKind::SystemdNetworkd => &mut self.systemd_networkd,
            BackendKind::Wicked => &mut self.wicked,
            BackendKind::NetworkManager => &mut self.network_manager,
            BackendKind::Dhclient => &mut self.dhclient,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Bound on every external command
    pub command_timeout_secs: u64,
    /// Where live interfaces are listed
    pub sysfs_net_dir: PathBuf,
    pub backends: BackendsSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            command_timeout_secs: 10,
            sysfs_net_dir: PathBuf::from(DEFAULT_SYSFS_NET_DIR),
            backends: BackendsSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path` (which must exist) or, without a path, from
    /// the default location when present. Environment overrides apply in
    /// both cases.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let file = match path {
            Some(path) if !path.exists() => {
                return Err(SettingsError::MissingFile(path.to_path_buf()))
            }
            Some(path) => Some(path.to_path_buf()),
            None => Some(PathBuf::from(DEFAULT_SETTINGS_PATH)).filter(|path| path.exists()),
        };

        // Defaults go in as the lowest layer so files and environment can
        // override single keys of a backend table.
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Settings::default())?);
        if let Some(file) = &file {
            debug!("Loading settings from {:?}", file);
            builder = builder.add_source(config::File::from(file.as_path()));
        }

        let settings: Settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.command_timeout_secs == 0 {
            return Err(SettingsError::Invalid {
                field: "command_timeout_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        for kind in BackendKind::ALL {
            let backend = self.backends.get(kind);
            if matches!(&backend.config_dir, Some(dir) if !dir.is_absolute()) {
                return Err(SettingsError::Invalid {
                    field: format!("backends.{}.config_dir", kind),
                    message: "must be an absolute path".to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.command_timeout(), Duration::from_secs(10));
        assert_eq!(settings.sysfs_net_dir, PathBuf::from("/sys/class/net"));

        let networkd = settings.backends.get(BackendKind::SystemdNetworkd);
        assert_eq!(networkd.priority, 1);
        assert_eq!(
            networkd.config_dir.as_deref(),
            Some(Path::new("/etc/systemd/network"))
        );
        assert!(settings.backends.get(BackendKind::Dhclient).config_dir.is_none());
    }

    #[test]
    fn test_load_from_file_merges_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("guest-netctl.toml");
        std::fs::write(
            &path,
            r#"
command_timeout_secs = 3

[backends.systemd_networkd]
priority = 7
config_dir = "/run/systemd/network"
enabled = true

[backends.wicked]
enabled = false
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.command_timeout_secs, 3);
        assert_eq!(settings.backends.systemd_networkd.priority, 7);
        assert_eq!(
            settings.backends.systemd_networkd.config_dir,
            Some(PathBuf::from("/run/systemd/network"))
        );
        assert!(!settings.backends.wicked.enabled);
        assert_eq!(settings.backends.wicked.priority, 2);
        assert_eq!(
            settings.backends.wicked.config_dir,
            Some(PathBuf::from("/etc/sysconfig/network"))
        );
        assert_eq!(settings.backends.netplan, Settings::default().backends.netplan);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = Settings::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, SettingsError::MissingFile(_)));
    }

    #[test]
    fn test_relative_config_dir_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("guest-netctl.toml");
        std::fs::write(
            &path,
            "[backends.netplan]\nconfig_dir = \"netplan\"\n",
        )
        .unwrap();

        let err = Settings::load(Some(&path)).unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { .. }));
    }
}
