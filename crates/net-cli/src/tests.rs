//! CLI command tests

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    use guest_network_apply::backends::{Netplan, SystemdNetworkd};
    use guest_network_apply::{BackendRegistry, NetworkBackend, NetworkService, Settings};
    use guest_network_core::interface::SysfsInterfaceSource;
    use guest_network_core::lookup::{LookupError, PathLookup};
    use guest_network_core::runner::{format_command, CommandOutput, CommandRunner};
    use guest_network_core::Result as NetworkResult;

    use crate::commands::setup::{format_plan, format_report};
    use crate::commands::status::format_table;
    use crate::commands::{
        read_topology, DetectCommand, RollbackCommand, SetupCommand, StatusCommand,
    };
    use crate::context::AppContext;

    /// Every binary is installed
    struct Installed;

    impl PathLookup for Installed {
        fn lookup(&self, binary: &str) -> std::result::Result<PathBuf, LookupError> {
            Ok(PathBuf::from("/usr/bin").join(binary))
        }
    }

    /// Succeeds on everything, remembering what ran
    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CommandRunner for RecordingRunner {
        fn default_timeout(&self) -> Duration {
            Duration::from_secs(1)
        }

        async fn run_with_timeout(
            &self,
            _cancel: &CancellationToken,
            _limit: Duration,
            program: &str,
            args: &[&str],
        ) -> NetworkResult<CommandOutput> {
            self.calls
                .lock()
                .unwrap()
                .push(format_command(program, args));
            Ok(CommandOutput {
                exit_code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
                duration_ms: 0,
            })
        }
    }

    const SNAPSHOT: &str = r#"{
        "ethernetInterfaces": [
            {"mac": "42:01:0a:80:00:02"},
            {"mac": "42:01:0a:81:00:02", "ipv6s": ["2600:1900:4000::2"]}
        ],
        "vlanInterfaces": {
            "22": {
                "mac": "42:01:0a:82:00:02",
                "parentInterface": "/computeMetadata/v1/instance/network-interfaces/0/",
                "vlan": 22
            }
        }
    }"#;

    struct Fixture {
        root: TempDir,
        netplan_dir: PathBuf,
        networkd_dir: PathBuf,
        runner: Arc<RecordingRunner>,
        context: Arc<AppContext>,
    }

    impl Fixture {
        fn topology(&self) -> PathBuf {
            self.root.path().join("topology.json")
        }
    }

    fn add_nic(sysfs: &Path, name: &str, mac: &str) {
        let dir = sysfs.join(name);
        fs::create_dir_all(dir.join("device")).unwrap();
        fs::write(dir.join("address"), format!("{}\n", mac)).unwrap();
    }

    /// netplan installed with its directory present, so it manages every NIC
    fn fixture() -> Fixture {
        let _ = env_logger::builder().is_test(true).try_init();

        let root = TempDir::new().unwrap();
        let sysfs = root.path().join("sys/class/net");
        add_nic(&sysfs, "ens4", "42:01:0a:80:00:02");
        add_nic(&sysfs, "ens5", "42:01:0a:81:00:02");
        fs::write(root.path().join("topology.json"), SNAPSHOT).unwrap();

        let netplan_dir = root.path().join("etc/netplan");
        let networkd_dir = root.path().join("etc/systemd/network");
        fs::create_dir_all(&netplan_dir).unwrap();

        let runner = Arc::new(RecordingRunner::default());
        let lookup: Arc<dyn PathLookup> = Arc::new(Installed);
        let registry = BackendRegistry::new(vec![
            Arc::new(Netplan::new(
                1,
                Some(netplan_dir.clone()),
                runner.clone(),
                lookup.clone(),
            )) as Arc<dyn NetworkBackend>,
            Arc::new(SystemdNetworkd::new(
                1,
                Some(networkd_dir.clone()),
                runner.clone(),
                lookup,
            )) as Arc<dyn NetworkBackend>,
        ]);
        let service = NetworkService::new(registry, Arc::new(SysfsInterfaceSource::new(&sysfs)));
        let context = Arc::new(AppContext::new(Settings::default(), service));

        Fixture {
            root,
            netplan_dir,
            networkd_dir,
            runner,
            context,
        }
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_read_topology() {
        let fixture = fixture();
        let desired = read_topology(&fixture.topology()).unwrap();

        assert_eq!(desired.ethernet_interfaces.len(), 2);
        assert!(desired.ethernet_interfaces[1].ipv6_enabled());
        assert_eq!(desired.vlan_interfaces[&22].vlan, 22);
    }

    #[test]
    fn test_read_topology_errors() {
        let dir = TempDir::new().unwrap();
        let missing = read_topology(&dir.path().join("missing.json")).unwrap_err();
        assert!(missing.to_string().contains("Failed to read topology file"));

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ not json").unwrap();
        let err = read_topology(&broken).unwrap_err();
        assert!(err.to_string().contains("Failed to parse topology file"));
    }

    #[tokio::test]
    async fn test_detect_primary_from_topology() {
        let fixture = fixture();
        let cmd = DetectCommand::new(fixture.context.clone());

        let iface = cmd
            .target_interface(None, Some(&fixture.topology()))
            .await
            .unwrap();
        assert_eq!(iface, "ens4");
        assert_eq!(cmd.detect(&iface).await.unwrap(), Some("netplan"));

        assert_eq!(
            cmd.target_interface(Some("eth7"), None).await.unwrap(),
            "eth7"
        );
        assert!(cmd.target_interface(None, None).await.is_err());
    }

    #[tokio::test]
    async fn test_setup_writes_and_activates() {
        let fixture = fixture();
        let cmd = SetupCommand::new(fixture.context.clone());

        let report = cmd.run(&fixture.topology()).await.unwrap();

        assert_eq!(report.backend.as_deref(), Some("netplan"));
        assert_eq!(
            names(&fixture.netplan_dir),
            vec![
                "1-ens4-google-guest-agent.yaml",
                "1-ens5-google-guest-agent.yaml",
                "1-gcp.ens4.22-google-guest-agent.yaml",
            ]
        );
        assert!(!fixture.networkd_dir.exists());
        assert_eq!(fixture.runner.calls.lock().unwrap().last().unwrap(), "netplan apply");

        let output = format_report(&report);
        assert!(output.starts_with("Backend: netplan\n"));
        assert!(output.contains("  + 1-ens4-google-guest-agent.yaml (netplan)\n"));
        assert!(output.contains("Activated netplan\n"));

        // Second run changes nothing
        let again = cmd.run(&fixture.topology()).await.unwrap();
        assert!(format_report(&again).contains("Configuration up to date\n"));
    }

    #[tokio::test]
    async fn test_dry_run_leaves_directory_alone() {
        let fixture = fixture();
        let cmd = SetupCommand::new(fixture.context.clone());

        let plan = cmd.plan(&fixture.topology()).await.unwrap().unwrap();
        let output = format_plan(&plan);

        assert!(output.contains("--- 1-ens4-google-guest-agent.yaml (600)\n"));
        assert!(output.contains("--- 1-gcp.ens4.22-google-guest-agent.yaml (600)\n"));
        assert!(names(&fixture.netplan_dir).is_empty());
        assert!(fixture.runner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_then_rollback() {
        let fixture = fixture();
        SetupCommand::new(fixture.context.clone())
            .run(&fixture.topology())
            .await
            .unwrap();

        let statuses = StatusCommand::new(fixture.context.clone())
            .collect()
            .await
            .unwrap();
        assert_eq!(statuses[0].name, "netplan");
        assert_eq!(statuses[0].owned.len(), 3);
        assert!(statuses[1].owned.is_empty());

        let table = format_table(&statuses);
        assert!(table.contains("    1-gcp.ens4.22-google-guest-agent.yaml\n"));

        let reports = RollbackCommand::new(fixture.context.clone())
            .run()
            .await
            .unwrap();
        assert_eq!(reports[0].changes.len(), 3);
        assert!(names(&fixture.netplan_dir).is_empty());
    }

    #[tokio::test]
    async fn test_status_rejects_unknown_format() {
        let fixture = fixture();
        let err = StatusCommand::new(fixture.context.clone())
            .execute("yaml")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Unsupported output format: yaml");
    }

    #[tokio::test]
    async fn test_cancelled_setup() {
        let fixture = fixture();
        fixture.context.cancel.cancel();

        let err = SetupCommand::new(fixture.context.clone())
            .run(&fixture.topology())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Network setup failed");
        assert!(names(&fixture.netplan_dir).is_empty());
    }
}
