//! Guest network CLI (guest-netctl)

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use guest_netctl::commands::{DetectCommand, RollbackCommand, SetupCommand, StatusCommand};
use guest_netctl::context::AppContext;

#[derive(Parser)]
#[command(name = "guest-netctl")]
#[command(about = "Guest network manager detection and configuration")]
#[command(version)]
#[command(long_about = "
Guest network manager detection and configuration

Detects which network manager (netplan, systemd-networkd, wicked,
NetworkManager or dhclient) is in charge of the primary NIC and keeps its
configuration directory in line with the instance metadata.

Examples:
  guest-netctl detect -i eth0                      # Which manager owns eth0
  guest-netctl detect -t topology.json             # Same, for the primary NIC
  guest-netctl setup -t topology.json --dry-run    # Show files to be written
  guest-netctl setup -t topology.json              # Reconcile and activate
  guest-netctl rollback                            # Remove engine-written files
  guest-netctl status                              # List engine-written files
")]
struct Cli {
    /// Settings file (default: /etc/default/guest-netctl.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'V', long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the network manager in charge of an interface
    Detect {
        /// Interface to probe
        #[arg(short, long)]
        interface: Option<String>,

        /// Metadata snapshot whose primary NIC is probed
        #[arg(short, long)]
        topology: Option<PathBuf>,
    },

    /// Reconcile network configuration with a metadata snapshot
    Setup {
        /// Metadata snapshot (JSON)
        #[arg(short, long)]
        topology: PathBuf,

        /// Print the rendered files without writing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove engine-written files from every network manager
    Rollback,

    /// List engine-written files per network manager
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let result = run(&cli).await;

    match result {
        Ok(()) => {
            if !cli.quiet {
                log::info!("Command completed successfully");
            }
            std::process::exit(0);
        }
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {}", e);

                if cli.verbose || cli.debug {
                    for cause in e.chain().skip(1) {
                        eprintln!("  Caused by: {}", cause);
                    }
                }
            }
            std::process::exit(1);
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let context = AppContext::bootstrap(cli.config.as_deref())?;

    let cancel = context.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling");
            cancel.cancel();
        }
    });

    match &cli.command {
        Commands::Detect {
            interface,
            topology,
        } => {
            DetectCommand::new(context)
                .execute(interface.as_deref(), topology.as_deref())
                .await
        }

        Commands::Setup { topology, dry_run } => {
            SetupCommand::new(context).execute(topology, *dry_run).await
        }

        Commands::Rollback => RollbackCommand::new(context).execute().await,

        Commands::Status { format } => StatusCommand::new(context).execute(format).await,
    }
}
