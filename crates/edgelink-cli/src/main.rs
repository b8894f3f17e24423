//! edgelink CLI: user-facing binary for sharing one keyboard and mouse
//! between two machines.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use edgelink_daemon::setup::{default_config_path, load_config, render_config};
use edgelink_daemon::{Backends, Config, Daemon, SessionEnd};
use edgelink_types::{Edge, Role};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Pause before a new session after the link drops.
const RESTART_DELAY: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(
    name = "edgelink",
    about = "Move the pointer off a screen edge to drive the machine next to it",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the edgelink daemon.
    Start {
        /// Path to configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Session role, overriding the config file.
        #[arg(long)]
        role: Option<Role>,

        /// Server host to connect to (client role).
        #[arg(short, long)]
        address: Option<String>,

        /// Side of this screen the peer sits on (top, left, right, bottom).
        #[arg(long)]
        edge: Option<Edge>,

        /// Sharing toggle hotkey, e.g. "control+alt+s". Empty disables it.
        #[arg(long)]
        hotkey: Option<String>,

        /// Start a new session whenever the link drops.
        #[arg(long)]
        restart: bool,
    },

    /// Print the default configuration as TOML.
    Config,

    /// Validate a configuration file.
    CheckConfig {
        /// Path to configuration file (defaults to the standard location).
        path: Option<PathBuf>,
    },
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
struct Overrides {
    role: Option<Role>,
    address: Option<String>,
    edge: Option<Edge>,
    hotkey: Option<String>,
}

impl Overrides {
    fn apply(self, config: &mut Config) {
        if let Some(role) = self.role {
            config.session.role = role;
        }
        if let Some(address) = self.address {
            config.session.address = Some(address);
        }
        if let Some(edge) = self.edge {
            config.edge.edge = edge;
        }
        if let Some(hotkey) = self.hotkey {
            config.sharing.hotkey = hotkey;
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            config,
            role,
            address,
            edge,
            hotkey,
            restart,
        } => {
            let mut config = load_config(config.as_deref())?;
            Overrides {
                role,
                address,
                edge,
                hotkey,
            }
            .apply(&mut config);
            init_tracing(&config.daemon.log_level);
            run(config, restart).await?;
        }
        Commands::Config => {
            print!("{}", render_config(&Config::default())?);
        }
        Commands::CheckConfig { path } => {
            init_tracing("warn");
            let shown = path.clone().unwrap_or_else(default_config_path);
            let config = load_config(path.as_deref())?;
            config
                .validate()
                .with_context(|| format!("{} is not valid", shown.display()))?;
            println!(
                "{}: ok ({} role, peer on the {} edge)",
                shown.display(),
                config.session.role,
                config.edge.edge
            );
        }
    }

    Ok(())
}

async fn run(config: Config, restart: bool) -> anyhow::Result<()> {
    // Platform backends live outside this workspace; run headless.
    let backends = Backends::headless(config.screen.geometry());
    let mut daemon = Daemon::new(config, backends)?;

    let handle = daemon.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            handle.stop().await;
        }
    });

    info!(
        role = %daemon.config().session.role,
        edge = %daemon.config().edge.edge,
        restart,
        "starting edgelink daemon"
    );
    let result = loop {
        match daemon.run().await {
            Ok(SessionEnd::Stopped) => break Ok(()),
            Ok(SessionEnd::LinkLost(reason)) if restart => {
                warn!(%reason, delay = ?RESTART_DELAY, "link lost; starting a new session");
                tokio::time::sleep(RESTART_DELAY).await;
            }
            Ok(SessionEnd::LinkLost(reason)) => {
                warn!(%reason, "link lost");
                break Ok(());
            }
            Err(e) => break Err(e),
        }
    };

    daemon.shutdown().await?;
    Ok(result?)
}
