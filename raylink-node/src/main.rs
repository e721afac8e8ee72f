//! raylink node: entry point.
//!
//! ```text
//! raylink-node                          Run with raylink-node.toml (or defaults)
//! raylink-node --config <path>          Load a custom config TOML
//! raylink-node --role capture|display   Override the configured role
//! raylink-node --gen-config             Write default config to stdout
//! raylink-node --gen-config <path>      Write default config to a file
//! ```
//!
//! Operator commands are read from stdin, one per line:
//! `tap X Y`, `click X Y`, `found`, `lost`, `toggle`.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use raylink_core::SessionRole;
use raylink_node::config::NodeConfig;
use raylink_node::service::{RelayNode, spawn_stdin_commands};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "raylink-node", about = "Relay screen taps to remote spatial displays")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "raylink-node.toml")]
    config: PathBuf,

    /// Run as this role instead of the configured one.
    #[arg(long)]
    role: Option<SessionRole>,

    /// Write the default configuration to PATH (or stdout) and exit.
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    gen_config: Option<Option<PathBuf>>,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    match cli.gen_config {
        Some(Some(path)) => {
            NodeConfig::write_default(&path)?;
            println!("wrote default config to {}", path.display());
            return Ok(());
        }
        Some(None) => {
            let text = toml::to_string_pretty(&NodeConfig::default())?;
            println!("{text}");
            return Ok(());
        }
        None => {}
    }

    let mut config = NodeConfig::load(&cli.config);
    if let Some(role) = cli.role {
        config.node.role = role;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("raylink-node v{}", env!("CARGO_PKG_VERSION"));
    info!("role: {} ({})", config.node.role, config.node.name);
    info!("endpoint: {}", config.connection_info());
    if config.node.role == SessionRole::Capture {
        info!("target: {}", config.capture.target_id);
        info!("tick: {} ms", config.capture.tick_ms);
    }

    let node = RelayNode::new(config);
    let stop = node.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    node.run(spawn_stdin_commands()).await?;

    Ok(())
}
