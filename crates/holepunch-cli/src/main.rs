//! Holepunch CLI
//!
//! Runs the STUN binding responder and the WebSocket signaling relay, and
//! probes remote responders.

mod config;

use clap::{Args, Parser, Subcommand};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use holepunch_discovery::stun::{BindingClient, BindingResponder, DEFAULT_STUN_PORT, ResponderConfig};
use holepunch_signal::{SignalingConfig, SignalingServer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;

/// Holepunch - public address discovery and signaling for peer-to-peer connections
#[derive(Parser)]
#[command(name = "holepunch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the STUN responder and signaling relay until Ctrl-C
    Serve(ServeArgs),

    /// Ask a STUN server for this host's public address
    Probe {
        /// STUN server as host:port (port defaults to 3478)
        server: String,

        /// Local address to send from
        #[arg(short, long)]
        bind: Option<SocketAddr>,

        /// Response timeout in milliseconds
        #[arg(long, default_value_t = 3000)]
        timeout_ms: u64,
    },

    /// Write the default configuration file
    InitConfig {
        /// Output file (defaults to the standard config path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
struct ServeArgs {
    /// STUN UDP listen address
    #[arg(long)]
    stun_addr: Option<SocketAddr>,

    /// Signaling TCP listen address
    #[arg(long)]
    signal_addr: Option<SocketAddr>,

    /// WebSocket upgrade path
    #[arg(long)]
    path: Option<String>,

    /// Do not run the STUN responder
    #[arg(long)]
    no_stun: bool,

    /// Do not run the signaling relay
    #[arg(long)]
    no_signal: bool,

    /// STUN receive workers
    #[arg(long)]
    workers: Option<usize>,
}

impl ServeArgs {
    /// Overlay command-line flags on file configuration
    fn apply(&self, config: &mut Config) {
        if let Some(addr) = self.stun_addr {
            config.discovery.listen_addr = addr.to_string();
        }
        if let Some(addr) = self.signal_addr {
            config.signaling.listen_addr = addr.to_string();
        }
        if let Some(path) = &self.path {
            config.signaling.path.clone_from(path);
        }
        if let Some(workers) = self.workers {
            config.discovery.workers = workers;
        }
        if self.no_stun {
            config.discovery.enabled = false;
        }
        if self.no_signal {
            config.signaling.enabled = false;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.command, cli.config.as_deref())?;

    // Initialize logging; RUST_LOG wins over flags and file
    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.to_lowercase()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve(args) => {
            args.apply(&mut config);
            config.validate()?;
            serve(&config).await?;
        }
        Commands::Probe {
            server,
            bind,
            timeout_ms,
        } => {
            probe(&server, bind, Duration::from_millis(timeout_ms)).await?;
        }
        Commands::InitConfig { output, force } => {
            init_config(output, force)?;
        }
    }

    Ok(())
}

/// Configuration for `command`
///
/// `init-config` never reads a file, so it can replace a corrupt one.
fn load_config(command: &Commands, explicit: Option<&Path>) -> anyhow::Result<Config> {
    match command {
        Commands::InitConfig { .. } => Ok(Config::default()),
        Commands::Serve(_) | Commands::Probe { .. } => Config::resolve(explicit),
    }
}

/// Run the enabled services until Ctrl-C
async fn serve(config: &Config) -> anyhow::Result<()> {
    let responder = if config.discovery.enabled {
        let responder_config = ResponderConfig {
            workers: config.discovery.workers,
            ..ResponderConfig::default()
        };
        Some(BindingResponder::bind_with_config(config.stun_addr()?, responder_config).await?)
    } else {
        None
    };

    let signaling = if config.signaling.enabled {
        let signaling_config = SignalingConfig {
            path: config.signaling.path.clone(),
        };
        Some(SignalingServer::bind_with_config(config.signal_addr()?, signaling_config).await?)
    } else {
        None
    };

    println!("Holepunch {}", env!("CARGO_PKG_VERSION"));
    if let Some(responder) = &responder {
        println!("STUN:      udp://{}", responder.local_addr()?);
    }
    if let Some(server) = &signaling {
        println!("Signaling: ws://{}{}", server.local_addr()?, config.signaling.path);
    }
    println!("Press Ctrl+C to stop");

    let stun = async {
        match &responder {
            Some(responder) => responder.run().await,
            None => std::future::pending().await,
        }
    };
    let relay = async {
        match &signaling {
            Some(server) => server.run().await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        () = stun => anyhow::bail!("STUN responder stopped unexpectedly"),
        result = relay => {
            result?;
            anyhow::bail!("Signaling relay stopped unexpectedly");
        }
        result = tokio::signal::ctrl_c() => result?,
    }

    info!("Shutting down");
    if let Some(responder) = &responder {
        let stats = responder.stats();
        info!(
            received = stats.received,
            answered = stats.answered,
            malformed = stats.malformed,
            "STUN responder stats"
        );
    }
    if let Some(server) = &signaling {
        info!(peers = server.registry().len().await, "Signaling relay closed");
    }

    Ok(())
}

/// Query a STUN server and print the reflexive address
async fn probe(server: &str, bind: Option<SocketAddr>, timeout: Duration) -> anyhow::Result<()> {
    let server_addr = resolve_server(server).await?;
    let bind = bind.unwrap_or_else(|| {
        if server_addr.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        }
    });

    let mut client = BindingClient::bind(bind).await?;
    client.set_timeout(timeout);
    info!(server = %server_addr, local = %client.local_addr()?, "Sending binding request");

    let public = client.query(server_addr).await?;
    println!("{public}");

    Ok(())
}

/// Resolve `host[:port]`, defaulting to the standard STUN port
async fn resolve_server(server: &str) -> anyhow::Result<SocketAddr> {
    if let Ok(addr) = server.parse::<SocketAddr>() {
        return Ok(addr);
    }
    // Bare IP literal, including IPv6 without brackets
    if let Ok(ip) = server.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_STUN_PORT));
    }

    let target = if server.contains(':') {
        server.to_string()
    } else {
        format!("{server}:{DEFAULT_STUN_PORT}")
    };

    tokio::net::lookup_host(&target)
        .await?
        .next()
        .ok_or_else(|| anyhow::anyhow!("No address found for {target}"))
}

/// Write the default configuration
fn init_config(output: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = output.unwrap_or_else(Config::default_path);

    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    Config::default().save(&path)?;
    println!("Wrote default configuration to {}", path.display());

    Ok(())
}
