//! Relaychain - multi-hop tunneling core, command-line front end

use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use relaychain::config::{Config, LogConfig};
use relaychain::error::Result;
use relaychain::{Route, Stream};

/// Relaychain CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "relaychain", version, about = "Multi-hop tunneling core")]
struct Cli {
    /// Config file path (json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dial an address from this host and relay stdin/stdout over it
    Dial {
        /// tcp, tcp4, tcp6, udp, udp4, udp6
        network: String,
        /// host:port
        addr: String,
    },
    /// Bind a local UDP listener and echo every peer
    Echo {
        /// Listen address, e.g. :9000 or 127.0.0.1:9000
        addr: String,
        #[arg(long, default_value = "udp")]
        network: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    init_tracing(&config.log);

    info!("Relaychain v{} starting...", env!("CARGO_PKG_VERSION"));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        match cli.command {
            Command::Dial { network, addr } => dial(&config, &network, &addr).await,
            Command::Echo { addr, network } => echo(&config, &network, &addr).await,
        }
    })
}

/// Initialize tracing from the log configuration.
///
/// `RUST_LOG`, when set, overrides the configured level and filters.
fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.directives()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match config.format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(io::stderr))
            .init(),
        "compact" => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(io::stderr))
            .init(),
        _ => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(io::stderr))
            .init(),
    }
}

async fn dial(config: &Config, network: &str, addr: &str) -> Result<()> {
    let stream = config.dialer.to_net_dialer().dial(network, addr).await?;
    info!(%network, addr, "connected");

    let (mut reader, mut writer) = tokio::io::split(stream);
    let upload = async {
        tokio::io::copy(&mut tokio::io::stdin(), &mut writer).await?;
        writer.shutdown().await
    };
    let download = async {
        let mut stdout = tokio::io::stdout();
        tokio::io::copy(&mut reader, &mut stdout).await?;
        stdout.flush().await
    };

    tokio::select! {
        r = upload => r?,
        r = download => r?,
    }
    Ok(())
}

async fn echo(config: &Config, network: &str, addr: &str) -> Result<()> {
    let mut route = Route::builder();
    if let Some(interface) = &config.dialer.interface {
        route = route.interface(interface.as_str());
    }
    let route = route.build();

    let listener = route.bind(network, addr, &config.bind.to_bind_options()).await?;
    info!(addr = %listener.local_addr()?, "echo listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "accepted");
                    tokio::spawn(echo_peer(stream, peer.to_string()));
                }
                Err(e) => {
                    error!(error = %e, "accept failed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    listener.close().await
}

async fn echo_peer(mut stream: Stream, peer: String) {
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!(%peer, error = %e, "read failed");
                break;
            }
        };
        if let Err(e) = stream.write_all(&buf[..n]).await {
            warn!(%peer, error = %e, "write failed");
            break;
        }
    }
    debug!(%peer, "peer closed");
}
