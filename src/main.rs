//! Tilegate server binary.
//!
//! Serves every `--pipeline` with the local backend, sharing one store
//! pool between them.
//!
//! ```text
//! tilegate --port 8080 --alias s1=zk1:2181/hbase --pipeline heat --pipeline count
//! RUST_LOG=tilegate=debug tilegate
//! ```

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tilegate::backend::LocalBackend;
use tilegate::gateway::options::{DEFAULT_HOST, DEFAULT_PORT};
use tilegate::transport::dispatcher::{DEFAULT_MAX_FRAME_SIZE, DEFAULT_MAX_IN_FLIGHT};
use tilegate::{Gateway, Result};

// ============================================================================
// Arguments
// ============================================================================

/// WebSocket gateway for tile and metadata generation.
#[derive(Parser, Debug)]
#[command(name = "tilegate", version)]
struct Args {
    /// Host or address to listen on.
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Store alias in `alias=store` form. Repeatable.
    #[arg(long = "alias", value_name = "ALIAS=STORE")]
    aliases: Vec<String>,

    /// Pipeline to serve. Repeatable; the first one is the default.
    #[arg(long = "pipeline", value_name = "NAME", default_values_t = [String::from("default")])]
    pipelines: Vec<String>,

    /// Largest inbound frame in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    max_frame_size: usize,

    /// Seconds allowed for writing one response.
    #[arg(long, default_value_t = 10)]
    write_timeout_secs: u64,

    /// Seconds a client may take to finish the upgrade handshake.
    #[arg(long, default_value_t = 10)]
    handshake_timeout_secs: u64,

    /// Requests handled at once per session.
    #[arg(long, default_value_t = DEFAULT_MAX_IN_FLIGHT)]
    max_in_flight: usize,

    /// Seconds to wait for open sessions on shutdown.
    #[arg(long, default_value_t = 5)]
    grace_secs: u64,
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let stores = LocalBackend::store_pool();

    let mut builder = Gateway::builder()
        .host(args.host)
        .port(args.port)
        .max_frame_size(args.max_frame_size)
        .write_timeout(Duration::from_secs(args.write_timeout_secs))
        .handshake_timeout(Duration::from_secs(args.handshake_timeout_secs))
        .max_in_flight(args.max_in_flight);

    for alias in args.aliases {
        builder = builder.alias(alias);
    }
    for name in args.pipelines {
        builder = builder.pipeline(name, Arc::new(LocalBackend::new(Arc::clone(&stores))));
    }

    let gateway = builder.bind().await?;
    info!(
        addr = %gateway.local_addr(),
        pipelines = ?gateway.registry().pipeline_names(),
        "Serving"
    );

    tokio::signal::ctrl_c().await?;
    gateway.shutdown(Duration::from_secs(args.grace_secs)).await;

    Ok(())
}

/// Initializes tracing from `RUST_LOG`, defaulting to `info`.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
