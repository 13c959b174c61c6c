//! MediSync API server.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client Request
//!   ──────────────▶ request id ─▶ trace ─▶ CORS ─▶ timeout / body limit
//!                                                        │
//!                        /health ◀───────────────────────┤
//!                                                        ▼
//!                                               ┌────────────────┐
//!                                               │  AccessGuard   │──deny──▶ audit log + 403
//!                                               └───────┬────────┘
//!                                                       ▼
//!                   /api/{collection}        /ws/notifications
//!                           │                        │
//!                  QueryResolver → merge             │
//!                           │                        │
//!                    store::list ◀── MemoryStore     │
//!                           │                        │
//!                   PUT adherence-logs ──▶ NotificationHub
//! ```

use std::path::PathBuf;

use clap::Parser;

use medisync_api::lifecycle::startup;

#[derive(Parser)]
#[command(name = "medisync-api")]
#[command(about = "MediSync REST API server", long_about = None)]
struct Args {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = startup::bootstrap(args.config.as_deref())?;
    tracing::info!("medisync-api v{} starting", env!("CARGO_PKG_VERSION"));

    startup::run(config).await?;
    Ok(())
}
