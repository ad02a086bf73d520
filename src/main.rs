//! License activation server binary.
//!
//! Usage:
//!   keygate --port 8080 --db licenses.db --admin-token <token>
//!
//! The admin token may also come from the `ADMIN_TOKEN` environment
//! variable; with neither set the admin endpoints stay locked and only
//! `/validate` and `/healthz` are usable.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use keygate::{build_router, AppState, SqliteStore};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "keygate")]
#[command(about = "License activation and device-binding server")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Path to the SQLite database file
    #[arg(short, long, default_value = "licenses.db")]
    db: PathBuf,

    /// Admin capability token (falls back to the ADMIN_TOKEN env var)
    #[arg(long)]
    admin_token: Option<String>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("keygate starting...");

    let store = SqliteStore::open(&args.db)
        .with_context(|| format!("failed to open license store at {}", args.db.display()))?;

    let admin_token = args
        .admin_token
        .or_else(|| std::env::var("ADMIN_TOKEN").ok());
    let state = Arc::new(AppState::new(Arc::new(store), admin_token));

    if state.admin_token.is_none() {
        warn!("no admin token configured; admin endpoints will reject all requests");
    }

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port))
        .await
        .with_context(|| format!("failed to bind port {}", args.port))?;

    info!("listening on port {} (db: {})", args.port, args.db.display());
    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}
