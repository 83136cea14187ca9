use clap::Parser;
use keefill_background::mock_vault::{self, MockVault, DEMO_DB_PATH, DEMO_PASSWORD};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Loopback vault with three demo entries (plain HTTP; point KEEFILL_VAULT_URL at it).
#[derive(Parser, Debug)]
#[command(name = "mock_vault")]
struct Args {
    #[arg(long, default_value = "127.0.0.1:5000")]
    addr: String,

    #[arg(long, default_value = DEMO_DB_PATH)]
    db_path: String,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut vault = MockVault::demo();
    vault.db_path = args.db_path;

    eprintln!("unlock with dbPath={} password={DEMO_PASSWORD}", vault.db_path);
    for e in &vault.entries {
        eprintln!("  {} {} ({})", e.uuid, e.title, e.url);
    }

    let listener = TcpListener::bind(&args.addr).await?;
    mock_vault::serve(listener, Arc::new(Mutex::new(vault))).await
}
