use anyhow::Context;
use clap::{Parser, Subcommand};
use keefill_background::{settings::parse_vault_url, LogIndicator, Settings};
use keefill_popup::{PopupController, PopupView, SETUP_INSTRUCTIONS};
use keefill_protocol::{MessageBus, Request, Secret};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "keefill", about = "Drive the local KeePass vault service")]
struct Args {
    /// Vault service base URL (overrides KEEFILL_VAULT_URL).
    #[arg(long)]
    vault_url: Option<String>,

    /// Where the database path is remembered (overrides KEEFILL_CONFIG_PATH).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Accept the vault's self-signed certificate.
    #[arg(long, default_value_t = false)]
    insecure: bool,

    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show whether the vault is reachable and unlocked.
    Status,
    /// Unlock a database. The master password is read from the terminal.
    Unlock {
        /// Database file; defaults to the remembered path.
        #[arg(long)]
        db_path: Option<String>,
        #[arg(long)]
        keyfile: Option<String>,
    },
    Lock,
    /// List entries the vault matches for a page URL.
    Search { url: String },
    /// Remember a database path for later unlocks.
    SetPath { path: String },
}

fn settings(args: &Args) -> anyhow::Result<Settings> {
    let mut settings = Settings::from_env().context("reading KEEFILL_* settings")?;
    if let Some(url) = args.vault_url.as_deref() {
        settings.vault_url = parse_vault_url(url)?;
    }
    if let Some(path) = args.config.clone() {
        settings.config_path = path;
    }
    if args.insecure {
        settings.accept_invalid_certs = true;
    }
    if let Some(secs) = args.timeout {
        settings.request_timeout = Some(Duration::from_secs(secs));
    }
    Ok(settings)
}

fn print_view(popup: &PopupController<impl MessageBus>) {
    println!("{}", popup.view().title());
    match popup.view() {
        PopupView::Disconnected => println!("{SETUP_INSTRUCTIONS}"),
        PopupView::Locked { db_path } if !db_path.is_empty() => println!("database: {db_path}"),
        _ => {}
    }
}

fn print_message(popup: &PopupController<impl MessageBus>) {
    if let Some(m) = popup.message(Instant::now()) {
        eprintln!("{}", m.text);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = settings(&args)?;
    let background = keefill_background::start(&settings, Arc::new(LogIndicator))
        .await
        .context("starting background")?;
    let mut popup = PopupController::open(background.bus.clone()).await;

    match args.command {
        Command::Status => print_view(&popup),
        Command::Unlock { db_path, keyfile } => {
            if let Some(path) = db_path {
                popup.edit_db_path(&path).await?;
            }
            if let Some(keyfile) = keyfile {
                popup.set_keyfile(&keyfile);
            }
            if !popup.db_path().is_empty() {
                let password = rpassword::prompt_password("Master password: ")?;
                popup.set_password(Secret::new(password));
            }
            let ok = popup.submit_unlock().await;
            print_message(&popup);
            if !ok {
                std::process::exit(1);
            }
        }
        Command::Lock => {
            let ok = popup.submit_lock().await;
            print_message(&popup);
            if !ok {
                std::process::exit(1);
            }
        }
        Command::Search { url } => {
            let reply = background
                .bus
                .request(Request::SearchEntries { url })
                .await?
                .into_entries();
            if !reply.success {
                anyhow::bail!(
                    "search failed: {}",
                    reply.error.as_deref().unwrap_or("vault unavailable")
                );
            }
            for entry in reply.entries {
                println!("{}\t{}\t{}", entry.uuid, entry.title, entry.username);
            }
        }
        Command::SetPath { path } => {
            popup.edit_db_path(&path).await?;
            println!("database: {}", popup.db_path());
        }
    }
    Ok(())
}
