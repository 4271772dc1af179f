use anyhow::Result;
use clap::{Parser, Subcommand};
use reqwest::Client;
use rosterscraper::{
    config::Config,
    fetch,
    ingest::{Ingest, IngestOptions, Sleep},
    sheets::GoogleSheets,
    store::Session,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "rosterscraper",
    about = "Load student rosters from linked spreadsheets into SQL"
)]
struct Cli {
    /// JSON or YAML config file
    #[arg(short, long, env = "ROSTER_CONFIG", default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover spreadsheet links and ingest them (default)
    Run,
    /// Print the spreadsheet links found on the page
    Links,
    /// Create the database tables if missing
    InitDb,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    // ─── 2) load config ──────────────────────────────────────────────
    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;
    info!(config = %cli.config.display(), "startup");

    let client = Client::new();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Links => {
            let links =
                fetch::discover_sheet_links(&client, &cfg.page_url, &cfg.link_pattern).await?;
            for link in links {
                println!("{}", link);
            }
        }
        Commands::InitDb => {
            let mut session = Session::connect(&cfg.database_url()?).await?;
            session.ensure_schema().await?;
            session.close().await?;
            info!("schema ready");
        }
        Commands::Run => run(&cfg, client).await?,
    }

    Ok(())
}

async fn run(cfg: &Config, client: Client) -> Result<()> {
    // ─── 3) discover links; failure here is fatal ────────────────────
    let urls = fetch::discover_sheet_links(&client, &cfg.page_url, &cfg.link_pattern).await?;
    if urls.is_empty() {
        warn!(page = %cfg.page_url, "no spreadsheet links found; exit");
        return Ok(());
    }

    // ─── 4) authenticate once, connect once ──────────────────────────
    let sheets = GoogleSheets::from_key_file(client, &cfg.google_sheets_credentials).await?;
    let mut session = Session::connect(&cfg.database_url()?).await?;
    session.ensure_schema().await?;

    // ─── 5) batches ──────────────────────────────────────────────────
    let mut ingest = Ingest::new(session, &sheets, Sleep, IngestOptions::from(cfg))?;
    let summary = ingest.run(&urls).await;
    ingest.close().await?;

    if !summary.sheets_failed.is_empty() {
        warn!(failed = ?summary.sheets_failed, "some sheets were skipped");
    }
    info!(
        sheets = summary.sheets_ok,
        records = summary.records,
        "all done"
    );
    Ok(())
}
