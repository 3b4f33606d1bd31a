//! Grimoire
//!
//! HTTP server and batch importer.

use std::fs::File;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use clap::{Parser, Subcommand};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use grimoire_kernel::config::Config;
use grimoire_kernel::importer::{ImportOptions, spells};
use grimoire_kernel::routes;
use grimoire_kernel::state::AppState;

#[derive(Parser)]
#[command(name = "grimoire", version, about = "Game reference API server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API (default).
    Serve,

    /// Load spells from a CSV file, overwriting rows with the same slug.
    ImportSpells {
        /// CSV file to read (default: SPELLS_CSV or data/spells.csv).
        #[arg(long)]
        file: Option<PathBuf>,

        /// Abort when two rows share a slug.
        #[arg(long)]
        reject_collisions: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::ImportSpells {
            file,
            reject_collisions,
        } => {
            let path = file.unwrap_or_else(|| config.spells_csv.clone());
            import_spells(config, path, ImportOptions { reject_collisions }).await
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    info!(port = config.port, "Starting grimoire");

    let state = AppState::new(&config)
        .await
        .context("failed to initialize application state")?;

    let app = routes::router()
        .layer(build_cors_layer(&config))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "Listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

async fn import_spells(config: Config, path: PathBuf, options: ImportOptions) -> Result<()> {
    info!(path = %path.display(), reject_collisions = options.reject_collisions, "Importing spells");

    let file = File::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
    let records = spells::read_records(file)?;

    let state = AppState::new(&config)
        .await
        .context("failed to initialize application state")?;
    let report = spells::import(state.store(), &records, options).await?;

    info!(
        rows = report.rows,
        written = report.written,
        collisions = report.collisions.len(),
        "Spell import complete"
    );
    Ok(())
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];

    if config.cors_allowed_origins.len() == 1 && config.cors_allowed_origins[0] == "*" {
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
