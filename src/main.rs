// Service entry point.
//
// Startup sequence:
// 1. Initialize tracing
// 2. Load config (copying defaults on first run)
// 3. Open the database
// 4. Run the requested mode: `load <data-dir>` imports fixtures and
//    exits; no arguments serves the HTTP API.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use nfl_stats_service::config;
use nfl_stats_service::db::Database;
use nfl_stats_service::loader;
use nfl_stats_service::server::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("NFL stats service starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: port={}, timeout={}ms, db={}",
        config.server.port, config.server.request_timeout_ms, config.database.path
    );

    // 3. Open the database
    let db = Database::open(&config.database.path).context("failed to open database")?;
    info!("Database opened at {}", config.database.path);

    // 4. Dispatch on mode
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("load") => {
            let data_dir = args.get(2).map(String::as_str).unwrap_or("data");
            let summary = loader::load_fixtures(&db, Path::new(data_dir))
                .context("fixture load failed")?;
            info!(
                "Fixture load complete: {} teams, {} players ({} rows skipped)",
                summary.teams, summary.players, summary.skipped
            );
        }
        Some(other) => {
            anyhow::bail!("unknown command `{other}`; usage: nflstats [load <data-dir>]")
        }
        None => {
            let state = AppState {
                store: Arc::new(db),
                request_timeout: Duration::from_millis(config.server.request_timeout_ms),
            };
            server::serve(state, config.server.port).await?;
        }
    }

    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("nfl_stats_service=info,warn")),
        )
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
