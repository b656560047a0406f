//! tally-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `TALLY_*` environment variables, opens the SQLite ledger, and serves the
//! JSON API over HTTP.

use std::{
  net::SocketAddr,
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use clap::Parser;
use tally_api::{ApiConfig, AppState, api_router};
use tally_core::{guard::Guard, pipeline::Pipeline, screen::InputScreen};
use tally_server::{groq::GroqClient, limiter::ConfiguredLimiter, settings::ServerConfig};
use tally_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Tally natural-language expense ledger")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let cfg = ServerConfig::load(&cli.config).context("failed to load configuration")?;
  tracing::debug!(?cfg, "configuration loaded");
  if cfg.completion.api_key.is_none() {
    tracing::warn!("no completion API key configured; /query will answer 503");
  }

  // Open SQLite store.
  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  store
    .set_busy_timeout(Duration::from_millis(cfg.busy_timeout_ms))
    .await
    .context("failed to set busy timeout")?;

  let completion =
    GroqClient::new(cfg.completion.clone()).context("failed to build completion client")?;
  let limiter = ConfiguredLimiter::from_config(&cfg.rate_limit);

  let pipeline = Pipeline::new(completion, limiter, store)
    .with_guard(Guard::new(cfg.guard.clone()))
    .with_screen(InputScreen::new(&cfg.misuse_words));

  if cfg.trust_forwarded_headers {
    tracing::warn!("Trusting x-caller-id and x-forwarded-for for caller identity");
  }
  let api = ApiConfig { trust_forwarded_headers: cfg.trust_forwarded_headers };
  let app = api_router(AppState::new(Arc::new(pipeline), api)).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", cfg.host, cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
    .await
    .context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
