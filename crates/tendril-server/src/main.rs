//! tendril-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite story store and the filesystem artifact tree, and serves the
//! moderation and submission API over HTTP.

use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use tendril_core::random::OsRandomSource;
use tendril_engine::Engine;
use tendril_publish::{FsArtifactStore, Publisher, SiteConfig};
use tendril_server::{auth::StaticTokenVerifier, AppState, ServerConfig};
use tendril_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Tendril story platform server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: std::path::PathBuf,
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

  // Load configuration: defaults, then file, then TENDRIL_* environment.
  let settings = config::Config::builder()
    .set_default("host", "127.0.0.1")?
    .set_default("port", 8080)?
    .set_default("store_path", "tendril.db")?
    .set_default("artifact_dir", "public")?
    .set_default("site_title", "Tendril")?
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("TENDRIL"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Open the story store.
  let store = SqliteStore::open(&server_cfg.store_path)
    .await
    .with_context(|| {
      format!("failed to open store at {:?}", server_cfg.store_path)
    })?;

  // Build application state.
  let engine = Engine::new(store.clone(), Arc::new(OsRandomSource));
  let publisher = Publisher::new(
    store.clone(),
    FsArtifactStore::new(&server_cfg.artifact_dir),
    SiteConfig {
      site_title: server_cfg.site_title.clone(),
      cdn_host:   server_cfg.cdn_host.clone(),
    },
  );
  let verifier =
    StaticTokenVerifier::new(server_cfg.moderator_tokens.clone());

  let state = AppState {
    engine,
    publisher: Arc::new(publisher),
    verifier: Arc::new(verifier),
  };

  let app = tendril_server::router(state).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
