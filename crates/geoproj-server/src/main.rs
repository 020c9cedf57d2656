//! geoproj server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered with
//! `GEOPROJ_*` environment variables, opens the SQLite stores and serves the
//! JSON API over HTTP.
//!
//! # Adding a user
//!
//! ```sh
//! echo 'secret' | cargo run -p geoproj-server --bin server -- --add-user alice
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use geoproj_api::{AppState, ServerConfig, auth::hash_password};
use geoproj_core::store::ProjectStore;
use geoproj_ogr::OgrEngine;
use geoproj_store_sqlite::{SqliteSpatialDb, SqliteStore};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "geoproj Shapefile import server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Create a user with a password read from stdin and exit.
  #[arg(long, value_name = "NAME")]
  add_user: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("GEOPROJ"))
    .build()
    .context("failed to read config file")?;

  let mut server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  server_cfg.store_path = expand_tilde(&server_cfg.store_path);
  server_cfg.spatial_dir = expand_tilde(&server_cfg.spatial_dir);
  server_cfg.artifact_dir = expand_tilde(&server_cfg.artifact_dir);
  server_cfg.scratch_dir = server_cfg.scratch_dir.as_deref().map(expand_tilde);

  if let Some(parent) = server_cfg.store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    tokio::fs::create_dir_all(parent)
      .await
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&server_cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", server_cfg.store_path))?;

  // Helper mode: add a user and exit.
  if let Some(username) = cli.add_user {
    let password = read_password()?;
    let hash = hash_password(&password).map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;
    store
      .add_user(&username, &hash)
      .await
      .with_context(|| format!("failed to add user {username:?}"))?;
    println!("added user {username}");
    return Ok(());
  }

  let spatial = SqliteSpatialDb::new(&server_cfg.spatial_dir);
  let engine = OgrEngine::new(&server_cfg.ogrinfo, &server_cfg.ogr2ogr);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  let state = AppState::new(
    Arc::new(store),
    Arc::new(engine),
    Arc::new(spatial),
    server_cfg,
  );
  state
    .workflow
    .sweep_interrupted()
    .await
    .context("failed to sweep pending projects")?;
  let app = geoproj_api::router(state);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read one line from stdin as the new user's password.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  let password = line.trim_end_matches(['\n', '\r']).to_owned();
  anyhow::ensure!(!password.is_empty(), "empty password");
  Ok(password)
}

/// Replace a leading `~` component with `$HOME`.
fn expand_tilde(path: &Path) -> PathBuf {
  match (path.strip_prefix("~"), std::env::var_os("HOME")) {
    (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
    _ => path.to_path_buf(),
  }
}
