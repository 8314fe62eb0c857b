//! repack-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered with
//! `REPACK_*` environment variables, opens the SQLite store, starts the
//! screenshot worker and serves the HTTP API.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `admin_password_hash`:
//!
//! ```text
//! cargo run -p repack-server -- --hash-password
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use rand_core::OsRng;
use repack_api::{AppState, AuthConfig};
use repack_core::screenshot::Screenshotter;
use repack_remote::{HttpProbe, MshotsClient};
use repack_server::{ServerConfig, app, screenshot::ScreenshotWorker};
use repack_store_sqlite::SqliteStore;
use tokio::{net::TcpListener, sync::broadcast};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Capacity of the supporter event channel.
const EVENT_BUFFER: usize = 256;

#[derive(Parser)]
#[command(author, version, about = "RePack telemetry server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
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

  if cli.hash_password {
    let password = read_password()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("REPACK").separator("__"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  if server_cfg.admin_password_hash.is_empty() {
    tracing::warn!("admin_password_hash is not set; admin endpoints are disabled");
  }

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?,
  );

  let probe = HttpProbe::new(server_cfg.public_url.clone(), server_cfg.probe_timeout())
    .context("failed to build probe client")?;
  let shots_cfg = &server_cfg.screenshot;
  let mshots = MshotsClient::new(&shots_cfg.endpoint, shots_cfg.width, shots_cfg.timeout())
    .context("failed to build screenshot client")?;

  let (events, events_rx) = broadcast::channel(EVENT_BUFFER);
  let worker = ScreenshotWorker::new(Screenshotter::new(
    store.clone(),
    Arc::new(mshots),
    shots_cfg.retry_policy(),
  ));
  let worker = tokio::spawn(worker.run(events_rx));

  let state = AppState::new(
    store,
    Arc::new(probe),
    events,
    AuthConfig {
      username:      server_cfg.admin_username.clone(),
      password_hash: server_cfg.admin_password_hash.clone(),
    },
  );

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app(state))
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  // Dropping the router dropped the last event sender; the worker exits.
  worker.await.context("screenshot worker panicked")?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!("failed to listen for ctrl-c: {e}");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}

/// Read a password line from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\r', '\n']).to_owned())
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
