//! Wiring for the RePack telemetry server binary: configuration, the HTTP
//! application and the background screenshot worker.

pub mod screenshot;

use std::{path::PathBuf, time::Duration};

use axum::Router;
use repack_api::{ApiStore, AppState, api_router};
use repack_core::{remote::SiteProbe, screenshot::RetryPolicy};
use repack_remote::mshots::{DEFAULT_ENDPOINT, DEFAULT_WIDTH};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `REPACK_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                String,
  #[serde(default = "default_port")]
  pub port:                u16,
  #[serde(default = "default_store_path")]
  pub store_path:          PathBuf,
  /// Sent as the `Referer` of reachability probes.
  #[serde(default = "default_public_url")]
  pub public_url:          String,
  #[serde(default)]
  pub admin_username:      String,
  /// Argon2 PHC string; empty disables the admin endpoints.
  #[serde(default)]
  pub admin_password_hash: String,
  #[serde(default = "default_probe_timeout_secs")]
  pub probe_timeout_secs:  u64,
  #[serde(default)]
  pub screenshot:          ScreenshotConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScreenshotConfig {
  pub endpoint:         String,
  pub width:            u32,
  pub retry_delay_secs: u64,
  pub backoff_factor:   u32,
  pub max_attempts:     u32,
  pub timeout_secs:     u64,
}

impl Default for ScreenshotConfig {
  fn default() -> Self {
    let policy = RetryPolicy::default();
    Self {
      endpoint:         DEFAULT_ENDPOINT.to_owned(),
      width:            DEFAULT_WIDTH,
      retry_delay_secs: policy.initial_delay.as_secs(),
      backoff_factor:   policy.backoff_factor,
      max_attempts:     policy.max_attempts,
      timeout_secs:     60,
    }
  }
}

impl ScreenshotConfig {
  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy {
      initial_delay:  Duration::from_secs(self.retry_delay_secs),
      backoff_factor: self.backoff_factor,
      max_attempts:   self.max_attempts.max(1),
    }
  }

  pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}

impl ServerConfig {
  pub fn probe_timeout(&self) -> Duration { Duration::from_secs(self.probe_timeout_secs) }
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("repack.sqlite3") }

fn default_public_url() -> String { "http://localhost:8080/".to_owned() }

fn default_probe_timeout_secs() -> u64 { 30 }

// ─── Application ─────────────────────────────────────────────────────────────

/// The API router with request tracing.
pub fn app<S, P>(state: AppState<S, P>) -> Router
where
  S: ApiStore,
  P: SiteProbe + 'static,
{
  api_router(state).layer(TraceLayer::new_for_http())
}
