//! HTTP surface of the RePack telemetry server.
//!
//! Exposes an axum [`Router`] backed by any store implementing both
//! [`SupporterStore`] and [`CounterStore`], and any [`SiteProbe`]. Screenshot
//! capture is not done here: accepted submissions and status changes publish a
//! [`SupporterEvent`] on a broadcast channel for a worker to pick up.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/` | Legacy form transport, `action=repack-stats` |
//! | `GET`  | `/community/v1/sites` | Optional `?status=pending\|published\|expired` |
//! | `POST` | `/community/v1/sites` | JSON submission |
//! | `GET`  | `/community/v1/sites/{host}` | Record and weekly history |
//! | `GET`  | `/community/v1/sites/{host}/screenshot` | Image bytes |
//! | `PUT`  | `/community/v1/sites/{host}/status` | Basic auth |
//! | `GET`  | `/community/v1/stats/{metric}` | Monthly counters |

pub mod auth;
pub mod error;
pub mod legacy;
pub mod sites;
pub mod stats;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use repack_core::{
  event::SupporterEvent,
  ingest::Ingestor,
  remote::SiteProbe,
  store::{CounterStore, SupporterStore},
};
use tokio::sync::broadcast;
use tracing::debug;

pub use auth::AuthConfig;
pub use error::ApiError;

/// A backend serving every store trait the API needs.
pub trait ApiStore: SupporterStore + CounterStore + 'static {}

impl<T> ApiStore for T where T: SupporterStore + CounterStore + 'static {}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, P> {
  pub store:    Arc<S>,
  pub ingestor: Ingestor<S, P>,
  pub events:   broadcast::Sender<SupporterEvent>,
  pub auth:     Arc<AuthConfig>,
}

impl<S, P> Clone for AppState<S, P> {
  fn clone(&self) -> Self {
    Self {
      store:    self.store.clone(),
      ingestor: self.ingestor.clone(),
      events:   self.events.clone(),
      auth:     self.auth.clone(),
    }
  }
}

impl<S, P> AppState<S, P>
where
  S: ApiStore,
  P: SiteProbe + 'static,
{
  pub fn new(
    store: Arc<S>,
    probe: Arc<P>,
    events: broadcast::Sender<SupporterEvent>,
    auth: AuthConfig,
  ) -> Self {
    Self {
      ingestor: Ingestor::new(store.clone(), probe),
      store,
      events,
      auth: Arc::new(auth),
    }
  }

  /// Publish the event of an accepted submission. Having no subscriber is
  /// not an error.
  pub(crate) fn publish(&self, event: SupporterEvent) {
    let supporter_id = event.supporter_id();
    if self.events.send(event).is_err() {
      debug!(%supporter_id, "no subscriber for supporter event");
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full router for `state`.
pub fn api_router<S, P>(state: AppState<S, P>) -> Router<()>
where
  S: ApiStore,
  P: SiteProbe + 'static,
{
  Router::new()
    .route("/", post(legacy::handler::<S, P>))
    .route(
      "/community/v1/sites",
      get(sites::list::<S, P>).post(sites::submit::<S, P>),
    )
    .route("/community/v1/sites/{host}", get(sites::get_one::<S, P>))
    .route(
      "/community/v1/sites/{host}/screenshot",
      get(sites::screenshot::<S, P>),
    )
    .route(
      "/community/v1/sites/{host}/status",
      put(sites::set_status::<S, P>),
    )
    .route("/community/v1/stats/{*metric}", get(stats::handler::<S, P>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
