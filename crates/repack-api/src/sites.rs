//! Handlers for `/community/v1/sites` endpoints.

use std::collections::BTreeMap;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::header,
  response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::Utc;
use repack_core::{
  event::SupporterEvent,
  remote::SiteProbe,
  source::JsonFields,
  supporter::{HistoryEntry, SupporterRecord, SupporterStatus},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::{
  ApiStore, AppState,
  auth::Admin,
  error::{ACCEPTED_MESSAGE, ApiError},
};

async fn find<S, P>(state: &AppState<S, P>, host: &str) -> Result<SupporterRecord, ApiError>
where
  S: ApiStore,
  P: SiteProbe + 'static,
{
  state
    .store
    .find_by_host(host)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("site {host}")))
}

// ─── Submit ──────────────────────────────────────────────────────────────────

/// `POST /community/v1/sites`, body: a JSON object of submission fields.
///
/// A body that is not a JSON object is treated as an empty one, so the
/// client gets the list of missing fields.
pub async fn submit<S, P>(
  State(state): State<AppState<S, P>>,
  body: Bytes,
) -> Result<Json<Value>, ApiError>
where
  S: ApiStore,
  P: SiteProbe + 'static,
{
  let fields = match serde_json::from_slice::<Value>(&body) {
    Ok(Value::Object(map)) => JsonFields(map),
    _ => JsonFields::default(),
  };

  let ingested = state
    .ingestor
    .ingest(&fields, Utc::now())
    .await
    .map_err(ApiError::from)
    .inspect_err(|e| warn!(error = %e, "supporter submission rejected"))?;

  info!(
    host = %ingested.record.host,
    created = ingested.created,
    period = %ingested.period,
    "supporter submission accepted"
  );
  state.publish(ingested.event.clone());

  Ok(Json(json!({ "message": ACCEPTED_MESSAGE })))
}

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub status: Option<SupporterStatus>,
}

/// `GET /community/v1/sites[?status=<status>]`
pub async fn list<S, P>(
  State(state): State<AppState<S, P>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<SupporterRecord>>, ApiError>
where
  S: ApiStore,
  P: SiteProbe + 'static,
{
  let records = state
    .store
    .list_supporters(params.status)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(records))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SiteDetail {
  #[serde(flatten)]
  pub record:  SupporterRecord,
  pub history: BTreeMap<String, HistoryEntry>,
}

/// `GET /community/v1/sites/{host}`
pub async fn get_one<S, P>(
  State(state): State<AppState<S, P>>,
  Path(host): Path<String>,
) -> Result<Json<SiteDetail>, ApiError>
where
  S: ApiStore,
  P: SiteProbe + 'static,
{
  let record = find(&state, &host).await?;
  let history = state
    .store
    .history(record.supporter_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(SiteDetail { record, history }))
}

// ─── Screenshot ──────────────────────────────────────────────────────────────

/// `GET /community/v1/sites/{host}/screenshot`
pub async fn screenshot<S, P>(
  State(state): State<AppState<S, P>>,
  Path(host): Path<String>,
) -> Result<Response, ApiError>
where
  S: ApiStore,
  P: SiteProbe + 'static,
{
  let record = find(&state, &host).await?;
  let image_id = record
    .image_id
    .ok_or_else(|| ApiError::NotFound(format!("screenshot of {host}")))?;
  let asset = state
    .store
    .get_media(image_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("media {image_id}")))?;

  Ok(([(header::CONTENT_TYPE, asset.media_type)], asset.bytes).into_response())
}

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: SupporterStatus,
}

/// `PUT /community/v1/sites/{host}/status`, body: `{"status":"published"}`
pub async fn set_status<S, P>(
  _admin: Admin,
  State(state): State<AppState<S, P>>,
  Path(host): Path<String>,
  Json(body): Json<StatusBody>,
) -> Result<Json<SupporterRecord>, ApiError>
where
  S: ApiStore,
  P: SiteProbe + 'static,
{
  let record = find(&state, &host).await?;
  let updated = state
    .store
    .set_status(record.supporter_id, body.status)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("site {host}")))?;

  info!(host = %updated.host, status = %updated.status, "supporter status changed");
  state.publish(SupporterEvent::status_changed(&updated));
  Ok(Json(updated))
}
