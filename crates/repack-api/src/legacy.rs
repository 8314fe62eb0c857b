//! The legacy form transport: `POST /` with `action=repack-stats`.
//!
//! One action serves two kinds of report. A body carrying any supporter
//! field (`siteURL`, `siteLang`, ...) is a supporter submission and gets a
//! plain-text reply; anything else is an anonymous telemetry report, which
//! is always acknowledged with `200`.

use axum::{
  extract::State,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::Utc;
use repack_core::{
  remote::SiteProbe,
  sanitize::sanitize_text_field,
  source::FormFields,
  submission::SubmissionField,
  telemetry::{TelemetryReport, record_report},
};
use tracing::{debug, info, warn};

use crate::{
  ApiStore, AppState,
  error::{ACCEPTED_MESSAGE, ApiError},
};

pub const ACTION: &str = "repack-stats";

/// `POST /`
pub async fn handler<S, P>(
  State(state): State<AppState<S, P>>,
  body: Bytes,
) -> Response
where
  S: ApiStore,
  P: SiteProbe + 'static,
{
  let form = FormFields::parse(&body);

  if form.get("action").map(sanitize_text_field).as_deref() != Some(ACTION) {
    return StatusCode::NOT_FOUND.into_response();
  }

  if is_supporter_submission(&form) {
    submit_supporter(&state, &form).await
  } else {
    record_telemetry(&state, &form).await
  }
}

fn is_supporter_submission(form: &FormFields) -> bool {
  SubmissionField::ALL
    .iter()
    .any(|field| form.contains(field.form_key()))
}

async fn submit_supporter<S, P>(state: &AppState<S, P>, form: &FormFields) -> Response
where
  S: ApiStore,
  P: SiteProbe + 'static,
{
  match state.ingestor.ingest(form, Utc::now()).await {
    Ok(ingested) => {
      info!(
        host = %ingested.record.host,
        created = ingested.created,
        period = %ingested.period,
        "supporter submission accepted"
      );
      state.publish(ingested.event.clone());
      reply(StatusCode::OK, ACCEPTED_MESSAGE)
    }
    Err(e) => {
      let e = ApiError::from(e);
      warn!(error = %e, "supporter submission rejected");
      reply(e.status(), &e.message())
    }
  }
}

async fn record_telemetry<S, P>(state: &AppState<S, P>, form: &FormFields) -> Response
where
  S: ApiStore,
  P: SiteProbe + 'static,
{
  let Some(report) = TelemetryReport::from_form(form) else {
    debug!("telemetry report dropped as spam");
    return StatusCode::OK.into_response();
  };

  match record_report(state.store.as_ref(), &report, Utc::now()).await {
    Ok(applied) => debug!(applied, "telemetry report recorded"),
    Err(e) => warn!(error = %e, "failed to record telemetry report"),
  }
  StatusCode::OK.into_response()
}

/// Plain-text reply in the form the plugin expects.
fn reply(status: StatusCode, message: &str) -> Response {
  (status, format!("{message} Status Code: {}", status.as_u16())).into_response()
}
