//! `GET /community/v1/stats/{metric}`: aggregated telemetry counters.

use std::str::FromStr as _;

use axum::{
  Json,
  extract::{Path, State},
};
use repack_core::{remote::SiteProbe, store::MetricCounts, telemetry::Metric};
use serde::Serialize;

use crate::{ApiStore, AppState, error::ApiError};

#[derive(Debug, Serialize)]
pub struct MetricStats {
  pub metric:  Metric,
  /// Month key → value → count.
  pub periods: MetricCounts,
}

/// The metric is matched by a wildcard since names like `field_types/all`
/// contain a slash.
pub async fn handler<S, P>(
  State(state): State<AppState<S, P>>,
  Path(metric): Path<String>,
) -> Result<Json<MetricStats>, ApiError>
where
  S: ApiStore,
  P: SiteProbe + 'static,
{
  let metric = Metric::from_str(metric.trim_matches('/'))
    .map_err(|_| ApiError::NotFound(format!("metric {metric:?}")))?;

  let periods = state.store.counts(metric).await.map_err(ApiError::store)?;
  Ok(Json(MetricStats { metric, periods }))
}
