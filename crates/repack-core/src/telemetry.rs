//! Anonymous plugin telemetry aggregated into global monthly counters.
//!
//! Unlike supporter submissions, telemetry reports create no per-site state:
//! each report only bumps counters keyed by (metric, month, value).

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  period::month_key, sanitize::sanitize_text_field, source::FormFields,
  store::CounterStore,
};

/// Theme name sent by a known spam source; such reports are dropped.
pub const SPAM_THEME_NAME: &str = "Readline Child";

// ─── Metric ──────────────────────────────────────────────────────────────────

/// An aggregated telemetry dimension.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
pub enum Metric {
  #[serde(rename = "php_version")]
  #[strum(serialize = "php_version")]
  PhpVersion,
  #[serde(rename = "theme_name")]
  #[strum(serialize = "theme_name")]
  ThemeName,
  #[serde(rename = "theme_author")]
  #[strum(serialize = "theme_author")]
  ThemeAuthor,
  #[serde(rename = "theme_uri")]
  #[strum(serialize = "theme_uri")]
  ThemeUri,
  /// Every occurrence of a field type in a report.
  #[serde(rename = "field_types/all")]
  #[strum(serialize = "field_types/all")]
  FieldTypesAll,
  /// Each distinct field type once per report.
  #[serde(rename = "field_types/singles")]
  #[strum(serialize = "field_types/singles")]
  FieldTypesSingles,
}

// ─── Report ──────────────────────────────────────────────────────────────────

/// A sanitised telemetry report from the legacy form transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryReport {
  pub site_id:       Option<String>,
  pub php_version:   Option<String>,
  pub theme_name:    Option<String>,
  pub theme_author:  Option<String>,
  pub theme_uri:     Option<String>,
  /// Reported but not aggregated.
  pub theme_version: Option<String>,
  pub field_types:   Vec<String>,
}

impl TelemetryReport {
  /// Read a report from form fields `siteID`, `phpVer`, `themeName`,
  /// `themeAuthor`, `themeURI`, `theme_version` and `fieldTypes[]`.
  ///
  /// Returns `None` for spam, identified by the raw theme name.
  pub fn from_form(form: &FormFields) -> Option<Self> {
    if form.get("themeName") == Some(SPAM_THEME_NAME) {
      return None;
    }

    let text = |key: &str| {
      form
        .get(key)
        .map(sanitize_text_field)
        .filter(|v| !v.is_empty())
    };

    Some(Self {
      site_id:       text("siteID"),
      php_version:   text("phpVer"),
      theme_name:    text("themeName"),
      theme_author:  text("themeAuthor"),
      theme_uri:     text("themeURI"),
      theme_version: text("theme_version"),
      field_types:   form
        .get_all("fieldTypes")
        .into_iter()
        .map(sanitize_text_field)
        .filter(|v| !v.is_empty())
        .collect(),
    })
  }

  /// The counter increments this report contributes, in report order.
  ///
  /// Field types produce one `FieldTypesAll` increment per occurrence and
  /// one `FieldTypesSingles` increment per distinct value.
  pub fn increments(&self) -> Vec<(Metric, String)> {
    let scalars = [
      (Metric::PhpVersion, &self.php_version),
      (Metric::ThemeName, &self.theme_name),
      (Metric::ThemeAuthor, &self.theme_author),
      (Metric::ThemeUri, &self.theme_uri),
    ];

    let mut out: Vec<(Metric, String)> = scalars
      .into_iter()
      .filter_map(|(metric, value)| value.clone().map(|v| (metric, v)))
      .collect();

    let mut seen = HashSet::new();
    for field_type in &self.field_types {
      out.push((Metric::FieldTypesAll, field_type.clone()));
      if seen.insert(field_type.as_str()) {
        out.push((Metric::FieldTypesSingles, field_type.clone()));
      }
    }

    out
  }
}

/// Add `report` to the monthly counters for `received_at`. Returns the number
/// of increments applied.
pub async fn record_report<C: CounterStore>(
  store: &C,
  report: &TelemetryReport,
  received_at: DateTime<Utc>,
) -> Result<usize, C::Error> {
  let increments = report.increments();
  if increments.is_empty() {
    return Ok(0);
  }
  let applied = increments.len();
  store
    .increment_batch(month_key(received_at), increments)
    .await?;
  Ok(applied)
}
