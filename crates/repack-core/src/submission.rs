//! Supporter-site submissions: the fields a remote plugin reports and their
//! validation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::sanitize::sanitize_text_field;

// ─── Fields ──────────────────────────────────────────────────────────────────

/// A field of a supporter submission, independent of how the transport names
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionField {
  SiteUrl,
  SiteLang,
  RepackStart,
  RepackCounter,
  RepackRatio,
  RepackCoupon,
  RepackLastSent,
}

impl SubmissionField {
  pub const ALL: [Self; 7] = [
    Self::SiteUrl,
    Self::SiteLang,
    Self::RepackStart,
    Self::RepackCounter,
    Self::RepackRatio,
    Self::RepackCoupon,
    Self::RepackLastSent,
  ];

  /// Key used by the legacy form-encoded transport.
  pub fn form_key(self) -> &'static str {
    match self {
      Self::SiteUrl => "siteURL",
      Self::SiteLang => "siteLang",
      Self::RepackStart => "repackStart",
      Self::RepackCounter => "repackCounter",
      Self::RepackRatio => "repackRatio",
      Self::RepackCoupon => "repackCoupon",
      Self::RepackLastSent => "repackLastSent",
    }
  }

  /// Key used by the JSON transport.
  pub fn json_key(self) -> &'static str {
    match self {
      Self::SiteUrl => "site_url",
      Self::SiteLang => "site_lang",
      Self::RepackStart => "repack_start",
      Self::RepackCounter => "repack_counter",
      Self::RepackRatio => "repack_ratio",
      Self::RepackCoupon => "repack_coupon",
      Self::RepackLastSent => "repack_last_sent",
    }
  }

  pub fn is_required(self) -> bool { !matches!(self, Self::RepackCoupon) }
}

/// Read access to the raw, unsanitised values of a request body.
///
/// Implemented by the transport adapters in [`crate::source`].
pub trait FieldSource {
  /// The raw value for `field`, or `None` if the key is absent.
  fn raw(&self, field: SubmissionField) -> Option<String>;

  /// The name this transport uses for `field`; used in error reports.
  fn key(&self, field: SubmissionField) -> &'static str;
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Why a submission was refused. Field names are reported the way the client
/// sent them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{}", describe(.missing, .malformed))]
pub struct ValidationError {
  pub missing:   Vec<&'static str>,
  pub malformed: Vec<&'static str>,
}

impl ValidationError {
  pub fn is_empty(&self) -> bool {
    self.missing.is_empty() && self.malformed.is_empty()
  }

  /// Human-readable summary naming every offending field.
  pub fn message(&self) -> String { describe(&self.missing, &self.malformed) }
}

fn describe(missing: &[&str], malformed: &[&str]) -> String {
  let mut parts = Vec::new();
  if !missing.is_empty() {
    parts.push(format!("Missing required fields: {}.", missing.join(", ")));
  }
  if !malformed.is_empty() {
    parts.push(format!("Malformed fields: {}.", malformed.join(", ")));
  }
  parts.join(" ")
}

// ─── Submission ──────────────────────────────────────────────────────────────

/// A sanitised, validated supporter submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
  pub site_url:         String,
  /// Host component of `site_url`; the supporter's identity.
  pub host:             String,
  pub site_lang:        String,
  /// Unix seconds, as reported by the site.
  pub repack_start:     i64,
  pub repack_counter:   String,
  pub repack_ratio:     String,
  /// Empty coupons are normalised to `None`.
  pub repack_coupon:    Option<String>,
  /// Unix seconds, as reported by the site.
  pub repack_last_sent: i64,
}

impl Submission {
  /// Extract, sanitise and validate every field from `source`.
  ///
  /// All problems are collected before returning, so a single error lists
  /// every missing or malformed field.
  pub fn parse(source: &impl FieldSource) -> Result<Self, ValidationError> {
    let mut error = ValidationError::default();

    let mut take = |field: SubmissionField| -> Option<String> {
      match source.raw(field) {
        Some(raw) => Some(sanitize_text_field(&raw)),
        None => {
          if field.is_required() {
            error.missing.push(source.key(field));
          }
          None
        }
      }
    };

    let site_url = take(SubmissionField::SiteUrl);
    let site_lang = take(SubmissionField::SiteLang);
    let repack_start = take(SubmissionField::RepackStart);
    let repack_counter = take(SubmissionField::RepackCounter);
    let repack_ratio = take(SubmissionField::RepackRatio);
    let repack_coupon = take(SubmissionField::RepackCoupon);
    let repack_last_sent = take(SubmissionField::RepackLastSent);

    let host = site_url.as_deref().and_then(|url| {
      let host = parse_host(url);
      if host.is_none() {
        error.malformed.push(source.key(SubmissionField::SiteUrl));
      }
      host
    });

    let mut timestamp = |field: SubmissionField, value: Option<&str>| {
      value.and_then(|v| {
        let parsed = parse_timestamp(v);
        if parsed.is_none() {
          error.malformed.push(source.key(field));
        }
        parsed
      })
    };
    let repack_start =
      timestamp(SubmissionField::RepackStart, repack_start.as_deref());
    let repack_last_sent =
      timestamp(SubmissionField::RepackLastSent, repack_last_sent.as_deref());

    match (
      site_url,
      host,
      site_lang,
      repack_start,
      repack_counter,
      repack_ratio,
      repack_last_sent,
    ) {
      (
        Some(site_url),
        Some(host),
        Some(site_lang),
        Some(repack_start),
        Some(repack_counter),
        Some(repack_ratio),
        Some(repack_last_sent),
      ) if error.is_empty() => Ok(Self {
        site_url,
        host,
        site_lang,
        repack_start,
        repack_counter,
        repack_ratio,
        repack_coupon: repack_coupon.filter(|c| !c.is_empty()),
        repack_last_sent,
      }),
      _ => Err(error),
    }
  }

  /// When the site started collecting consent data, at minute precision.
  pub fn started_at(&self) -> DateTime<Utc> {
    to_minute(self.repack_start)
  }

  /// When the site sent this report, at minute precision.
  pub fn last_sent_at(&self) -> DateTime<Utc> {
    to_minute(self.repack_last_sent)
  }
}

fn parse_host(url: &str) -> Option<String> {
  let parsed = url::Url::parse(url).ok()?;
  parsed
    .host_str()
    .filter(|host| !host.is_empty())
    .map(str::to_owned)
}

/// Unix seconds that chrono can represent.
fn parse_timestamp(value: &str) -> Option<i64> {
  let secs: i64 = value.trim().parse().ok()?;
  DateTime::<Utc>::from_timestamp(secs, 0).map(|_| secs)
}

fn to_minute(secs: i64) -> DateTime<Utc> {
  DateTime::<Utc>::from_timestamp(secs - secs.rem_euclid(60), 0)
    .unwrap_or_default()
}
