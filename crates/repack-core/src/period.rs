//! Period keys that bucket time for history and aggregation.
//!
//! Supporter history is kept per ISO week (`YYYY-Www`); global aggregate
//! counters are kept per calendar month (`YYYY-MM`). Both are derived from
//! the server's receipt time in UTC.

use chrono::{DateTime, Datelike, Utc};

/// ISO week key, e.g. `2021-W48`. The year is the ISO week-numbering year,
/// so 2021-01-01 falls into `2020-W53`.
pub fn week_key(at: DateTime<Utc>) -> String {
  let week = at.iso_week();
  format!("{:04}-W{:02}", week.year(), week.week())
}

/// Calendar month key, e.g. `2021-11`.
pub fn month_key(at: DateTime<Utc>) -> String {
  format!("{:04}-{:02}", at.year(), at.month())
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn week_key_pads_week_number() {
    let at = Utc.with_ymd_and_hms(2021, 3, 2, 12, 0, 0).unwrap();
    assert_eq!(week_key(at), "2021-W09");
  }

  #[test]
  fn week_key_uses_iso_year_at_boundary() {
    let at = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(week_key(at), "2020-W53");
  }

  #[test]
  fn month_key_formats_year_and_month() {
    let at = Utc.with_ymd_and_hms(2021, 11, 30, 23, 59, 59).unwrap();
    assert_eq!(month_key(at), "2021-11");
  }
}
