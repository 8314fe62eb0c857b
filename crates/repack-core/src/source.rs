//! Transport adapters exposing request bodies as a [`FieldSource`].
//!
//! The legacy plugin posts `application/x-www-form-urlencoded` bodies with
//! camel-case keys; the REST endpoint accepts a JSON object with snake-case
//! keys. Both feed the same validation.

use serde_json::{Map, Value};

use crate::submission::{FieldSource, SubmissionField};

// ─── Form ────────────────────────────────────────────────────────────────────

/// A parsed form-encoded body. Repeated scalar keys resolve to the last
/// value; array keys (`name[]`, `name[3]`) collect every value in order.
#[derive(Debug, Clone, Default)]
pub struct FormFields {
  pairs: Vec<(String, String)>,
}

impl FormFields {
  pub fn parse(body: &[u8]) -> Self {
    Self {
      pairs: url::form_urlencoded::parse(body).into_owned().collect(),
    }
  }

  /// The last value sent for `key`.
  pub fn get(&self, key: &str) -> Option<&str> {
    self
      .pairs
      .iter()
      .rev()
      .find(|(k, _)| k == key)
      .map(|(_, v)| v.as_str())
  }

  pub fn contains(&self, key: &str) -> bool { self.get(key).is_some() }

  /// Every value sent for the array field `name`, i.e. keys `name[]` or
  /// `name[<index>]`.
  pub fn get_all(&self, name: &str) -> Vec<&str> {
    self
      .pairs
      .iter()
      .filter(|(k, _)| {
        k.strip_prefix(name)
          .and_then(|rest| rest.strip_prefix('['))
          .is_some_and(|rest| rest.ends_with(']'))
      })
      .map(|(_, v)| v.as_str())
      .collect()
  }
}

impl FromIterator<(String, String)> for FormFields {
  fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
    Self { pairs: iter.into_iter().collect() }
  }
}

impl FieldSource for FormFields {
  fn raw(&self, field: SubmissionField) -> Option<String> {
    self.get(field.form_key()).map(str::to_owned)
  }

  fn key(&self, field: SubmissionField) -> &'static str { field.form_key() }
}

// ─── JSON ────────────────────────────────────────────────────────────────────

/// A JSON object body. Strings are taken as-is, numbers and booleans are
/// stringified; `null`, arrays and objects count as absent.
#[derive(Debug, Clone, Default)]
pub struct JsonFields(pub Map<String, Value>);

impl FieldSource for JsonFields {
  fn raw(&self, field: SubmissionField) -> Option<String> {
    match self.0.get(field.json_key())? {
      Value::String(s) => Some(s.clone()),
      Value::Number(n) => Some(n.to_string()),
      Value::Bool(b) => Some(b.to_string()),
      Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
  }

  fn key(&self, field: SubmissionField) -> &'static str { field.json_key() }
}
