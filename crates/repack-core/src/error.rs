//! Error types for `repack-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("transport error: {0}")]
  Transport(String),

  #[error("unexpected content type: {found:?}")]
  ContentTypeMismatch { found: Option<String> },

  #[error("storage error: {0}")]
  Storage(String),

  #[error("unknown supporter status: {0:?}")]
  UnknownStatus(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
