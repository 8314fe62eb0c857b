//! Error type for `repack-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] repack_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// An update named a supporter that does not exist.
  #[error("supporter not found: {0}")]
  SupporterNotFound(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
