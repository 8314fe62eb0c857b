//! Error type for `repack-remote`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http client error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("invalid endpoint url: {0}")]
  Url(#[from] url::ParseError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for repack_core::Error {
  fn from(e: Error) -> Self { repack_core::Error::Transport(e.to_string()) }
}
