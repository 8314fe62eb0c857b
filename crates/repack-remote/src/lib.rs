//! `reqwest` implementations of the outbound HTTP seams in
//! [`repack_core::remote`].

pub mod error;
pub mod mshots;
pub mod probe;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use mshots::MshotsClient;
pub use probe::HttpProbe;
