//! Core types and trait definitions for the RePack telemetry server.
//!
//! No HTTP or database code lives here. Storage backends implement the traits
//! in [`store`]; outbound HTTP clients implement the traits in [`remote`].

// Trait methods return `impl Future + Send`; impls use plain `async fn`.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod event;
pub mod ingest;
pub mod media;
pub mod period;
pub mod remote;
pub mod sanitize;
pub mod screenshot;
pub mod source;
pub mod store;
pub mod submission;
pub mod supporter;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
