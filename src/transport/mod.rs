//! HTTP transport: redirect-free exchanges over the session cookie store.

mod client;
mod error;
mod form;

pub use client::{Exchange, Transport, TransportSettings};
pub use error::TransportError;
pub use form::Form;
