//! Shared helpers for unit tests that bind local sockets.

pub mod socket_guard;
