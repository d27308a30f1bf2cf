//! Feature operations bound to a [`Session`](crate::Session).
//!
//! Each operation builds a form, submits it through the session's bound
//! request primitive, and classifies the payload. A failure is reported to
//! the caller of that operation only; apart from the not-logged-in signal it
//! leaves the session untouched.

mod friend_request;
mod group;
mod http;
mod read_status;

use std::time::{SystemTime, UNIX_EPOCH};

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}
