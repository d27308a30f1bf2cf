//! The authenticated session handle.
//!
//! A [`Session`] is built exactly once per successful login and then shared
//! by reference with every feature operation. Its identity and cookie store
//! are fixed; the logged-in flag, counters, endpoint and options are the
//! only mutable state.

mod defaults;
mod error;
mod request;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::auth::{CookieStore, SavedSession};
use crate::config::{OptionKey, Options, OptionsUpdate, ServiceUrls};
use crate::extract::ProtocolEndpoint;
use crate::logging;
use crate::transport::Transport;

pub use defaults::RequestDefaults;
pub use error::{ApiError, NOT_LOGGED_IN_CODE};
pub use request::classify_login_check;

/// Endpoint discovery failed; the session works without a streaming endpoint.
#[derive(Debug, Clone, Error)]
#[error("streaming endpoint unavailable: {reason}")]
pub struct ExtractionDegraded {
    pub reason: String,
    /// The authenticated page body, kept for inspection.
    pub html: String,
}

/// Everything the login flow gathers before the session exists.
pub(crate) struct SessionParts {
    pub identity: String,
    pub urls: ServiceUrls,
    pub transport: Arc<Transport>,
    pub options: Options,
    pub endpoint: Option<ProtocolEndpoint>,
    pub defaults: RequestDefaults,
    pub degraded: Option<ExtractionDegraded>,
}

/// An authenticated session.
pub struct Session {
    identity: String,
    client_id: String,
    urls: ServiceUrls,
    transport: Arc<Transport>,
    options: RwLock<Options>,
    logged_in: AtomicBool,
    client_mutation_id: AtomicU64,
    last_seq_id: AtomicU64,
    request_counter: AtomicU64,
    endpoint: RwLock<Option<ProtocolEndpoint>>,
    defaults: RequestDefaults,
    degraded: Option<ExtractionDegraded>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("client_id", &self.client_id)
            .field("logged_in", &self.is_logged_in())
            .field("endpoint", &self.endpoint())
            .field("degraded", &self.degraded.as_ref().map(|d| d.reason.as_str()))
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn new(parts: SessionParts) -> Self {
        let client_id = format!("{:x}", rand::random::<u32>() & 0x7fff_ffff);
        info!(identity = %parts.identity, "Logged in");
        Self {
            identity: parts.identity,
            client_id,
            urls: parts.urls,
            transport: parts.transport,
            options: RwLock::new(parts.options),
            logged_in: AtomicBool::new(true),
            client_mutation_id: AtomicU64::new(0),
            last_seq_id: AtomicU64::new(0),
            request_counter: AtomicU64::new(0),
            endpoint: RwLock::new(parts.endpoint),
            defaults: parts.defaults,
            degraded: parts.degraded,
        }
    }

    /// The authenticated account identifier.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Random per-session client identifier, lowercase hex.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn urls(&self) -> &ServiceUrls {
        &self.urls
    }

    #[must_use]
    pub fn cookies(&self) -> &Arc<CookieStore> {
        self.transport.cookies()
    }

    /// False once the server invalidated the session or [`Session::logout`] ran.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_logged_out(&self) {
        if self.logged_in.swap(false, Ordering::SeqCst) {
            warn!(identity = %self.identity, "session is no longer logged in");
        }
    }

    /// Marks the session logged out locally. The server is not contacted.
    pub fn logout(&self) {
        self.logged_in.store(false, Ordering::SeqCst);
        info!(identity = %self.identity, "logged out");
    }

    /// The discovered streaming endpoint, if any.
    #[must_use]
    pub fn endpoint(&self) -> Option<ProtocolEndpoint> {
        self.endpoint
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the streaming endpoint, e.g. after the listener was redirected.
    pub fn set_endpoint(&self, endpoint: Option<ProtocolEndpoint>) {
        *self.endpoint.write().unwrap_or_else(PoisonError::into_inner) = endpoint;
    }

    /// Why endpoint discovery failed, when it did.
    #[must_use]
    pub fn degraded(&self) -> Option<&ExtractionDegraded> {
        self.degraded.as_ref()
    }

    /// The raw authenticated page, kept only when endpoint discovery failed.
    #[must_use]
    pub fn html_data(&self) -> Option<&str> {
        self.degraded.as_ref().map(|degraded| degraded.html.as_str())
    }

    /// Returns the next outbound mutation id. Strictly increasing from 1.
    pub fn next_mutation_id(&self) -> u64 {
        self.client_mutation_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    #[must_use]
    pub fn last_seq_id(&self) -> u64 {
        self.last_seq_id.load(Ordering::SeqCst)
    }

    pub fn set_last_seq_id(&self, seq_id: u64) {
        self.last_seq_id.store(seq_id, Ordering::SeqCst);
    }

    /// A snapshot of the current options.
    #[must_use]
    pub fn options(&self) -> Options {
        self.options
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Applies options to the live session.
    ///
    /// Log level and buffer size changes reach the global subscriber; user
    /// agent and proxy changes rebuild the transport.
    #[instrument(level = "debug", skip(self, options), fields(keys = options.len()))]
    pub fn set_options(&self, options: &Map<String, Value>) -> OptionsUpdate {
        let (update, snapshot) = {
            let mut current = self.options.write().unwrap_or_else(PoisonError::into_inner);
            let update = current.set_options(options);
            (update, current.clone())
        };
        apply_option_effects(&update, &snapshot, Some(&self.transport));
        update
    }

    /// Serializes the current cookie store.
    #[must_use]
    pub fn export_session(&self) -> SavedSession {
        self.transport.cookies().export()
    }

    pub(crate) fn transport(&self) -> &Transport {
        &self.transport
    }

    pub(crate) fn request_defaults(&self) -> &RequestDefaults {
        &self.defaults
    }

    pub(crate) fn next_request_number(&self) -> u64 {
        self.request_counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Pushes applied options out to logging and, when given, the transport.
pub(crate) fn apply_option_effects(update: &OptionsUpdate, options: &Options, transport: Option<&Transport>) {
    if update.touched(OptionKey::LogLevel)
        && let Some(level) = options.log_level
    {
        logging::set_level(level);
    }
    if update.touched(OptionKey::LogRecordSize) {
        logging::set_record_size(options.log_record_size);
    }
    if let Some(transport) = transport
        && (update.touched(OptionKey::UserAgent) || update.touched(OptionKey::Proxy))
        && let Err(error) = transport.reconfigure(&options.user_agent, options.proxy.as_deref())
    {
        warn!(error = %error, "keeping previous transport settings");
    }
}
