//! Diagnostic output: level names, live reconfiguration, and a ring buffer
//! of recent records.
//!
//! [`init`] installs a `tracing-subscriber` registry with a reloadable
//! `EnvFilter`, a stderr formatter, and a [`RecordLayer`] that keeps the most
//! recent records in memory. [`set_level`] and [`set_record_size`] act on that
//! installation and do nothing when the embedding application installed its
//! own subscriber instead.

use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Registry, reload};

/// Number of records kept in memory unless configured otherwise.
pub const DEFAULT_LOG_RECORD_SIZE: usize = 100;

/// Verbosity names accepted by the `logLevel` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Silly,
    Verbose,
    Info,
    Http,
    Warn,
    Error,
    Silent,
}

impl LogLevel {
    /// All level names, most verbose first.
    pub const ALL: [Self; 7] = [
        Self::Silly,
        Self::Verbose,
        Self::Info,
        Self::Http,
        Self::Warn,
        Self::Error,
        Self::Silent,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Silly => "silly",
            Self::Verbose => "verbose",
            Self::Info => "info",
            Self::Http => "http",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Silent => "silent",
        }
    }

    /// The `EnvFilter` directive this level maps onto.
    #[must_use]
    pub fn directive(self) -> &'static str {
        match self {
            Self::Silly => "trace",
            Self::Verbose => "debug",
            Self::Info | Self::Http => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Silent => "off",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unknown level name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level '{0}' (expected one of silly, verbose, info, http, warn, error, silent)")]
pub struct UnknownLogLevel(pub String);

impl FromStr for LogLevel {
    type Err = UnknownLogLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == normalized)
            .ok_or_else(|| UnknownLogLevel(s.to_string()))
    }
}

/// One captured diagnostic record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: Level,
    pub target: String,
    /// The event message followed by its structured fields as `key=value`.
    pub message: String,
}

/// Bounded FIFO of recent records. A limit of zero keeps nothing.
#[derive(Debug)]
pub struct RecordBuffer {
    records: Mutex<VecDeque<LogRecord>>,
    limit: AtomicUsize,
}

impl RecordBuffer {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(limit.min(1024))),
            limit: AtomicUsize::new(limit),
        }
    }

    /// Changes the limit, dropping the oldest records that no longer fit.
    pub fn set_limit(&self, limit: usize) {
        self.limit.store(limit, Ordering::Relaxed);
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        while records.len() > limit {
            records.pop_front();
        }
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit.load(Ordering::Relaxed)
    }

    pub fn push(&self, record: LogRecord) {
        let limit = self.limit();
        if limit == 0 {
            return;
        }
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        while records.len() >= limit {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Returns the buffered records, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

/// A layer that copies every enabled event into a [`RecordBuffer`].
#[derive(Debug, Clone)]
pub struct RecordLayer {
    buffer: Arc<RecordBuffer>,
}

impl RecordLayer {
    #[must_use]
    pub fn new(buffer: Arc<RecordBuffer>) -> Self {
        Self { buffer }
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={value}", field.name());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={value:?}", field.name());
        }
    }
}

impl<S> Layer<S> for RecordLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.buffer.push(LogRecord {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            message: format!("{}{}", visitor.message, visitor.fields),
        });
    }
}

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();
static RECORDS: OnceLock<Arc<RecordBuffer>> = OnceLock::new();

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over `default_directive` unless `force_directive` is set.
/// Returns false when a global subscriber was already installed.
pub fn init(default_directive: &str, force_directive: bool) -> bool {
    let filter = if force_directive {
        EnvFilter::new(default_directive)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
    };
    let (filter, handle) = reload::Layer::new(filter);
    let buffer = Arc::new(RecordBuffer::new(DEFAULT_LOG_RECORD_SIZE));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(RecordLayer::new(Arc::clone(&buffer)))
        .try_init()
        .is_ok();

    if installed {
        let _ = FILTER_HANDLE.set(handle);
        let _ = RECORDS.set(buffer);
    }
    installed
}

/// Changes the live verbosity of the subscriber installed by [`init`].
pub fn set_level(level: LogLevel) {
    if let Some(handle) = FILTER_HANDLE.get()
        && let Err(error) = handle.reload(EnvFilter::new(level.directive()))
    {
        tracing::warn!(error = %error, "could not change log level");
    }
}

/// Resizes the in-memory record buffer installed by [`init`].
pub fn set_record_size(limit: usize) {
    if let Some(records) = RECORDS.get() {
        records.set_limit(limit);
    }
}

/// Returns the buffered records, oldest first. Empty when [`init`] was not used.
#[must_use]
pub fn recent_records() -> Vec<LogRecord> {
    RECORDS.get().map(|records| records.snapshot()).unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_level_names_round_trip_through_from_str() {
        for level in LogLevel::ALL {
            assert_eq!(level.as_str().parse::<LogLevel>().unwrap(), level);
        }
        assert_eq!(" WARN ".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_level_directives() {
        assert_eq!(LogLevel::Silly.directive(), "trace");
        assert_eq!(LogLevel::Verbose.directive(), "debug");
        assert_eq!(LogLevel::Http.directive(), "info");
        assert_eq!(LogLevel::Silent.directive(), "off");
    }

    #[test]
    fn test_buffer_keeps_most_recent_records() {
        let buffer = RecordBuffer::new(2);
        for n in 0..3 {
            buffer.push(LogRecord {
                level: Level::INFO,
                target: "t".to_string(),
                message: format!("record {n}"),
            });
        }
        let messages: Vec<String> = buffer.snapshot().into_iter().map(|r| r.message).collect();
        assert_eq!(messages, vec!["record 1", "record 2"]);

        buffer.set_limit(1);
        assert_eq!(buffer.snapshot().len(), 1);
        buffer.set_limit(0);
        assert!(buffer.snapshot().is_empty());
    }

    #[test]
    fn test_record_layer_captures_message_and_fields() {
        let buffer = Arc::new(RecordBuffer::new(10));
        let subscriber = tracing_subscriber::registry()
            .with(tracing_subscriber::filter::LevelFilter::DEBUG)
            .with(RecordLayer::new(Arc::clone(&buffer)));

        tracing::subscriber::with_default(subscriber, || {
            tracing::callsite::rebuild_interest_cache();
            tracing::warn!(key = "lsd", "token missing");
            tracing::trace!("filtered out");
        });

        let records = buffer.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, Level::WARN);
        assert_eq!(records[0].message, "token missing key=lsd");
    }
}
