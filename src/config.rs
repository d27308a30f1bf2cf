//! Session configuration and service endpoints.
//!
//! [`Options`] holds the recognized option set with its defaults.
//! [`Options::set_options`] applies a JSON object of option values, coercing
//! each recognized key and warning about everything else; it never fails.
//! [`ServiceUrls`] names the web origin the login flow talks to.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;
use url::Url;

use crate::logging::{DEFAULT_LOG_RECORD_SIZE, LogLevel};
use crate::transport::TransportError;
use crate::user_agent::DEFAULT_USER_AGENT;

/// Recognized option keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKey {
    Online,
    LogLevel,
    LogRecordSize,
    SelfListen,
    ListenEvents,
    ListenTyping,
    PageId,
    UpdatePresence,
    ForceLogin,
    UserAgent,
    AutoMarkDelivery,
    AutoMarkRead,
    Proxy,
}

impl OptionKey {
    const ALL: [Self; 13] = [
        Self::Online,
        Self::LogLevel,
        Self::LogRecordSize,
        Self::SelfListen,
        Self::ListenEvents,
        Self::ListenTyping,
        Self::PageId,
        Self::UpdatePresence,
        Self::ForceLogin,
        Self::UserAgent,
        Self::AutoMarkDelivery,
        Self::AutoMarkRead,
        Self::Proxy,
    ];

    /// The key as it appears in option objects.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::LogLevel => "logLevel",
            Self::LogRecordSize => "logRecordSize",
            Self::SelfListen => "selfListen",
            Self::ListenEvents => "listenEvents",
            Self::ListenTyping => "listenTyping",
            Self::PageId => "pageID",
            Self::UpdatePresence => "updatePresence",
            Self::ForceLogin => "forceLogin",
            Self::UserAgent => "userAgent",
            Self::AutoMarkDelivery => "autoMarkDelivery",
            Self::AutoMarkRead => "autoMarkRead",
            Self::Proxy => "proxy",
        }
    }

    /// Looks up a key by its exact option name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`Options::set_options`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionsUpdate {
    /// Keys whose values were applied, in key order.
    pub applied: Vec<OptionKey>,
    /// One message per ignored key or rejected value.
    pub warnings: Vec<String>,
}

impl OptionsUpdate {
    /// Returns true when `key` was applied.
    #[must_use]
    pub fn touched(&self, key: OptionKey) -> bool {
        self.applied.contains(&key)
    }

    fn warn(&mut self, message: String) {
        warn!(target: "chat_session::config", "{message}");
        self.warnings.push(message);
    }
}

/// Session options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    /// Presence flag forwarded to the listener.
    pub online: bool,
    /// Diagnostic verbosity; `None` leaves the subscriber's level alone.
    pub log_level: Option<LogLevel>,
    /// Size of the in-memory diagnostic record buffer.
    pub log_record_size: usize,
    pub self_listen: bool,
    pub listen_events: bool,
    pub listen_typing: bool,
    /// Delegated identity to operate as.
    #[serde(rename = "pageID")]
    pub page_id: Option<String>,
    pub update_presence: bool,
    /// Permits unattended acknowledgement of simple suspicious-login checkpoints.
    pub force_login: bool,
    pub user_agent: String,
    pub auto_mark_delivery: bool,
    pub auto_mark_read: bool,
    /// Proxy for all exchanges.
    pub proxy: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            online: true,
            log_level: None,
            log_record_size: DEFAULT_LOG_RECORD_SIZE,
            self_listen: false,
            listen_events: false,
            listen_typing: false,
            page_id: None,
            update_presence: false,
            force_login: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            auto_mark_delivery: true,
            auto_mark_read: false,
            proxy: None,
        }
    }
}

impl Options {
    /// Creates the defaults with `options` applied on top.
    #[must_use]
    pub fn with_overrides(options: &Map<String, Value>) -> (Self, OptionsUpdate) {
        let mut config = Self::default();
        let update = config.set_options(options);
        (config, update)
    }

    /// Applies each entry of `options`.
    ///
    /// Flags take the truthiness of their value. `pageID` accepts strings and
    /// numbers. `logLevel` must name a known level and `logRecordSize` must be
    /// a non-negative integer; other values are ignored with a warning. A
    /// non-string or unparseable `proxy` clears the proxy. Unrecognized keys
    /// are ignored with a warning.
    pub fn set_options(&mut self, options: &Map<String, Value>) -> OptionsUpdate {
        let mut update = OptionsUpdate::default();
        for (name, value) in options {
            let Some(key) = OptionKey::from_name(name) else {
                update.warn(format!("Unrecognized option given to setOptions: {name}"));
                continue;
            };
            if self.apply(key, value, &mut update) {
                update.applied.push(key);
            }
        }
        update
    }

    fn apply(&mut self, key: OptionKey, value: &Value, update: &mut OptionsUpdate) -> bool {
        match key {
            OptionKey::Online => self.online = truthy(value),
            OptionKey::SelfListen => self.self_listen = truthy(value),
            OptionKey::ListenEvents => self.listen_events = truthy(value),
            OptionKey::ListenTyping => self.listen_typing = truthy(value),
            OptionKey::UpdatePresence => self.update_presence = truthy(value),
            OptionKey::ForceLogin => self.force_login = truthy(value),
            OptionKey::AutoMarkDelivery => self.auto_mark_delivery = truthy(value),
            OptionKey::AutoMarkRead => self.auto_mark_read = truthy(value),
            OptionKey::LogLevel => {
                let parsed = value.as_str().map(str::parse::<LogLevel>);
                match parsed {
                    Some(Ok(level)) => self.log_level = Some(level),
                    Some(Err(error)) => {
                        update.warn(format!("ignoring logLevel: {error}"));
                        return false;
                    }
                    None => {
                        update.warn(format!("ignoring logLevel: expected a string, got {value}"));
                        return false;
                    }
                }
            }
            OptionKey::LogRecordSize => {
                let Some(size) = value.as_u64().and_then(|size| usize::try_from(size).ok()) else {
                    update.warn(format!(
                        "ignoring logRecordSize: expected a non-negative integer, got {value}"
                    ));
                    return false;
                };
                self.log_record_size = size;
            }
            OptionKey::PageId => match value {
                Value::String(id) if !id.is_empty() => self.page_id = Some(id.clone()),
                Value::Number(id) => self.page_id = Some(id.to_string()),
                _ => {
                    update.warn(format!("ignoring pageID: expected a string or number, got {value}"));
                    return false;
                }
            },
            OptionKey::UserAgent => {
                let Some(agent) = value.as_str().filter(|agent| !agent.trim().is_empty()) else {
                    update.warn(format!("ignoring userAgent: expected a non-empty string, got {value}"));
                    return false;
                };
                self.user_agent = agent.to_string();
            }
            OptionKey::Proxy => {
                self.proxy = match value.as_str() {
                    Some(proxy) if reqwest::Proxy::all(proxy).is_ok() => Some(proxy.to_string()),
                    Some(proxy) => {
                        update.warn(format!("unparseable proxy '{proxy}'; proxy cleared"));
                        None
                    }
                    None => None,
                };
            }
        }
        true
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// The web origin the login flow and feature operations talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUrls {
    base: String,
    cookie_domain: String,
    identity_cookie: String,
}

impl Default for ServiceUrls {
    fn default() -> Self {
        Self {
            base: "https://www.facebook.com".to_string(),
            cookie_domain: "facebook.com".to_string(),
            identity_cookie: "c_user".to_string(),
        }
    }
}

impl ServiceUrls {
    /// Points at `base`, deriving the cookie domain from its host.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidUrl`] when `base` is not an absolute
    /// http(s) URL with a host.
    pub fn new(base: &str) -> Result<Self, TransportError> {
        let parsed = Url::parse(base).map_err(|_| TransportError::invalid_url(base))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TransportError::invalid_url(base));
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| TransportError::invalid_url(base))?;
        let cookie_domain = host.strip_prefix("www.").unwrap_or(host).to_string();
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            cookie_domain,
            ..Self::default()
        })
    }

    /// Overrides the name of the cookie that carries the account identity.
    #[must_use]
    pub fn with_identity_cookie(mut self, name: impl Into<String>) -> Self {
        self.identity_cookie = name.into();
        self
    }

    /// Origin without a trailing slash.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Domain that script-embedded cookies are scoped to.
    #[must_use]
    pub fn cookie_domain(&self) -> &str {
        &self.cookie_domain
    }

    /// Name of the cookie whose value is the account identity.
    #[must_use]
    pub fn identity_cookie(&self) -> &str {
        &self.identity_cookie
    }

    /// Joins an absolute path onto the origin.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    #[must_use]
    pub fn landing(&self) -> String {
        self.url("/")
    }

    #[must_use]
    pub fn login_submit(&self) -> String {
        self.url("/login/device-based/regular/login/?login_attempt=1&lwv=110")
    }

    #[must_use]
    pub fn checkpoint_submit(&self) -> String {
        let next = self.url("/home.php");
        self.url(&format!("/checkpoint/?next={}", urlencoding::encode(&next)))
    }

    /// Resolves a possibly relative redirect target against the origin.
    #[must_use]
    pub fn resolve(&self, target: &str) -> Option<String> {
        let base = Url::parse(&self.landing()).ok()?;
        base.join(target).ok().map(String::from)
    }

    /// Returns true when `location` points at the checkpoint flow on this origin.
    #[must_use]
    pub fn is_checkpoint(&self, location: &str) -> bool {
        let (Some(base), Some(target)) = (
            Url::parse(&self.landing()).ok(),
            self.resolve(location).and_then(|t| Url::parse(&t).ok()),
        ) else {
            return false;
        };
        target.host_str() == base.host_str() && target.path().starts_with("/checkpoint/")
    }
}
