//! HTTP exchanges carrying the session cookie store.
//!
//! The [`Transport`] wraps a reqwest client built with redirects disabled so
//! the login flow can inspect `Location` targets itself. The session
//! [`CookieStore`] is installed as the cookie provider: matching cookies are
//! attached to every request and server-set cookies are merged as soon as a
//! response arrives, before the body is read.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, LOCATION, ORIGIN, REFERER, USER_AGENT};
use reqwest::{Client, ClientBuilder, Method, Proxy, redirect};
use tracing::{debug, instrument, warn};
use url::Url;

use super::error::TransportError;
use super::form::Form;
use crate::auth::CookieStore;
use crate::user_agent::effective_user_agent;

/// Connect timeout. Exchanges have no overall timeout.
const CONNECT_TIMEOUT_SECS: u64 = 30;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Identification and routing settings applied to every exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    /// User-Agent header value.
    pub user_agent: String,
    /// Proxy URL for all schemes; `None` uses the environment.
    pub proxy: Option<String>,
    /// Origin sent as `Origin`/`Referer` on every request.
    pub origin: Option<String>,
}

/// A completed exchange: status, final URL, headers and body text.
#[derive(Debug, Clone)]
pub struct Exchange {
    /// HTTP status code.
    pub status: u16,
    /// The URL that produced this response.
    pub url: Url,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body decoded as text.
    pub body: String,
}

impl Exchange {
    /// Returns the unfollowed redirect target, if the server sent one.
    #[must_use]
    pub fn redirect_target(&self) -> Option<&str> {
        self.headers
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
    }
}

/// Performs GET/POST exchanges against the service with the shared cookie store.
///
/// The underlying client is rebuilt when the user agent or proxy changes, so
/// option updates apply to a live session.
pub struct Transport {
    client: RwLock<Client>,
    settings: RwLock<TransportSettings>,
    cookies: Arc<CookieStore>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("settings", &self.settings())
            .field("cookies", &self.cookies.len())
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Creates a transport bound to `cookies`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ClientBuild`] when the HTTP client cannot be
    /// constructed.
    #[instrument(level = "debug", skip(cookies))]
    pub fn new(cookies: Arc<CookieStore>, settings: TransportSettings) -> Result<Self, TransportError> {
        let settings = sanitize_settings(settings);
        let client = build_client(Arc::clone(&cookies), &settings)?;
        Ok(Self {
            client: RwLock::new(client),
            settings: RwLock::new(settings),
            cookies,
        })
    }

    /// Returns the shared cookie store.
    #[must_use]
    pub fn cookies(&self) -> &Arc<CookieStore> {
        &self.cookies
    }

    /// Returns a snapshot of the current settings.
    #[must_use]
    pub fn settings(&self) -> TransportSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Applies a new user agent and proxy, rebuilding the client if they changed.
    ///
    /// An unparseable proxy is dropped with a warning, which clears any proxy
    /// configured before.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ClientBuild`] when the rebuilt client cannot
    /// be constructed; the previous client stays in use.
    pub fn reconfigure(&self, user_agent: &str, proxy: Option<&str>) -> Result<(), TransportError> {
        let mut next = self.settings();
        next.user_agent = user_agent.to_string();
        next.proxy = proxy.map(str::to_string);
        let next = sanitize_settings(next);
        if next == self.settings() {
            return Ok(());
        }

        let client = build_client(Arc::clone(&self.cookies), &next)?;
        *self.client.write().unwrap_or_else(PoisonError::into_inner) = client;
        debug!(proxy = next.proxy.is_some(), "transport reconfigured");
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = next;
        Ok(())
    }

    /// Performs a GET exchange.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] for invalid URLs and network failures.
    pub async fn get(&self, url: &str) -> Result<Exchange, TransportError> {
        self.send(Method::GET, url, None, None).await
    }

    /// Performs a GET exchange with query parameters appended to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] for invalid URLs and network failures.
    pub async fn get_with_query(&self, url: &str, query: &Form) -> Result<Exchange, TransportError> {
        self.send(Method::GET, url, Some(query), None).await
    }

    /// Performs a form-encoded POST exchange.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] for invalid URLs and network failures.
    pub async fn post_form(&self, url: &str, form: &Form) -> Result<Exchange, TransportError> {
        self.send(Method::POST, url, None, Some(form)).await
    }

    #[instrument(level = "debug", skip(self, query, form), fields(method = %method))]
    async fn send(
        &self,
        method: Method,
        url: &str,
        query: Option<&Form>,
        form: Option<&Form>,
    ) -> Result<Exchange, TransportError> {
        let mut parsed = Url::parse(url).map_err(|_| TransportError::invalid_url(url))?;
        if let Some(query) = query.filter(|query| !query.is_empty()) {
            parsed.query_pairs_mut().extend_pairs(query.iter());
        }

        // Clone out of the lock; the guard must not live across an await.
        let client = self
            .client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let settings = self.settings();

        let mut request = client
            .request(method, parsed.clone())
            .header(USER_AGENT, settings.user_agent.as_str());
        if let Some(origin) = settings.origin.as_deref() {
            request = request.header(ORIGIN, origin).header(REFERER, origin);
        }
        if let Some(form) = form {
            request = request
                .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
                .body(form.encode());
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(url, e))?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(url, e))?;

        debug!(
            status,
            url = %final_url,
            redirect = headers.get(LOCATION).is_some(),
            bytes = body.len(),
            "exchange complete"
        );

        Ok(Exchange {
            status,
            url: final_url,
            headers,
            body,
        })
    }
}

fn sanitize_settings(mut settings: TransportSettings) -> TransportSettings {
    settings.user_agent = effective_user_agent(&settings.user_agent).to_string();
    if let Some(proxy) = settings.proxy.as_deref()
        && Proxy::all(proxy).is_err()
    {
        warn!(proxy = %proxy, "ignoring unparseable proxy; proxy cleared");
        settings.proxy = None;
    }
    settings
}

fn build_client(cookies: Arc<CookieStore>, settings: &TransportSettings) -> Result<Client, TransportError> {
    match try_build_client(Arc::clone(&cookies), settings, false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // Some sandboxed environments panic while reading system proxy
            // settings; retry with environment proxies only.
            warn!("HTTP client builder panicked while loading system proxy settings; retrying with env-proxy fallback");
            match try_build_client(cookies, settings, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Panic) => Err(TransportError::client_build(
                    "client builder panicked while applying env-proxy fallback",
                )),
                Err(BuildClientFailure::Build(error)) => {
                    Err(TransportError::client_build(error.to_string()))
                }
            }
        }
        Err(BuildClientFailure::Build(error)) => Err(TransportError::client_build(error.to_string())),
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build_client(
    cookies: Arc<CookieStore>,
    settings: &TransportSettings,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    let settings = settings.clone();
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_client_builder(cookies, &settings);
        if disable_system_proxy_lookup && settings.proxy.is_none() {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_client_builder(cookies: Arc<CookieStore>, settings: &TransportSettings) -> ClientBuilder {
    let mut builder = Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(redirect::Policy::none())
        .gzip(true)
        .user_agent(settings.user_agent.as_str())
        .cookie_provider(cookies);
    if let Some(proxy) = settings.proxy.as_deref()
        && let Ok(proxy) = Proxy::all(proxy)
    {
        builder = builder.proxy(proxy);
    }
    builder
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    let https = find_first_proxy_var(&["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"]);
    if let Some(proxy) = https
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    let http = find_first_proxy_var(&["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"]);
    if let Some(proxy) = http
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn find_first_proxy_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
