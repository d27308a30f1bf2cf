//! The login state machine.
//!
//! ```text
//! INIT ─┬─ saved session ───────────────────────────────┐
//!       └─ landing ─ credentials ─┬─ no redirect: REJECTED
//!                                 ├─ checkpoint ─┬─ approval: CheckpointChallenge ─┐
//!                                 │              ├─ forceLogin: acknowledge ───────┤
//!                                 │              └─ otherwise: REJECTED            │
//!                                 └─ direct ──────────────────────────────────────┤
//!                                                                   SESSION_BUILT ◀┘
//! ```
//!
//! Every exchange merges cookies into the store as it completes, so an
//! exported session always reflects the latest progress. Both checkpoint
//! resolutions restart from the saved-session path on a fresh store.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::checkpoint::{CheckpointChallenge, submit_trusting_device};
use super::error::LoginError;
use super::form::{Credentials, LoginInput, login_form};
use crate::auth::{CookieStore, SavedSession};
use crate::config::{Options, OptionsUpdate, ServiceUrls};
use crate::extract::{
    cookies_from_script_fragments, inner_html, location_replace_target, meta_refresh_target,
    protocol_endpoint, scrape_form_inputs,
};
use crate::session::{
    ExtractionDegraded, RequestDefaults, Session, SessionParts, apply_option_effects,
};
use crate::transport::{Exchange, Transport, TransportError, TransportSettings};

/// Interval between checkpoint approval polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5500);

const BLOCKED_CHECKPOINT_MARKER: &str = "/checkpoint/block/?next";
const BROWSER_APPROVAL_MARKER: &str = "checkpoint/?next";
const SUSPICIOUS_LOGIN_MARKER: &str = "Suspicious Login Attempt";

/// Drives one login from credentials or a saved session to a [`Session`].
#[derive(Debug, Clone)]
pub struct LoginFlow {
    options: Options,
    urls: ServiceUrls,
    poll_interval: Duration,
}

impl LoginFlow {
    /// A flow against the default service origin.
    #[must_use]
    pub fn new(options: Options) -> Self {
        Self {
            options,
            urls: ServiceUrls::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// A flow whose options are the defaults with `options` applied, with
    /// log settings pushed to the global subscriber.
    #[must_use]
    pub fn configured(options: &Map<String, Value>) -> (Self, OptionsUpdate) {
        let (options, update) = Options::with_overrides(options);
        apply_option_effects(&update, &options, None);
        (Self::new(options), update)
    }

    #[must_use]
    pub fn with_urls(mut self, urls: ServiceUrls) -> Self {
        self.urls = urls;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    #[must_use]
    pub fn urls(&self) -> &ServiceUrls {
        &self.urls
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Runs the login.
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::CheckpointPending`] when step-up verification is
    /// required, and the other [`LoginError`] variants on failure.
    #[instrument(level = "debug", skip_all)]
    pub async fn login(&self, input: LoginInput) -> Result<Session, LoginError> {
        input.validate()?;
        match input {
            LoginInput::Credentials(credentials) => self.login_with_credentials(credentials).await,
            LoginInput::Saved(saved) => self.resume(saved).await,
        }
    }

    /// Loads the landing page with `saved` cookies and builds the session.
    pub(crate) fn resume(&self, saved: SavedSession) -> BoxFuture<'static, Result<Session, LoginError>> {
        let flow = self.clone();
        async move {
            debug!(cookies = saved.len(), "resuming from saved session");
            let transport = flow.transport(Arc::new(CookieStore::from_saved_session(&saved)))?;
            let landing = transport.get(&flow.urls.landing()).await?;
            flow.establish(transport, landing).await
        }
        .boxed()
    }

    async fn login_with_credentials(&self, credentials: Credentials) -> Result<Session, LoginError> {
        let transport = self.transport(Arc::new(CookieStore::new()))?;
        let landing = transport.get(&self.urls.landing()).await?;

        for record in cookies_from_script_fragments(&landing.body, self.urls.cookie_domain()) {
            transport.cookies().insert(record);
        }
        let form = login_form(&landing.body, &credentials, unix_seconds());

        info!("Logging in...");
        let submitted = transport.post_form(&self.urls.login_submit(), &form).await?;
        let Some(location) = submitted.redirect_target() else {
            return Err(LoginError::rejected("Wrong username/password."));
        };

        if self.urls.is_checkpoint(location) {
            info!("login approvals are turned on for this account");
            let target = self.urls.resolve(location).unwrap_or_else(|| location.to_string());
            return self.checkpoint(transport, &target).await;
        }

        let landing = transport.get(&self.urls.landing()).await?;
        self.establish(transport, landing).await
    }

    async fn checkpoint(&self, transport: Arc<Transport>, url: &str) -> Result<Session, LoginError> {
        let page = transport.get(url).await?;
        let mut form = scrape_form_inputs(&page.body, "form input");
        let submit_url = self.urls.checkpoint_submit();

        if page.body.contains(BROWSER_APPROVAL_MARKER) {
            let label = inner_html(&page.body, "#checkpointSubmitButton");
            let challenge = CheckpointChallenge::start(self.clone(), transport, submit_url, form, label);
            return Err(LoginError::CheckpointPending(Box::new(challenge)));
        }

        if !self.options.force_login {
            return Err(LoginError::rejected(
                "manual verification required; log in with a browser or enable forceLogin",
            ));
        }
        if page.body.contains(SUSPICIOUS_LOGIN_MARKER) {
            form.set("submit[This was me]", "This was me");
        } else {
            form.set("submit[This Is Okay]", "This Is Okay");
        }
        info!("acknowledging login review (forceLogin)");
        let saved = submit_trusting_device(&transport, &submit_url, form).await?;
        self.resume(saved).await
    }

    /// Builds the session from an authenticated landing page.
    async fn establish(&self, transport: Arc<Transport>, landing: Exchange) -> Result<Session, LoginError> {
        let page = match meta_refresh_target(&landing.body) {
            Some(target) => {
                let target = self.urls.resolve(target).unwrap_or_else(|| target.to_string());
                debug!(target = %target, "following meta refresh");
                transport.get(&target).await?
            }
            None => landing,
        };

        let landing_url =
            Url::parse(&self.urls.landing()).map_err(|_| TransportError::invalid_url(self.urls.landing()))?;
        let identity = transport
            .cookies()
            .value_for(&landing_url, self.urls.identity_cookie())
            .filter(|identity| !identity.is_empty())
            .ok_or_else(|| {
                LoginError::rejected(
                    "could not determine identity; the login may have been blocked, log in with a browser to verify",
                )
            })?;

        if page.body.contains(BLOCKED_CHECKPOINT_MARKER) {
            warn!("Checkpoint detected. Please log in with a browser to verify.");
        }

        let endpoint = protocol_endpoint(&page.body);
        let degraded = if endpoint.is_none() {
            warn!("Cannot get streaming endpoint and region; keeping page for inspection");
            Some(ExtractionDegraded {
                reason: "endpoint configuration missing or unparseable".to_string(),
                html: page.body.clone(),
            })
        } else {
            None
        };
        let defaults = RequestDefaults::from_page(&page.body);

        if let Some(page_id) = self.options.page_id.as_deref() {
            self.resolve_page_identity(&transport, page_id).await?;
        }

        let session = Session::new(SessionParts {
            identity,
            urls: self.urls.clone(),
            transport,
            options: self.options.clone(),
            endpoint,
            defaults,
            degraded,
        });
        info!("Done logging in.");
        Ok(session)
    }

    /// Opens the delegated identity's inbox and follows its script redirect.
    async fn resolve_page_identity(&self, transport: &Transport, page_id: &str) -> Result<(), LoginError> {
        let inbox = self.urls.url(&format!(
            "/{}/messages/?section=messages&subsection=inbox",
            urlencoding::encode(page_id)
        ));
        let response = transport.get(&inbox).await?;
        match location_replace_target(&response.body) {
            Some(target) => {
                let target = self.urls.resolve(&target).unwrap_or(target);
                transport.get(&target).await?;
                info!(page_id = %page_id, "operating as page");
            }
            None => warn!(page_id = %page_id, "page inbox did not redirect; continuing as the account"),
        }
        Ok(())
    }

    fn transport(&self, cookies: Arc<CookieStore>) -> Result<Arc<Transport>, LoginError> {
        let settings = TransportSettings {
            user_agent: self.options.user_agent.clone(),
            proxy: self.options.proxy.clone(),
            origin: Some(self.urls.base().to_string()),
        };
        Ok(Arc::new(Transport::new(cookies, settings)?))
    }
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}
