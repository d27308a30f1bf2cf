//! Pending step-up verification.
//!
//! A [`CheckpointChallenge`] owns a background task that resubmits the
//! checkpoint form until the service stops answering with its "still
//! pending" payload, which happens once the login is approved from a
//! browser. The caller may instead resolve it with an approval code. Both
//! paths claim the challenge through one atomic flag, so exactly one of them
//! goes on to build a session; the loser of the race stops.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use super::error::LoginError;
use super::flow::LoginFlow;
use crate::auth::SavedSession;
use crate::extract::strip_json_guard;
use crate::session::Session;
use crate::transport::{Form, Transport};

const REVIEW_RECENT_LOGIN_MARKER: &str = "Review Recent Login";
const DEFAULT_SUBMIT_LABEL: &str = "Continue";

/// Classification of one auto-poll response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Still the structured "pending" payload.
    Pending,
    /// Anything else with a body: the checkpoint moved on.
    Resolved(String),
    /// An empty body; polling continues.
    Malformed,
}

/// Classifies a checkpoint poll response body.
#[must_use]
pub fn classify_poll_response(body: &str) -> PollOutcome {
    let payload = strip_json_guard(body).trim();
    if payload.is_empty() {
        PollOutcome::Malformed
    } else if serde_json::from_str::<Value>(payload).is_ok() {
        PollOutcome::Pending
    } else {
        PollOutcome::Resolved(body.to_string())
    }
}

#[derive(Debug, Default)]
struct ChallengeState {
    claimed: AtomicBool,
    cancel: CancellationToken,
}

impl ChallengeState {
    /// Returns true for the first caller only.
    fn claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

type ApprovalResult = Result<Session, LoginError>;

/// A login waiting on step-up verification.
///
/// Dropping the challenge stops its poll task.
pub struct CheckpointChallenge {
    flow: LoginFlow,
    transport: Arc<Transport>,
    submit_url: String,
    form: Form,
    submit_label: String,
    state: Arc<ChallengeState>,
    poll: Option<JoinHandle<()>>,
    approval: Option<oneshot::Receiver<ApprovalResult>>,
}

impl fmt::Debug for CheckpointChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckpointChallenge")
            .field("submit_url", &self.submit_url)
            .field("fields", &self.form.len())
            .field("claimed", &self.state.claimed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl CheckpointChallenge {
    /// Starts the poll task and returns the challenge that owns it.
    pub(crate) fn start(
        flow: LoginFlow,
        transport: Arc<Transport>,
        submit_url: String,
        form: Form,
        submit_label: Option<String>,
    ) -> Self {
        let state = Arc::new(ChallengeState::default());
        let (sender, receiver) = oneshot::channel();
        info!(
            interval_ms = u64::try_from(flow.poll_interval().as_millis()).unwrap_or(u64::MAX),
            "login approval required; polling for browser approval"
        );
        let poll = tokio::spawn(poll_until_approved(
            flow.clone(),
            Arc::clone(&transport),
            submit_url.clone(),
            form.clone(),
            Arc::clone(&state),
            sender,
        ));
        Self {
            flow,
            transport,
            submit_url,
            form,
            submit_label: submit_label.unwrap_or_else(|| DEFAULT_SUBMIT_LABEL.to_string()),
            state,
            poll: Some(poll),
            approval: Some(receiver),
        }
    }

    /// Where the checkpoint form is submitted.
    #[must_use]
    pub fn submit_url(&self) -> &str {
        &self.submit_url
    }

    /// The scraped checkpoint form.
    #[must_use]
    pub fn form(&self) -> &Form {
        &self.form
    }

    /// True while neither path has claimed the challenge.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.state.claimed.load(Ordering::SeqCst)
    }

    /// Resolves the challenge with an approval code and finishes the login.
    ///
    /// If browser approval already claimed the challenge, this waits for that
    /// login instead of submitting the code. An empty code leaves the
    /// challenge pending and its poll running.
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::Validation`] for an empty code,
    /// [`LoginError::AuthRejected`] when the service does not accept the
    /// approval, [`LoginError::CheckpointAlreadyResolved`] when a code was
    /// already submitted, and any error of the restarted login.
    #[instrument(level = "debug", skip(self, code))]
    pub async fn submit_code(&mut self, code: &str) -> Result<Session, LoginError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(LoginError::Validation("approval code is empty".to_string()));
        }
        if !self.state.claim() {
            debug!("checkpoint already approved from browser; waiting for that login");
            return self.wait_for_approval().await;
        }
        self.stop_polling();
        self.approval = None;

        let mut form = self.form.clone();
        form.set("approvals_code", code)
            .set("submit[Continue]", self.submit_label.as_str());
        let saved = submit_trusting_device(&self.transport, &self.submit_url, form).await?;
        info!("approval code accepted; logging in");
        self.flow.resume(saved).await
    }

    /// Waits until the login is approved from a browser and returns the
    /// session the poll task built. Safe to cancel and call again.
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::CheckpointAlreadyResolved`] when the challenge
    /// was resolved with a code instead, and any error of the restarted login.
    pub async fn wait_for_approval(&mut self) -> Result<Session, LoginError> {
        let Some(approval) = self.approval.as_mut() else {
            return Err(LoginError::CheckpointAlreadyResolved);
        };
        let result = approval.await;
        self.approval = None;
        result.unwrap_or(Err(LoginError::CheckpointAlreadyResolved))
    }

    fn stop_polling(&mut self) {
        self.state.cancel.cancel();
        if let Some(poll) = self.poll.take() {
            poll.abort();
        }
    }
}

impl Drop for CheckpointChallenge {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

async fn poll_until_approved(
    flow: LoginFlow,
    transport: Arc<Transport>,
    url: String,
    form: Form,
    state: Arc<ChallengeState>,
    sender: oneshot::Sender<ApprovalResult>,
) {
    let interval = flow.poll_interval();
    loop {
        tokio::select! {
            () = state.cancel.cancelled() => {
                debug!("checkpoint poll cancelled");
                return;
            }
            () = tokio::time::sleep(interval) => {}
        }

        let exchange = tokio::select! {
            () = state.cancel.cancelled() => return,
            result = transport.post_form(&url, &form) => result,
        };
        let body = match exchange {
            Ok(exchange) => exchange.body,
            Err(e) => {
                error!(error = %e, "checkpoint poll failed");
                continue;
            }
        };

        match classify_poll_response(&body) {
            PollOutcome::Pending => trace!("checkpoint still pending"),
            PollOutcome::Malformed => warn!("empty checkpoint poll response; still waiting"),
            PollOutcome::Resolved(_) => {
                if !state.claim() {
                    return;
                }
                state.cancel.cancel();
                info!("Verified from browser. Logging in...");
                let result = flow.resume(transport.cookies().export()).await;
                let _ = sender.send(result);
                return;
            }
        }
    }
}

/// Posts the checkpoint form, then posts it again asking the service to
/// trust this device. Returns the cookies gathered so far.
pub(crate) async fn submit_trusting_device(
    transport: &Transport,
    url: &str,
    mut form: Form,
) -> Result<SavedSession, LoginError> {
    transport.post_form(url, &form).await?;
    form.set("name_action_selected", "save_device");
    let last = transport.post_form(url, &form).await?;

    if last.redirect_target().is_none() && last.body.contains(REVIEW_RECENT_LOGIN_MARKER) {
        return Err(LoginError::rejected(
            "the service did not accept the checkpoint review",
        ));
    }
    Ok(transport.cookies().export())
}
