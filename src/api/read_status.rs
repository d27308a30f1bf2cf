use serde_json::Value;
use tracing::{error, instrument};

use super::unix_millis;
use crate::session::{ApiError, Session};
use crate::transport::Form;

impl Session {
    /// Marks a thread read or unread.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] when the payload carries an `error`,
    /// and the bound request errors otherwise.
    #[instrument(level = "debug", skip(self))]
    pub async fn mark_as_read(&self, thread_id: &str, read: bool) -> Result<(), ApiError> {
        let mut form = Form::new();
        if let Some(page_id) = self.options().page_id {
            form.set("source", "PagesManagerMessagesInterface")
                .set("request_user_id", page_id);
        }
        form.set(format!("ids[{thread_id}]"), read.to_string())
            .set("watermarkTimestamp", unix_millis().to_string())
            .set("shouldSendReadReceipt", "true")
            .set("commerce_last_message_type", "");

        let url = self.urls().url("/ajax/mercury/change_read_status.php");
        let result = self
            .post(&url, &form)
            .await
            .and_then(|payload| reject_error_payload("markAsRead", &payload));
        if let Err(e) = &result {
            error!(error = %e, "markAsRead failed");
        }
        result
    }

    /// Marks everything seen up to `seen_timestamp` (milliseconds; now when `None`).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] when the payload carries an `error`,
    /// and the bound request errors otherwise.
    #[instrument(level = "debug", skip(self))]
    pub async fn mark_as_seen(&self, seen_timestamp: Option<u64>) -> Result<(), ApiError> {
        let mut form = Form::new();
        form.set(
            "seen_timestamp",
            seen_timestamp.unwrap_or_else(unix_millis).to_string(),
        );

        let url = self.urls().url("/ajax/mercury/mark_seen.php");
        let result = self
            .post(&url, &form)
            .await
            .and_then(|payload| reject_error_payload("markAsSeen", &payload));
        if let Err(e) = &result {
            error!(error = %e, "markAsSeen failed");
        }
        result
    }
}

fn reject_error_payload(operation: &'static str, payload: &Value) -> Result<(), ApiError> {
    match payload.get("error") {
        None | Some(Value::Null) => Ok(()),
        Some(error) => Err(ApiError::rejected(operation, error.to_string())),
    }
}
