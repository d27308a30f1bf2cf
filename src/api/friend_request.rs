use serde_json::Value;
use tracing::{error, instrument};

use crate::session::{ApiError, Session};
use crate::transport::Form;

impl Session {
    /// Confirms or rejects an incoming friend request from `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] when the payload carries `payload.err`,
    /// and the bound request errors otherwise.
    #[instrument(level = "debug", skip(self))]
    pub async fn handle_friend_request(&self, user_id: &str, accept: bool) -> Result<(), ApiError> {
        if user_id.trim().is_empty() {
            return Err(ApiError::validation("handleFriendRequest", "user id is empty"));
        }

        let mut form = Form::new();
        form.set("viewer_id", self.identity())
            .set("id", user_id)
            .set("frefs[0]", "jwl")
            .set("floc", "friend_center_requests")
            .set("ref", "/reqs.php")
            .set("action", if accept { "confirm" } else { "reject" });

        let url = self.urls().url("/requests/friends/ajax/");
        let result = self.post(&url, &form).await.and_then(|payload| {
            match payload.pointer("/payload/err") {
                None | Some(Value::Null) => Ok(()),
                Some(err) => Err(ApiError::rejected("handleFriendRequest", err.to_string())),
            }
        });
        if let Err(e) = &result {
            error!(error = %e, "handleFriendRequest failed");
        }
        result
    }
}
