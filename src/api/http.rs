use tracing::instrument;

use crate::session::{ApiError, Session};
use crate::transport::Form;

impl Session {
    /// GET any URL with the session's cookies and defaults; returns the body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] on network failure.
    #[instrument(level = "debug", skip(self, query))]
    pub async fn http_get(&self, url: &str, query: &Form) -> Result<String, ApiError> {
        Ok(self.get_raw(url, query).await?.body)
    }

    /// POST a form to any URL with the session's cookies and defaults;
    /// returns the body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] on network failure.
    #[instrument(level = "debug", skip(self, form))]
    pub async fn http_post(&self, url: &str, form: &Form) -> Result<String, ApiError> {
        Ok(self.post_raw(url, form).await?.body)
    }
}
