//! Bound requests: session defaults in, login-checked payloads out.

use serde_json::Value;
use tracing::{debug, instrument};

use super::error::{ApiError, NOT_LOGGED_IN_CODE};
use super::Session;
use crate::extract::strip_json_guard;
use crate::transport::{Exchange, Form};

/// Classifies a response body from a bound request.
///
/// The `for (;;);` guard is stripped and the rest parsed as JSON. A payload
/// whose `error` is the not-logged-in code yields [`ApiError::NotLoggedIn`].
///
/// # Errors
///
/// Returns [`ApiError::MalformedResponse`] for bodies that are not JSON and
/// [`ApiError::NotLoggedIn`] for invalidated sessions.
pub fn classify_login_check(exchange: &Exchange) -> Result<Value, ApiError> {
    let payload: Value = serde_json::from_str(strip_json_guard(&exchange.body)).map_err(|error| {
        ApiError::MalformedResponse {
            url: exchange.url.to_string(),
            status: exchange.status,
            reason: error.to_string(),
        }
    })?;
    if payload.get("error").and_then(Value::as_i64) == Some(NOT_LOGGED_IN_CODE) {
        return Err(ApiError::NotLoggedIn);
    }
    Ok(payload)
}

impl Session {
    /// GET with the session defaults merged into `query`, routed through the
    /// login check.
    ///
    /// # Errors
    ///
    /// See [`classify_login_check`]; transport failures are passed through.
    #[instrument(level = "debug", skip(self, query))]
    pub async fn get(&self, url: &str, query: &Form) -> Result<Value, ApiError> {
        let query = self.with_defaults(query);
        let exchange = self.transport().get_with_query(url, &query).await?;
        self.check(&exchange)
    }

    /// POST with the session defaults merged into `form`, routed through the
    /// login check.
    ///
    /// # Errors
    ///
    /// See [`classify_login_check`]; transport failures are passed through.
    #[instrument(level = "debug", skip(self, form))]
    pub async fn post(&self, url: &str, form: &Form) -> Result<Value, ApiError> {
        let form = self.with_defaults(form);
        let exchange = self.transport().post_form(url, &form).await?;
        self.check(&exchange)
    }

    /// GET with the session defaults, returning the raw exchange unchecked.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] on network failure.
    pub async fn get_raw(&self, url: &str, query: &Form) -> Result<Exchange, ApiError> {
        let query = self.with_defaults(query);
        Ok(self.transport().get_with_query(url, &query).await?)
    }

    /// POST with the session defaults, returning the raw exchange unchecked.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] on network failure.
    pub async fn post_raw(&self, url: &str, form: &Form) -> Result<Exchange, ApiError> {
        let form = self.with_defaults(form);
        Ok(self.transport().post_form(url, &form).await?)
    }

    fn with_defaults(&self, fields: &Form) -> Form {
        let mut merged = fields.clone();
        self.request_defaults()
            .merge_into(&mut merged, self.identity(), self.next_request_number());
        merged
    }

    fn check(&self, exchange: &Exchange) -> Result<Value, ApiError> {
        let result = classify_login_check(exchange);
        match &result {
            Err(ApiError::NotLoggedIn) => self.mark_logged_out(),
            Err(error) => debug!(error = %error, "bound request failed classification"),
            Ok(_) => {}
        }
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;
    use url::Url;

    fn exchange(body: &str) -> Exchange {
        Exchange {
            status: 200,
            url: Url::parse("https://service.example/ajax/x.php").unwrap(),
            headers: HeaderMap::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_guarded_payload_is_parsed() {
        let payload = classify_login_check(&exchange(r#"for (;;);{"payload":{"ok":true}}"#)).unwrap();
        assert_eq!(payload["payload"]["ok"], Value::Bool(true));
    }

    #[test]
    fn test_not_logged_in_code() {
        let result = classify_login_check(&exchange(r#"for (;;);{"error":1357001,"errorSummary":"Not Logged In"}"#));
        assert!(matches!(result, Err(ApiError::NotLoggedIn)));
    }

    #[test]
    fn test_other_errors_are_payloads() {
        let payload = classify_login_check(&exchange(r#"{"error":1545012}"#)).unwrap();
        assert_eq!(payload["error"], 1_545_012);
    }

    #[test]
    fn test_html_is_malformed() {
        let result = classify_login_check(&exchange("<html>login</html>"));
        assert!(matches!(
            result,
            Err(ApiError::MalformedResponse { status: 200, .. })
        ));
    }
}
