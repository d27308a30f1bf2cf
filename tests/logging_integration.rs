//! Diagnostic records emitted during login.
//!
//! Kept in its own test binary: it installs the global subscriber.

use chat_session::{Credentials, LoginInput, Options, logging};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::pages::{
    AUTHENTICATED, IDENTITY, LANDING_LOGIN, flow, identity_cookie_header, saved_session,
};
use support::socket_guard::start_mock_server_or_skip;

const BLOCK_WARNING: &str = "Checkpoint detected";

fn block_warnings() -> usize {
    logging::recent_records()
        .iter()
        .filter(|record| record.message.contains(BLOCK_WARNING))
        .count()
}

#[tokio::test]
async fn test_block_warning_only_reflects_authenticated_page() {
    assert!(logging::init("chat_session=info", true));
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    // Marker on the login page only: no warning.
    let landing = format!("{LANDING_LOGIN}<a href=\"/checkpoint/block/?next=%2F\"></a>");
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(landing))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(AUTHENTICATED))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/login/device-based/regular/login/"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("{}/home.php", server.uri()).as_str())
                .insert_header("set-cookie", identity_cookie_header().as_str()),
        )
        .mount(&server)
        .await;

    let session = flow(&server, Options::default())
        .login(LoginInput::Credentials(Credentials::new("user@service.example", "hunter2")))
        .await
        .unwrap();
    assert_eq!(session.identity(), IDENTITY);
    assert_eq!(block_warnings(), 0);

    // Marker on the authenticated page: warned once.
    let blocked = format!("{AUTHENTICATED}<a href=\"/checkpoint/block/?next=%2F\"></a>");
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(blocked))
        .mount(&server)
        .await;

    let session = flow(&server, Options::default())
        .login(LoginInput::Saved(saved_session(&server)))
        .await
        .unwrap();
    assert_eq!(session.identity(), IDENTITY);
    assert_eq!(block_warnings(), 1);
}
