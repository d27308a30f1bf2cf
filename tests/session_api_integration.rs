//! Integration tests for session-bound feature operations.

use chat_session::{ApiError, Form, Options, SavedSession, Session};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::pages::{AUTHENTICATED, IDENTITY, flow, saved_session};
use support::socket_guard::start_mock_server_or_skip;

async fn logged_in(server: &MockServer) -> Session {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(AUTHENTICATED))
        .mount(server)
        .await;
    flow(server, Options::default())
        .login(saved_session(server).into())
        .await
        .unwrap()
}

fn guarded(payload: &serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_string(format!("for (;;);{payload}"))
}

#[tokio::test]
async fn test_mark_as_read_merges_session_defaults() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let session = logged_in(&server).await;
    Mock::given(method("POST"))
        .and(path("/ajax/mercury/change_read_status.php"))
        .and(body_string_contains("ids%5B42%5D=true"))
        .and(body_string_contains("shouldSendReadReceipt=true"))
        .and(body_string_contains("fb_dtsg=AQ"))
        .and(body_string_contains(&format!("__user={IDENTITY}")))
        .and(body_string_contains("__a=1"))
        .respond_with(guarded(&json!({"payload": {}})))
        .expect(1)
        .mount(&server)
        .await;

    session.mark_as_read("42", true).await.unwrap();
}

#[tokio::test]
async fn test_not_logged_in_payload_invalidates_session() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let session = logged_in(&server).await;
    Mock::given(method("POST"))
        .and(path("/ajax/mercury/mark_seen.php"))
        .and(body_string_contains("seen_timestamp=1700000000000"))
        .respond_with(guarded(&json!({"error": 1_357_001, "errorSummary": "Not Logged In"})))
        .mount(&server)
        .await;

    assert!(session.is_logged_in());
    let result = session.mark_as_seen(Some(1_700_000_000_000)).await;
    assert!(matches!(result, Err(ApiError::NotLoggedIn)));
    assert!(!session.is_logged_in());
}

#[tokio::test]
async fn test_friend_request_error_payload_is_rejected() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let session = logged_in(&server).await;
    Mock::given(method("POST"))
        .and(path("/requests/friends/ajax/"))
        .and(body_string_contains("action=reject"))
        .and(body_string_contains(&format!("viewer_id={IDENTITY}")))
        .respond_with(guarded(&json!({"payload": {"err": "no such request"}})))
        .mount(&server)
        .await;

    let result = session.handle_friend_request("777", false).await;
    assert!(matches!(result, Err(ApiError::Rejected { .. })), "got {result:?}");
    assert!(session.is_logged_in());
}

#[tokio::test]
async fn test_create_group_validates_before_request() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let session = logged_in(&server).await;
    let before = server.received_requests().await.unwrap_or_default().len();

    let result = session.create_new_group(&["111".to_string()], None).await;

    assert!(matches!(result, Err(ApiError::Validation { .. })));
    assert_eq!(server.received_requests().await.unwrap_or_default().len(), before);
}

#[tokio::test]
async fn test_create_group_returns_thread_id() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let session = logged_in(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/graphql/"))
        .and(body_string_contains("doc_id=577041672419534"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"messenger_group_thread_create": {"thread": {"thread_key": {"thread_fbid": "98765"}}}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ids = vec!["111".to_string(), "222".to_string()];
    let thread = session.create_new_group(&ids, Some("Trip")).await.unwrap();
    assert_eq!(thread, "98765");
}

#[tokio::test]
async fn test_http_get_returns_raw_body() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let session = logged_in(&server).await;
    Mock::given(method("GET"))
        .and(path("/ajax/raw"))
        .and(query_param("q", "hello world"))
        .and(query_param("fb_dtsg", "AQ"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<not json>"))
        .mount(&server)
        .await;

    let mut query = Form::new();
    query.set("q", "hello world");
    let body = session
        .http_get(&format!("{}/ajax/raw", server.uri()), &query)
        .await
        .unwrap();
    assert_eq!(body, "<not json>");
}

#[tokio::test]
async fn test_user_agent_change_reaches_requests() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let session = logged_in(&server).await;
    Mock::given(method("POST"))
        .and(path("/ajax/mercury/mark_seen.php"))
        .and(header("user-agent", "TestAgent/2.0"))
        .respond_with(guarded(&json!({"payload": null})))
        .expect(1)
        .mount(&server)
        .await;

    let update = session.set_options(json!({"userAgent": "TestAgent/2.0"}).as_object().unwrap());
    assert!(update.warnings.is_empty());
    assert_eq!(session.options().user_agent, "TestAgent/2.0");
    session.mark_as_seen(Some(1)).await.unwrap();
}

#[tokio::test]
async fn test_export_round_trips_through_json() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let session = logged_in(&server).await;

    let exported = session.export_session();
    let json = exported.to_json_pretty().unwrap();
    let imported = SavedSession::from_json_str(&json).unwrap();

    assert!(imported.warnings.is_empty());
    assert_eq!(imported.session, exported);
    assert!(
        imported
            .session
            .records()
            .iter()
            .any(|record| record.key == "c_user" && record.value() == IDENTITY)
    );
}

#[tokio::test]
async fn test_logout_is_local() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let session = logged_in(&server).await;
    let before = server.received_requests().await.unwrap_or_default().len();
    session.logout();
    assert!(!session.is_logged_in());
    assert_eq!(server.received_requests().await.unwrap_or_default().len(), before);
}
