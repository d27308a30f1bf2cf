//! Canned service pages and helpers for the login integration tests.
#![allow(dead_code)]

use std::time::Duration;

use chat_session::{CookieRecord, LoginFlow, Options, SavedSession, ServiceUrls};
use url::Url;
use wiremock::MockServer;

pub const IDENTITY: &str = "1000123";

pub const LANDING_LOGIN: &str = r#"<html><head><script>
require("ServerJS").handle({"define":[["LSD",[],{"token":"AVpLsd"},323]]});
require("Cookie").set(["_js_datr","dAtR1",1900000000000,"/",false]);
require("Cookie").set(["_js_reg_ext_ref","deleted",0,"/"]);
</script></head><body>
<form id="login_form" action="/login/" method="post">
<input type="hidden" name="jazoest" value="2712">
<input type="hidden" name="lgnrnd" value="0312_Xy">
<input type="email" name="email" value="">
</form></body></html>"#;

pub const AUTHENTICATED: &str = r#"<html><head><script>
{"server_revision":1003035912,"revision":1003035912,"tier":""}
["MqttWebConfig",[],{fbid:"1000123",appID:219994525426954,endpoint:"wss:\/\/edge-chat.service.example\/chat?region=prn&sid=42",pollingEndpoint:"https:\/\/edge-chat.service.example\/mqtt\/pull?region=prn",subscribedTopics:[],capabilities:10,chatVisibility:false,hostNameOverride:""},3790]
</script></head><body>
<input type="hidden" name="fb_dtsg" value="AQ" autocomplete="off">
</body></html>"#;

pub const AUTHENTICATED_NO_ENDPOINT: &str = r#"<html><body>
<input type="hidden" name="fb_dtsg" value="AQ" autocomplete="off">
<div>Welcome back</div>
</body></html>"#;

pub const CHECKPOINT_APPROVALS: &str = r#"<html><body>
<form method="post" action="/checkpoint/?next=https%3A%2F%2Fservice.example%2Fhome.php">
<input type="hidden" name="fb_dtsg" value="cpTok">
<input type="hidden" name="nh" value="nh1">
<input type="text" name="approvals_code" value="">
<button id="checkpointSubmitButton" type="submit">Continue</button>
</form></body></html>"#;

pub const CHECKPOINT_SUSPICIOUS: &str = r#"<html><body>
<h2>Suspicious Login Attempt</h2>
<form method="post" action="/login/checkpoint/">
<input type="hidden" name="fb_dtsg" value="cpTok">
<input type="hidden" name="nh" value="nh1">
</form></body></html>"#;

pub const CHECKPOINT_REVIEW: &str = r#"<html><body>
<h2>Review Recent Login</h2>
<form method="post" action="/login/checkpoint/">
<input type="hidden" name="fb_dtsg" value="cpTok">
<input type="hidden" name="nh" value="nh1">
</form></body></html>"#;

pub const PENDING_POLL: &str = r#"for (;;);{"__ar":1,"payload":null,"lid":"1"}"#;

pub fn host(server: &MockServer) -> String {
    Url::parse(&server.uri())
        .unwrap()
        .host_str()
        .unwrap()
        .to_string()
}

pub fn flow(server: &MockServer, options: Options) -> LoginFlow {
    LoginFlow::new(options)
        .with_urls(ServiceUrls::new(&server.uri()).unwrap())
        .with_poll_interval(Duration::from_millis(50))
}

pub fn saved_session(server: &MockServer) -> SavedSession {
    let host = host(server);
    SavedSession::new(vec![
        CookieRecord::new(host.clone(), "/", "c_user", IDENTITY),
        CookieRecord::new(host, "/", "xs", "secret-xs"),
    ])
}

pub fn identity_cookie_header() -> String {
    format!("c_user={IDENTITY}; Path=/")
}
