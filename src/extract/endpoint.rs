//! Streaming endpoint discovery.
//!
//! The authenticated page carries the real-time endpoint in an object literal
//! with unquoted keys, e.g.
//! `["MqttWebConfig",[],{fbid:"1000",endpoint:"wss:\/\/edge.example\/chat?region=prn"},3790]`.
//! The literal is cut out by brace matching, its bare keys are quoted, and the
//! result is parsed strictly as JSON.

use serde_json::Value;
use tracing::{info, warn};
use url::Url;

const CONFIG_MARKER: &str = "[\"MqttWebConfig\",[],";

/// The real-time streaming endpoint and its routing region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolEndpoint {
    /// Endpoint URL.
    pub url: String,
    /// Uppercased value of the endpoint's `region` query parameter.
    pub region: String,
}

/// Locates and parses the endpoint configuration blob in `body`.
///
/// Returns `None` when the blob is absent, unparseable, or lacks an endpoint
/// with a `region` parameter.
#[must_use]
pub fn protocol_endpoint(body: &str) -> Option<ProtocolEndpoint> {
    let Some(start) = body.find(CONFIG_MARKER) else {
        warn!("endpoint configuration not found in page");
        return None;
    };
    let tail = body[start + CONFIG_MARKER.len()..].trim_start();

    let Some(literal) = object_literal(tail) else {
        warn!("endpoint configuration is truncated");
        return None;
    };
    let parsed: Value = match serde_json::from_str(&quote_bare_keys(literal)) {
        Ok(parsed) => parsed,
        Err(error) => {
            warn!(error = %error, "endpoint configuration is not valid structured data");
            return None;
        }
    };

    let endpoint = parsed.get("endpoint").and_then(Value::as_str)?;
    let region = Url::parse(endpoint).ok().and_then(|url| {
        url.query_pairs()
            .find(|(key, _)| key == "region")
            .map(|(_, value)| value.to_uppercase())
    });
    let Some(region) = region.filter(|region| !region.is_empty()) else {
        warn!(endpoint = %endpoint, "endpoint has no region parameter");
        return None;
    };

    info!(region = %region, "discovered streaming endpoint region");
    Some(ProtocolEndpoint {
        url: endpoint.to_string(),
        region,
    })
}

/// Returns the balanced `{...}` literal at the start of `input`.
fn object_literal(input: &str) -> Option<&str> {
    if !input.starts_with('{') {
        return None;
    }
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (index, ch) in input.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&input[..=index]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Quotes identifier keys that directly follow `{` or `,` and precede `:`.
fn quote_bare_keys(literal: &str) -> String {
    let chars: Vec<char> = literal.chars().collect();
    let mut out = String::with_capacity(literal.len() + 16);
    let mut in_string = false;
    let mut escaped = false;
    let mut last_significant = '\0';
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if in_string {
            out.push(ch);
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => {
                    in_string = false;
                    last_significant = '"';
                }
                _ => {}
            }
            i += 1;
            continue;
        }

        if is_ident_start(ch) && matches!(last_significant, '{' | ',') {
            let start = i;
            while i < chars.len() && is_ident_continue(chars[i]) {
                i += 1;
            }
            let ident: String = chars[start..i].iter().collect();
            let mut lookahead = i;
            while lookahead < chars.len() && chars[lookahead].is_whitespace() {
                lookahead += 1;
            }
            if chars.get(lookahead) == Some(&':') {
                out.push('"');
                out.push_str(&ident);
                out.push('"');
            } else {
                out.push_str(&ident);
            }
            last_significant = 'a';
            continue;
        }

        if ch == '"' {
            in_string = true;
        }
        if !ch.is_whitespace() {
            last_significant = ch;
        }
        out.push(ch);
        i += 1;
    }
    out
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
}
