//! Tokens scraped from the authenticated page and merged into every bound
//! request.

use crate::extract::between;
use crate::transport::Form;

/// Per-session request defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestDefaults {
    /// Anti-forgery token.
    pub fb_dtsg: Option<String>,
    /// Checksum derived from the anti-forgery token.
    pub jazoest: Option<String>,
    /// Client revision the page was served with.
    pub revision: Option<String>,
}

impl RequestDefaults {
    /// Scrapes the defaults out of an authenticated page.
    #[must_use]
    pub fn from_page(html: &str) -> Self {
        let fb_dtsg = between(html, "name=\"fb_dtsg\" value=\"", "\"")
            .filter(|token| !token.is_empty())
            .map(str::to_string);
        let jazoest = fb_dtsg.as_deref().map(jazoest_for);
        let revision = between(html, "\"revision\":", ",")
            .map(str::trim)
            .filter(|revision| !revision.is_empty())
            .map(str::to_string);
        Self {
            fb_dtsg,
            jazoest,
            revision,
        }
    }

    /// Writes the defaults into `form` without overriding fields already set.
    pub fn merge_into(&self, form: &mut Form, identity: &str, request_number: u64) {
        form.set_default("__user", identity)
            .set_default("__req", to_base36(request_number))
            .set_default("__a", "1");
        if let Some(revision) = &self.revision {
            form.set_default("__rev", revision.as_str());
        }
        if let Some(fb_dtsg) = &self.fb_dtsg {
            form.set_default("fb_dtsg", fb_dtsg.as_str());
        }
        if let Some(jazoest) = &self.jazoest {
            form.set_default("jazoest", jazoest.as_str());
        }
    }
}

/// `"2"` followed by the decimal code of every character of `token`.
fn jazoest_for(token: &str) -> String {
    let mut out = String::from("2");
    for ch in token.chars() {
        out.push_str(&u32::from(ch).to_string());
    }
    out
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
