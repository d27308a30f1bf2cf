//! Form scraping and client-side redirect detection.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use super::{between, compile_static_regex};
use crate::transport::Form;

static META_REFRESH_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"<meta http-equiv="refresh" content="0;url=([^"]+)[^>]+>"#)
});

fn compile_selector(selector: &str) -> Option<Selector> {
    Selector::parse(selector).ok()
}

/// Collects `name`/`value` pairs of the inputs matched by `selector`.
///
/// Inputs without a name or with an empty value are left out. An invalid
/// selector yields an empty form.
#[must_use]
pub fn scrape_form_inputs(html: &str, selector: &str) -> Form {
    let mut form = Form::new();
    let Some(selector) = compile_selector(selector) else {
        return form;
    };
    let document = Html::parse_document(html);
    for input in document.select(&selector) {
        let element = input.value();
        let (Some(name), Some(value)) = (element.attr("name"), element.attr("value")) else {
            continue;
        };
        if !name.is_empty() && !value.is_empty() {
            form.set(name, value);
        }
    }
    form
}

/// Returns the inner HTML of the first element matching `selector`, trimmed.
#[must_use]
pub fn inner_html(html: &str, selector: &str) -> Option<String> {
    let selector = compile_selector(selector)?;
    let document = Html::parse_document(html);
    let inner = document.select(&selector).next()?.inner_html();
    let inner = inner.trim();
    (!inner.is_empty()).then(|| inner.to_string())
}

/// Returns the target of a zero-delay `<meta http-equiv="refresh">` redirect.
#[must_use]
pub fn meta_refresh_target(html: &str) -> Option<&str> {
    META_REFRESH_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|target| !target.is_empty())
}

/// Returns the JSON-unescaped target of a `window.location.replace("...")` call.
#[must_use]
pub fn location_replace_target(html: &str) -> Option<String> {
    let raw = between(html, "window.location.replace(\"", "\")")?;
    let target = raw.replace("\\/", "/");
    (!target.is_empty()).then_some(target)
}
