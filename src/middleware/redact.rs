//! Redaction of secrets before request data reaches the logs.

use axum::http::{header, HeaderMap};
use std::collections::BTreeMap;

/// Query parameter names whose values must be redacted in logs.
const SENSITIVE_PARAMS: &[&str] = &[
    "access_token",
    "token",
    "refresh_token",
    "code",
    "client_secret",
    "password",
    "api_key",
    "public_key",
];

const REDACTED: &str = "[REDACTED]";

/// Redact the values of sensitive query parameters.
///
/// Example: `page=1&token=eyJhbG...` becomes `page=1&token=[REDACTED]`
pub fn sanitize_query(query: &str) -> String {
    query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _value)) if is_sensitive(key) => format!("{key}={REDACTED}"),
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn is_sensitive(key: &str) -> bool {
    let key_lower = key.to_ascii_lowercase();
    SENSITIVE_PARAMS.iter().any(|s| key_lower == *s)
}

/// Header map rendered for logging, credentials replaced by a marker.
pub fn sanitize_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let rendered = if name == header::AUTHORIZATION
                || name == header::COOKIE
                || name == header::PROXY_AUTHORIZATION
            {
                REDACTED.to_string()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };
            (name.as_str().to_string(), rendered)
        })
        .collect()
}
