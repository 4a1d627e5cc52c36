//! Helpers to pull governance inputs out of request headers.

use axum::http::HeaderMap;
use axum::http::header::COOKIE;

/// Used as client address when the request carries no proxy headers.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Returns the address of the client that sent the request.
///
/// This is the first entry of `X-Forwarded-For`, then `X-Real-IP`. Requests without either
/// header share the [`UNKNOWN_CLIENT`] bucket.
pub fn client_ip(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .unwrap_or(UNKNOWN_CLIENT)
        .to_owned()
}

/// Returns the value of the cookie called `name`, if it is present and not empty.
pub fn cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name && !value.is_empty()).then_some(value)
        })
}
