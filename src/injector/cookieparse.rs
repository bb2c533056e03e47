//! Parsing of the page's `document.cookie` string.

use crate::cookies::encoding;
use cookie::Cookie;

/// Split a cookie string into `(name, decoded value)` pairs.
///
/// Segments without a name or `=` are skipped. A later cookie with the same
/// name replaces the earlier value but keeps its position. Values that fail
/// to decode are kept raw.
pub fn parse_cookie_string(cookies: &str) -> Vec<(String, String)> {
    let mut parsed: Vec<(String, String)> = Vec::new();

    for segment in Cookie::split_parse(cookies) {
        let cookie = match segment {
            Ok(cookie) => cookie,
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed cookie segment");
                continue;
            }
        };

        let decoded = encoding::decode(cookie.name(), cookie.value());
        match parsed.iter_mut().find(|(name, _)| *name == decoded.key) {
            Some(existing) => existing.1 = decoded.url,
            None => parsed.push((decoded.key, decoded.url)),
        }
    }

    parsed
}
