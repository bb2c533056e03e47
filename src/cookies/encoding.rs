//! Mapping between override entries and cookie name/value pairs.
//!
//! An override travels as one cookie: the name is the override key
//! (`appName/featureKey`) and the value is the replacement URL, percent-encoded
//! the way `encodeURIComponent` does it. Pure functions, no I/O.

use crate::base::overrideerror::OverrideError;
use crate::profile::OverrideEntry;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

/// Separates the application name from the feature key.
pub const KEY_SEPARATOR: char = '/';

/// Characters left untouched by `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Cookie form of one override entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedOverride {
    pub name: String,
    pub value: String,
}

/// Override recovered from a cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedOverride {
    pub key: String,
    pub url: String,
}

impl DecodedOverride {
    /// `(appName, featureKey)`, split at the first separator.
    pub fn split_key(&self) -> Option<(&str, &str)> {
        self.key.split_once(KEY_SEPARATOR)
    }

    /// Parse the URL, accepting only absolute http and https URLs.
    pub fn validate(&self) -> Result<Url, OverrideError> {
        let invalid = || OverrideError::InvalidOverrideUrl {
            key: self.key.clone(),
            url: self.url.clone(),
        };
        let url = Url::parse(&self.url).map_err(|_| invalid())?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            _ => Err(invalid()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

pub fn override_key(app_name: &str, feature_key: &str) -> String {
    format!("{}{}{}", app_name, KEY_SEPARATOR, feature_key)
}

pub fn encode(entry: &OverrideEntry) -> EncodedOverride {
    EncodedOverride {
        name: entry.key(),
        value: encode_component(&entry.url),
    }
}

/// Decode a cookie pair. Never fails: an undecodable value is kept raw.
pub fn decode(name: &str, value: &str) -> DecodedOverride {
    let url = match decode_component(value) {
        Some(url) => url,
        None => {
            tracing::warn!(
                name = %name,
                value = %value,
                "failed to decode override value, using raw value"
            );
            value.to_string()
        }
    };

    DecodedOverride {
        key: name.to_string(),
        url,
    }
}

/// A cookie name that looks like an override key.
///
/// Any name containing the separator qualifies, so unrelated cookies with a
/// slash in their name are treated as overrides too.
pub fn is_candidate(name: &str) -> bool {
    name.contains(KEY_SEPARATOR) && name.len() > 1
}

pub fn encode_component(input: &str) -> String {
    utf8_percent_encode(input, URI_COMPONENT).to_string()
}

/// Strict inverse of [`encode_component`]: malformed escapes and
/// non-UTF-8 results yield `None`.
pub fn decode_component(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let well_formed = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !well_formed {
                return None;
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    percent_decode_str(input)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}
