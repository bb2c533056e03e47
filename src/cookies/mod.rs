//! Cookie storage and the override cookie protocol.
//!
//! This module provides everything that touches cookies:
//!
//! - **Protocol**: Override entries as cookie name/value pairs ([`encoding`])
//! - **Synchronization**: Clearing, writing and removing override cookies of
//!   the active tab ([`CookieSynchronizer`](synchronizer::CookieSynchronizer))
//! - **Storage**: In-memory cookie jar ([`CookieMonster`](monster::CookieMonster))
//!
//! # Architecture
//!
//! | Concern | Type | Responsibility |
//! |---------|------|----------------|
//! | Cookie protocol | [`encoding`] | `appName/featureKey` = percent-encoded URL |
//! | Tab sync | [`CookieSynchronizer`](synchronizer::CookieSynchronizer) | Snapshot clear, bulk write, name-scoped removal |
//! | Cookie jar | [`CookieMonster`](monster::CookieMonster) | Domain/path matching, eviction |
//! | Single cookie | [`CanonicalCookie`](canonical_cookie::CanonicalCookie) | Cookie representation |
//!
//! # Encoding an override
//!
//! ```rust
//! use scriptswap::cookies::encoding;
//! use scriptswap::profile::OverrideEntry;
//!
//! let entry = OverrideEntry::new("checkout", "bootstrap/js", "https://cdn.example.com/a.js");
//! let cookie = encoding::encode(&entry);
//! assert_eq!(cookie.name, "checkout/bootstrap/js");
//! assert_eq!(cookie.value, "https%3A%2F%2Fcdn.example.com%2Fa.js");
//!
//! let decoded = encoding::decode(&cookie.name, &cookie.value);
//! assert_eq!(decoded.url, entry.url);
//! ```

pub mod canonical_cookie;
pub mod encoding;
pub mod monster;
pub mod synchronizer;
