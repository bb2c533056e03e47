//! Host collaborators: cookie jar, tab scripting and persistent storage.
//!
//! Every call into the host is asynchronous and may fail independently.
//! There is no batch or transactional primitive; callers fan out and join.
//!
//! | Host surface | Trait | Simulated implementation |
//! |--------------|-------|--------------------------|
//! | Cookie jar of the active tab | [`CookieJar`] | [`SimulatedBrowser`](browser::SimulatedBrowser) |
//! | Tab scripting and reload | [`TabHost`] | [`SimulatedBrowser`](browser::SimulatedBrowser) |
//! | Page context | [`PageContext`](crate::injector::PageContext) | [`SimulatedPage`](page::SimulatedPage) |
//! | Key-value storage | [`ProfileStorage`] | [`MemoryStorage`](storage::MemoryStorage), [`JsonFileStorage`](storage::JsonFileStorage) |

pub mod browser;
pub mod page;
pub mod storage;

use crate::base::overrideerror::OverrideError;
use crate::cookies::canonical_cookie::CanonicalCookie;
use crate::injector::program::{PageProgram, ProgramOutcome};
use std::{fmt, future::Future, pin::Pin, sync::Arc};
use url::Url;

/// Alias for the `Future` type returned by host calls.
pub type HostFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, OverrideError>> + Send + 'a>>;

/// Identifier of a browser tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabId(pub u32);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The active tab as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub id: TabId,
    pub url: Option<Url>,
}

impl Tab {
    /// Hostname the tab's cookies are scoped to.
    pub fn hostname(&self) -> Option<&str> {
        self.url.as_ref().and_then(|u| u.host_str())
    }
}

/// Filter for [`CookieJar::get_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieQuery {
    pub domain: String,
    pub name: Option<String>,
}

impl CookieQuery {
    pub fn domain(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            name: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Arguments of [`CookieJar::set`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub url: Url,
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: String,
}

/// Cookie jar of the browser.
pub trait CookieJar: Send + Sync {
    /// Enumerate cookies of a domain (and its subdomains).
    fn get_all(&self, query: CookieQuery) -> HostFuture<'_, Vec<CanonicalCookie>>;

    /// Set a cookie; an existing cookie with the same name is overwritten.
    fn set(&self, cookie: SetCookie) -> HostFuture<'_, ()>;

    /// Remove the cookie named `name` that applies to `url`.
    fn remove(&self, url: Url, name: String) -> HostFuture<'_, ()>;
}

/// Tab query, scripting and navigation.
pub trait TabHost: Send + Sync {
    /// The active tab of the current window, if any.
    fn active_tab(&self) -> HostFuture<'_, Option<Tab>>;

    fn insert_css(&self, tab: TabId, css: String) -> HostFuture<'_, ()>;

    /// Run a page program inside the tab's page context.
    fn execute(&self, tab: TabId, program: PageProgram) -> HostFuture<'_, ProgramOutcome>;

    fn reload(&self, tab: TabId, bypass_cache: bool) -> HostFuture<'_, ()>;
}

/// A host exposing both the cookie jar and tab scripting.
pub trait BrowserHost: TabHost + CookieJar {}

impl<T: TabHost + CookieJar> BrowserHost for T {}

/// Persistent key-value storage.
pub trait ProfileStorage: Send + Sync {
    fn get(&self, key: String) -> HostFuture<'_, Option<serde_json::Value>>;

    /// Replace the value stored under `key` as a whole.
    fn set(&self, key: String, value: serde_json::Value) -> HostFuture<'_, ()>;
}

impl<C: CookieJar + ?Sized> CookieJar for Arc<C> {
    fn get_all(&self, query: CookieQuery) -> HostFuture<'_, Vec<CanonicalCookie>> {
        (**self).get_all(query)
    }

    fn set(&self, cookie: SetCookie) -> HostFuture<'_, ()> {
        (**self).set(cookie)
    }

    fn remove(&self, url: Url, name: String) -> HostFuture<'_, ()> {
        (**self).remove(url, name)
    }
}

impl<T: TabHost + ?Sized> TabHost for Arc<T> {
    fn active_tab(&self) -> HostFuture<'_, Option<Tab>> {
        (**self).active_tab()
    }

    fn insert_css(&self, tab: TabId, css: String) -> HostFuture<'_, ()> {
        (**self).insert_css(tab, css)
    }

    fn execute(&self, tab: TabId, program: PageProgram) -> HostFuture<'_, ProgramOutcome> {
        (**self).execute(tab, program)
    }

    fn reload(&self, tab: TabId, bypass_cache: bool) -> HostFuture<'_, ()> {
        (**self).reload(tab, bypass_cache)
    }
}

impl<S: ProfileStorage + ?Sized> ProfileStorage for Arc<S> {
    fn get(&self, key: String) -> HostFuture<'_, Option<serde_json::Value>> {
        (**self).get(key)
    }

    fn set(&self, key: String, value: serde_json::Value) -> HostFuture<'_, ()> {
        (**self).set(key, value)
    }
}
