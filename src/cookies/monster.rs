use crate::cookies::canonical_cookie::{CanonicalCookie, SameSite};
use dashmap::DashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use url::Url;

/// Maximum cookies per domain (Chromium default).
const MAX_COOKIES_PER_DOMAIN: usize = 50;

/// Maximum total cookies held by one jar.
const MAX_COOKIES_TOTAL: usize = 3000;

/// In-memory cookie jar backing the simulated browser.
/// Modeled after Chromium's `net::CookieMonster`.
///
/// Cloning is cheap and yields a handle to the same store.
#[derive(Clone)]
pub struct CookieMonster {
    // Store: Map<Domain, List<Cookie>>
    store: Arc<DashMap<String, Vec<CanonicalCookie>>>,
}

impl Default for CookieMonster {
    fn default() -> Self {
        Self::new()
    }
}

impl CookieMonster {
    pub fn new() -> Self {
        Self {
            store: Arc::new(DashMap::new()),
        }
    }

    /// Insert a cookie, replacing any with the same domain, name and path.
    pub fn set_canonical_cookie(&self, cookie: CanonicalCookie) {
        let mut entry = self.store.entry(cookie.domain.clone()).or_default();

        entry.retain(|c| c.name != cookie.name || c.path != cookie.path);

        // Oldest-first eviction once the domain is full
        while entry.len() >= MAX_COOKIES_PER_DOMAIN {
            if let Some(oldest_idx) = entry
                .iter()
                .enumerate()
                .min_by_key(|(_, c)| c.creation_time)
                .map(|(i, _)| i)
            {
                entry.remove(oldest_idx);
            } else {
                break;
            }
        }

        entry.push(cookie);
        drop(entry); // Release the shard lock before walking every domain

        self.enforce_global_limit();
    }

    fn enforce_global_limit(&self) {
        while self.total_cookie_count() > MAX_COOKIES_TOTAL {
            let mut oldest: Option<(String, usize, OffsetDateTime)> = None;

            for entry in self.store.iter() {
                for (idx, cookie) in entry.value().iter().enumerate() {
                    let older = oldest
                        .as_ref()
                        .map_or(true, |(_, _, t)| cookie.creation_time < *t);
                    if older {
                        oldest = Some((entry.key().clone(), idx, cookie.creation_time));
                    }
                }
            }

            match oldest {
                Some((domain, idx, _)) => {
                    if let Some(mut entry) = self.store.get_mut(&domain) {
                        if idx < entry.len() {
                            entry.remove(idx);
                        }
                    }
                }
                None => break,
            }
        }
    }

    /// Get cookies visible to the URL, longest path first.
    pub fn get_cookies_for_url(&self, url: &Url) -> Vec<CanonicalCookie> {
        let mut result = Vec::new();
        let host = url.host_str().unwrap_or("");
        let now = OffsetDateTime::now_utc();

        for domain in Self::get_matching_domains(host) {
            if let Some(entry) = self.store.get(&domain) {
                for cookie in entry.iter() {
                    if !Self::domain_matches(&cookie.domain, host, cookie.host_only) {
                        continue;
                    }
                    if !Self::path_matches(&cookie.path, url.path()) {
                        continue;
                    }
                    if cookie.secure && url.scheme() != "https" {
                        continue;
                    }
                    if cookie.is_expired(now) {
                        continue;
                    }
                    result.push(cookie.clone());
                }
            }
        }

        result.sort_by(|a, b| {
            b.path
                .len()
                .cmp(&a.path.len())
                .then_with(|| a.creation_time.cmp(&b.creation_time))
        });

        result
    }

    /// Render the `document.cookie` view for a page at `url`.
    pub fn cookie_header(&self, url: &Url) -> String {
        self.get_cookies_for_url(url)
            .into_iter()
            .filter(|c| !c.http_only)
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Cookies whose domain is `domain` or one of its subdomains,
    /// optionally restricted to one name.
    pub fn cookies_for_domain(&self, domain: &str, name: Option<&str>) -> Vec<CanonicalCookie> {
        let domain = domain.trim_start_matches('.').to_lowercase();
        let now = OffsetDateTime::now_utc();

        self.iter_all_cookies()
            .filter(|c| {
                c.domain == domain
                    || (c.domain.len() > domain.len()
                        && c.domain.ends_with(&domain)
                        && c.domain[..c.domain.len() - domain.len()].ends_with('.'))
            })
            .filter(|c| name.map_or(true, |n| c.name == n))
            .filter(|c| !c.is_expired(now))
            .collect()
    }

    /// Remove every cookie named `name` that a request to `url` would carry.
    /// Returns the number of cookies removed.
    pub fn remove(&self, url: &Url, name: &str) -> usize {
        let host = url.host_str().unwrap_or("");
        let mut removed = 0;

        for domain in Self::get_matching_domains(host) {
            if let Some(mut entry) = self.store.get_mut(&domain) {
                let before = entry.len();
                entry.retain(|c| {
                    c.name != name
                        || !Self::domain_matches(&c.domain, host, c.host_only)
                        || !Self::path_matches(&c.path, url.path())
                });
                removed += before - entry.len();
            }
        }

        removed
    }

    /// Check if cookie domain matches request host.
    /// Implements RFC 6265 domain matching.
    fn domain_matches(cookie_domain: &str, request_host: &str, host_only: bool) -> bool {
        if host_only {
            return cookie_domain.eq_ignore_ascii_case(request_host);
        }

        let cookie_domain = cookie_domain.trim_start_matches('.');

        if request_host.eq_ignore_ascii_case(cookie_domain) {
            return true;
        }

        if request_host.len() > cookie_domain.len() {
            let split = request_host.len() - cookie_domain.len();
            let suffix = &request_host[split..];
            if suffix.eq_ignore_ascii_case(cookie_domain) {
                return request_host.as_bytes()[split - 1] == b'.';
            }
        }

        false
    }

    /// Check if request path matches cookie path.
    /// Implements RFC 6265 path matching.
    fn path_matches(cookie_path: &str, request_path: &str) -> bool {
        if request_path == cookie_path {
            return true;
        }

        if request_path.starts_with(cookie_path) {
            if cookie_path.ends_with('/') {
                return true;
            }
            return request_path.as_bytes().get(cookie_path.len()) == Some(&b'/');
        }

        false
    }

    /// The host itself and all parent domains.
    fn get_matching_domains(host: &str) -> Vec<String> {
        let host = host.to_lowercase();
        let mut domains = vec![host.clone()];

        // "foo.bar.example.com" also checks "bar.example.com" and "example.com"
        let parts: Vec<&str> = host.split('.').collect();
        for i in 1..parts.len().saturating_sub(1) {
            domains.push(parts[i..].join("."));
        }

        domains
    }

    /// Parse a `Set-Cookie` line received for `url` and store it.
    /// Returns false when the line is rejected.
    pub fn parse_and_save_cookie(&self, url: &Url, cookie_line: &str) -> bool {
        use cookie::Cookie;

        let parsed = match Cookie::parse(cookie_line) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!(line = %cookie_line, error = %e, "rejected cookie line");
                return false;
            }
        };

        let request_host = url.host_str().unwrap_or("").to_lowercase();
        let (domain, host_only) = match parsed.domain() {
            Some(d) => {
                let d = d.trim_start_matches('.').to_lowercase();
                if !Self::domain_matches(&d, &request_host, false) {
                    tracing::debug!(
                        domain = %d,
                        host = %request_host,
                        "cookie domain does not cover host"
                    );
                    return false;
                }
                (d, false)
            }
            None => (request_host, true),
        };

        let same_site = match parsed.same_site() {
            Some(cookie::SameSite::Lax) => SameSite::Lax,
            Some(cookie::SameSite::Strict) => SameSite::Strict,
            Some(cookie::SameSite::None) => SameSite::NoRestriction,
            None => SameSite::Unspecified,
        };

        self.set_canonical_cookie(CanonicalCookie {
            name: parsed.name().to_string(),
            value: parsed.value().to_string(),
            domain,
            path: parsed.path().unwrap_or("/").to_string(),
            creation_time: OffsetDateTime::now_utc(),
            expiration_time: parsed.expires().and_then(|e| e.datetime()),
            secure: parsed.secure().unwrap_or(false),
            http_only: parsed.http_only().unwrap_or(false),
            host_only,
            same_site,
        });
        true
    }

    pub fn total_cookie_count(&self) -> usize {
        self.store.iter().map(|e| e.value().len()).sum()
    }

    pub fn iter_all_cookies(&self) -> impl Iterator<Item = CanonicalCookie> + '_ {
        self.store.iter().flat_map(|entry| entry.value().clone())
    }
}
