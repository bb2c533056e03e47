use time::OffsetDateTime;
use url::Url;

/// Represents a cookie held by a jar.
/// Modeled after Chromium's `net::CanonicalCookie`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub creation_time: OffsetDateTime,
    pub expiration_time: Option<OffsetDateTime>,
    pub secure: bool,
    pub http_only: bool,
    pub host_only: bool,
    pub same_site: SameSite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Unspecified,
    NoRestriction,
    Lax,
    Strict,
}

impl CanonicalCookie {
    /// A session cookie with root path, visible to `domain` and its subdomains.
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into().trim_start_matches('.').to_lowercase(),
            path: "/".to_string(),
            creation_time: OffsetDateTime::now_utc(),
            expiration_time: None,
            secure: false,
            http_only: false,
            host_only: false,
            same_site: SameSite::Lax,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn host_only(mut self) -> Self {
        self.host_only = true;
        self
    }

    pub fn is_expired(&self, current_time: OffsetDateTime) -> bool {
        self.expiration_time
            .is_some_and(|expiry| expiry < current_time)
    }

    /// The URL a removal request for this cookie has to target.
    pub fn removal_url(&self) -> Option<Url> {
        let scheme = if self.secure { "https" } else { "http" };
        Url::parse(&format!("{}://{}{}", scheme, self.domain, self.path)).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_domain() {
        let cookie = CanonicalCookie::new("a/b", "v", ".Shop.Example.com");
        assert_eq!(cookie.domain, "shop.example.com");
        assert_eq!(cookie.path, "/");
        assert!(!cookie.host_only);
        assert!(!cookie.is_expired(OffsetDateTime::now_utc()));
    }

    #[test]
    fn test_expiry() {
        let mut cookie = CanonicalCookie::new("a", "v", "example.com");
        let now = OffsetDateTime::now_utc();
        cookie.expiration_time = Some(now - time::Duration::seconds(1));
        assert!(cookie.is_expired(now));
    }

    #[test]
    fn test_removal_url() {
        let cookie = CanonicalCookie::new("a", "v", "example.com").with_path("/app");
        assert_eq!(
            cookie.removal_url().unwrap().as_str(),
            "http://example.com/app"
        );
    }
}
