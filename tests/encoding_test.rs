use scriptswap::cookies::encoding::{self, DecodedOverride};
use scriptswap::profile::OverrideEntry;

#[test]
fn test_round_trip_preserves_key_and_url() {
    let entries = [
        OverrideEntry::new("checkout", "bootstrap/js", "https://cdn.example.com/a.js"),
        OverrideEntry::new("search", "widget", "http://localhost:8080/dev/widget.js?v=2&debug=1"),
        OverrideEntry::new("cart", "main", "https://cdn.example.com/ü/bundle.js#frag"),
    ];

    for entry in &entries {
        let cookie = encoding::encode(entry);
        let decoded = encoding::decode(&cookie.name, &cookie.value);
        assert_eq!(decoded.key, format!("{}/{}", entry.app_name, entry.feature_key));
        assert_eq!(decoded.url, entry.url);
    }
}

#[test]
fn test_value_is_cookie_safe() {
    let entry = OverrideEntry::new("a", "b", "https://x.example.com/p?q=1; evil=2, z");
    let value = encoding::encode(&entry).value;

    assert!(!value.contains(';'));
    assert!(!value.contains(','));
    assert!(!value.contains(' '));
    assert!(!value.contains('='));
}

#[test]
fn test_matches_encode_uri_component() {
    assert_eq!(
        encoding::encode_component("https://cdn.example.com/a.js"),
        "https%3A%2F%2Fcdn.example.com%2Fa.js"
    );
    assert_eq!(encoding::encode_component("-_.!~*'()"), "-_.!~*'()");
    assert_eq!(encoding::encode_component("a b"), "a%20b");
}

#[test]
fn test_decode_falls_back_to_raw_value() {
    let decoded = encoding::decode("a/b", "https%3A%2F%2Fx%E0%A4%A");
    assert_eq!(decoded.url, "https%3A%2F%2Fx%E0%A4%A");

    let decoded = encoding::decode("a/b", "%ZZ");
    assert_eq!(decoded.url, "%ZZ");
}

#[test]
fn test_candidate_rule() {
    assert!(encoding::is_candidate("checkout/bootstrap/js"));
    assert!(encoding::is_candidate("a/"));
    assert!(!encoding::is_candidate("/"));
    assert!(!encoding::is_candidate("session"));
    assert!(!encoding::is_candidate(""));
}

#[test]
fn test_validity_requires_http_scheme() {
    let valid = |url: &str| {
        DecodedOverride {
            key: "a/b".into(),
            url: url.into(),
        }
        .is_valid()
    };

    assert!(valid("https://cdn.example.com/a.js"));
    assert!(valid("http://localhost:3000/a.js"));
    assert!(!valid("ftp://cdn.example.com/a.js"));
    assert!(!valid("javascript:alert(1)"));
    assert!(!valid("/relative/a.js"));
    assert!(!valid("not a url"));
}

#[test]
fn test_split_key_at_first_separator() {
    let decoded = encoding::decode("checkout/bootstrap/js", "x");
    assert_eq!(decoded.split_key(), Some(("checkout", "bootstrap/js")));
}
