//! Override profiles and their stored collection.
//!
//! A profile is a named, ordered list of override entries persisted as a
//! unit. Order is kept for display only; application is unordered.

pub mod collection;
pub mod validation;

pub use collection::{ImportReport, ProfileCollection};
pub use validation::ValidationWarning;

use crate::cookies::encoding;
use serde::{Deserialize, Serialize};

/// One (application, feature, replacement URL) triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideEntry {
    pub app_name: String,
    pub feature_key: String,
    pub url: String,
}

impl OverrideEntry {
    pub fn new(
        app_name: impl Into<String>,
        feature_key: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            feature_key: feature_key.into(),
            url: url.into(),
        }
    }

    /// The override key, `appName/featureKey`.
    pub fn key(&self) -> String {
        encoding::override_key(&self.app_name, &self.feature_key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub overrides: Vec<OverrideEntry>,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            overrides: Vec::new(),
        }
    }

    pub fn with_override(
        mut self,
        app_name: impl Into<String>,
        feature_key: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        self.overrides
            .push(OverrideEntry::new(app_name, feature_key, url));
        self
    }

    pub fn keys(&self) -> Vec<String> {
        self.overrides.iter().map(OverrideEntry::key).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_field_names() {
        let profile = Profile::new("demo").with_override(
            "checkout",
            "bootstrap/js",
            "https://cdn.example.com/a.js",
        );
        let json = serde_json::to_value(&profile).unwrap();

        assert_eq!(json["name"], "demo");
        assert_eq!(json["overrides"][0]["appName"], "checkout");
        assert_eq!(json["overrides"][0]["featureKey"], "bootstrap/js");
        assert_eq!(json["overrides"][0]["url"], "https://cdn.example.com/a.js");
    }

    #[test]
    fn test_missing_overrides_defaults_empty() {
        let profile: Profile = serde_json::from_str(r#"{"name":"bare"}"#).unwrap();
        assert!(profile.overrides.is_empty());
    }

    #[test]
    fn test_keys() {
        let profile = Profile::new("p")
            .with_override("checkout", "bootstrap/js", "https://a")
            .with_override("search", "widget", "https://b");
        assert_eq!(profile.keys(), vec!["checkout/bootstrap/js", "search/widget"]);
    }
}
