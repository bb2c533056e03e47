use scriptswap::base::ValidationError;
use scriptswap::host::storage::JsonFileStorage;
use scriptswap::host::ProfileStorage;
use scriptswap::profile::validation::validate_profile;
use scriptswap::profile::{Profile, ProfileCollection, ValidationWarning};

#[test]
fn test_feature_key_may_contain_separator() {
    let profile = Profile::new("demo").with_override(
        "checkout",
        "bootstrap/js",
        "https://cdn.example.com/a.js",
    );
    assert_eq!(validate_profile(&profile), Ok(vec![]));
    assert_eq!(profile.keys(), vec!["checkout/bootstrap/js"]);
}

#[test]
fn test_identifier_rules() {
    let invalid = |app: &str, feature: &str| {
        let profile = Profile::new("p").with_override(app, feature, "https://cdn.example.com/a.js");
        validate_profile(&profile).unwrap_err()
    };

    assert!(matches!(
        invalid("check/out", "js"),
        ValidationError::InvalidIdentifier { field: "appName", .. }
    ));
    assert!(matches!(
        invalid("checkout", "boot strap"),
        ValidationError::InvalidIdentifier { field: "featureKey", .. }
    ));
    assert!(matches!(
        invalid("checkout", "a;b"),
        ValidationError::InvalidIdentifier { .. }
    ));
    assert_eq!(
        invalid("", "js"),
        ValidationError::EmptyField {
            index: 0,
            field: "appName"
        }
    );
}

#[test]
fn test_missing_url_blocks_but_bad_scheme_warns() {
    let missing = Profile::new("p").with_override("a", "b", " ");
    assert_eq!(
        validate_profile(&missing),
        Err(ValidationError::EmptyField {
            index: 0,
            field: "url"
        })
    );

    let ftp = Profile::new("p").with_override("a", "b", "ftp://files.example.com/a.js");
    assert_eq!(
        validate_profile(&ftp),
        Ok(vec![ValidationWarning::UnsupportedUrl {
            key: "a/b".into(),
            url: "ftp://files.example.com/a.js".into(),
        }])
    );
}

#[test]
fn test_stored_shape() {
    let mut profiles = ProfileCollection::new();
    profiles
        .insert(Profile::new("demo").with_override(
            "checkout",
            "bootstrap/js",
            "https://cdn.example.com/a.js",
        ))
        .unwrap();

    let value = serde_json::to_value(&profiles).unwrap();
    assert_eq!(
        value,
        serde_json::json!([{
            "name": "demo",
            "overrides": [{
                "appName": "checkout",
                "featureKey": "bootstrap/js",
                "url": "https://cdn.example.com/a.js"
            }]
        }])
    );
}

#[tokio::test]
async fn test_file_storage_keeps_other_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.json");
    tokio::fs::write(&path, r#"{"theme": "dark"}"#).await.unwrap();

    let storage = JsonFileStorage::new(&path);
    let mut profiles = ProfileCollection::new();
    profiles.insert(Profile::new("demo")).unwrap();
    profiles.store(&storage, "overrideProfiles").await.unwrap();

    let text = tokio::fs::read_to_string(&path).await.unwrap();
    let stored: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(stored["theme"], "dark");
    assert_eq!(stored["overrideProfiles"][0]["name"], "demo");

    let loaded = ProfileCollection::load(&storage, "overrideProfiles").await.unwrap();
    assert_eq!(loaded, profiles);
    assert!(storage.get("missing".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_malformed_stored_collection_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.json");
    tokio::fs::write(&path, r#"{"overrideProfiles": {"not": "a list"}}"#)
        .await
        .unwrap();

    let storage = JsonFileStorage::new(&path);
    let err = ProfileCollection::load(&storage, "overrideProfiles")
        .await
        .unwrap_err();
    assert!(err.is_host_failure());
}
