//! Ergonomic error context helpers.
//!
//! Provides extension traits for adding context to `Result` types,
//! converting foreign errors into context-rich `OverrideError` variants.

use crate::base::overrideerror::OverrideError;
use std::fmt::Display;

/// Extension trait for adding host context to foreign errors.
pub trait HostResultExt<T> {
    /// Attribute the error to a storage key.
    ///
    /// # Example
    /// ```ignore
    /// use scriptswap::base::context::HostResultExt;
    ///
    /// let text = std::fs::read_to_string(&path).storage_context("overrideProfiles")?;
    /// // Error: "Storage access failed for \"overrideProfiles\": No such file or directory"
    /// ```
    fn storage_context(self, key: &str) -> Result<T, OverrideError>;

    /// Attribute the error to malformed data stored under a key.
    fn format_context(self, key: &str) -> Result<T, OverrideError>;
}

impl<T, E: Display> HostResultExt<T> for Result<T, E> {
    fn storage_context(self, key: &str) -> Result<T, OverrideError> {
        self.map_err(|e| OverrideError::storage(key, e.to_string()))
    }

    fn format_context(self, key: &str) -> Result<T, OverrideError> {
        self.map_err(|e| OverrideError::StorageFormat {
            key: key.to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Error, ErrorKind};

    #[test]
    fn test_storage_context() {
        let result: Result<(), io::Error> = Err(Error::new(ErrorKind::NotFound, "missing"));
        let err = result.storage_context("overrideProfiles").unwrap_err();

        match err {
            OverrideError::Storage { key, message } => {
                assert_eq!(key, "overrideProfiles");
                assert_eq!(message, "missing");
            }
            _ => panic!("Expected Storage"),
        }
        assert!(OverrideError::storage("k", "m").is_host_failure());
    }

    #[test]
    fn test_format_context() {
        let result: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err = result.format_context("overrideProfiles").unwrap_err();

        assert!(matches!(
            err,
            OverrideError::StorageFormat { ref key, .. } if key == "overrideProfiles"
        ));
    }
}
