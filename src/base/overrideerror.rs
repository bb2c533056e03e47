use thiserror::Error;

/// Reasons a profile cannot be saved.
///
/// These block the save synchronously; nothing is written when one is returned.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ValidationError {
    #[error("Profile name must not be empty")]
    EmptyProfileName,
    #[error("A profile named {0:?} already exists")]
    DuplicateProfileName(String),
    #[error("Override #{index}: {field} must not be empty")]
    EmptyField { index: usize, field: &'static str },
    #[error("Override #{index}: {field} {value:?} is not a valid identifier")]
    InvalidIdentifier {
        index: usize,
        field: &'static str,
        value: String,
    },
    #[error("No profile named {0:?}")]
    UnknownProfile(String),
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum OverrideError {
    // Host-API failures
    #[error("Cookie {operation} failed for {name:?}: {message}")]
    CookieStore {
        operation: &'static str,
        name: String,
        message: String,
    },
    #[error("Tab query failed: {0}")]
    TabQuery(String),
    #[error("Script execution failed in tab {tab}: {message}")]
    Scripting { tab: u32, message: String },
    #[error("Stylesheet injection failed in tab {tab}: {message}")]
    StylesheetInjection { tab: u32, message: String },
    #[error("Reload of tab {tab} failed: {message}")]
    Reload { tab: u32, message: String },
    #[error("Storage access failed for {key:?}: {message}")]
    Storage { key: String, message: String },
    #[error("Stored data under {key:?} is malformed: {message}")]
    StorageFormat { key: String, message: String },

    // Input failures
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Override {key:?} has an unusable URL {url:?}")]
    InvalidOverrideUrl { key: String, url: String },
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl OverrideError {
    /// Failures reported by the storage, cookie or scripting host.
    ///
    /// These are surfaced to the user as a transient notice and abort the
    /// operation in progress; partial state may remain.
    pub fn is_host_failure(&self) -> bool {
        matches!(
            self,
            OverrideError::CookieStore { .. }
                | OverrideError::TabQuery(_)
                | OverrideError::Scripting { .. }
                | OverrideError::StylesheetInjection { .. }
                | OverrideError::Reload { .. }
                | OverrideError::Storage { .. }
                | OverrideError::StorageFormat { .. }
        )
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, OverrideError::Validation(_))
    }

    pub fn cookie_store(
        operation: &'static str,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        OverrideError::CookieStore {
            operation,
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn storage(key: impl Into<String>, message: impl Into<String>) -> Self {
        OverrideError::Storage {
            key: key.into(),
            message: message.into(),
        }
    }
}
