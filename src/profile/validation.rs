//! Save-time checks on profiles.
//!
//! Errors block the save. Warnings are reported alongside a successful save
//! and never drop data, except that a duplicated override key keeps only its
//! last entry.

use crate::base::overrideerror::ValidationError;
use crate::cookies::encoding::{self, KEY_SEPARATOR};
use crate::profile::{OverrideEntry, Profile};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    /// An earlier entry with the same key was replaced by a later one.
    DuplicateKey { key: String },
    /// The URL will be rejected by the injector.
    UnsupportedUrl { key: String, url: String },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::DuplicateKey { key } => {
                write!(f, "{} is defined more than once; the last definition is kept", key)
            }
            ValidationWarning::UnsupportedUrl { key, url } => {
                write!(f, "{} points at {:?}, which is not an absolute http(s) URL", key, url)
            }
        }
    }
}

/// Check names and fields. Uniqueness of the profile name is checked by the
/// collection.
pub fn validate_profile(profile: &Profile) -> Result<Vec<ValidationWarning>, ValidationError> {
    if profile.name.trim().is_empty() {
        return Err(ValidationError::EmptyProfileName);
    }

    let mut warnings = Vec::new();
    for (index, entry) in profile.overrides.iter().enumerate() {
        check_identifier(index, "appName", &entry.app_name, false)?;
        check_identifier(index, "featureKey", &entry.feature_key, true)?;
        if entry.url.trim().is_empty() {
            return Err(ValidationError::EmptyField { index, field: "url" });
        }

        let decoded = encoding::DecodedOverride {
            key: entry.key(),
            url: entry.url.clone(),
        };
        if !decoded.is_valid() {
            warnings.push(ValidationWarning::UnsupportedUrl {
                key: decoded.key,
                url: decoded.url,
            });
        }
    }

    Ok(warnings)
}

/// Collapse duplicated keys: the last entry wins and keeps its position.
pub fn normalize(profile: Profile) -> (Profile, Vec<ValidationWarning>) {
    let Profile { name, overrides } = profile;
    let mut kept: Vec<OverrideEntry> = Vec::with_capacity(overrides.len());
    let mut warnings = Vec::new();

    for entry in overrides {
        let key = entry.key();
        if let Some(pos) = kept.iter().position(|e| e.key() == key) {
            kept.remove(pos);
            if !warnings
                .iter()
                .any(|w| matches!(w, ValidationWarning::DuplicateKey { key: k } if *k == key))
            {
                warnings.push(ValidationWarning::DuplicateKey { key });
            }
        }
        kept.push(entry);
    }

    (
        Profile {
            name,
            overrides: kept,
        },
        warnings,
    )
}

fn check_identifier(
    index: usize,
    field: &'static str,
    value: &str,
    allow_separator: bool,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField { index, field });
    }

    let valid = value.chars().all(|c| {
        !c.is_whitespace()
            && !c.is_control()
            && !matches!(c, ';' | ',' | '=' | '"' | '\\')
            && (allow_separator || c != KEY_SEPARATOR)
    });
    if !valid {
        return Err(ValidationError::InvalidIdentifier {
            index,
            field,
            value: value.to_string(),
        });
    }

    Ok(())
}
