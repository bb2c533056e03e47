use crate::base::context::HostResultExt;
use crate::base::overrideerror::{OverrideError, ValidationError};
use crate::host::ProfileStorage;
use crate::profile::validation::{self, ValidationWarning};
use crate::profile::Profile;
use serde::{Deserialize, Serialize};

/// The stored, ordered sequence of profiles.
///
/// Mutations validate first and leave the collection untouched on error, so
/// a caller can mutate a clone, persist it, and only then commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileCollection {
    profiles: Vec<Profile>,
}

/// Result of [`ProfileCollection::import_json`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: Vec<String>,
    pub skipped: Vec<(String, ValidationError)>,
    pub warnings: Vec<ValidationWarning>,
}

impl ProfileCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the collection stored under `key`; absent or null reads as empty.
    pub async fn load<S: ProfileStorage + ?Sized>(
        storage: &S,
        key: &str,
    ) -> Result<Self, OverrideError> {
        match storage.get(key.to_string()).await? {
            None | Some(serde_json::Value::Null) => Ok(Self::new()),
            Some(value) => serde_json::from_value(value).format_context(key),
        }
    }

    /// Write the whole collection under `key`.
    pub async fn store<S: ProfileStorage + ?Sized>(
        &self,
        storage: &S,
        key: &str,
    ) -> Result<(), OverrideError> {
        let value = serde_json::to_value(self).format_context(key)?;
        storage.set(key.to_string(), value).await
    }

    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.profiles.iter().map(|p| p.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Append a new profile. Names are unique, compared case-sensitively.
    pub fn insert(&mut self, profile: Profile) -> Result<Vec<ValidationWarning>, ValidationError> {
        let mut warnings = validation::validate_profile(&profile)?;
        if self.contains(&profile.name) {
            return Err(ValidationError::DuplicateProfileName(profile.name));
        }

        let (profile, duplicates) = validation::normalize(profile);
        warnings.extend(duplicates);
        self.profiles.push(profile);
        Ok(warnings)
    }

    /// Replace the profile named `original`, keeping its position. The
    /// replacement may carry a new name as long as no other profile uses it.
    pub fn replace(
        &mut self,
        original: &str,
        profile: Profile,
    ) -> Result<Vec<ValidationWarning>, ValidationError> {
        let mut warnings = validation::validate_profile(&profile)?;
        let index = self
            .profiles
            .iter()
            .position(|p| p.name == original)
            .ok_or_else(|| ValidationError::UnknownProfile(original.to_string()))?;
        if profile.name != original && self.contains(&profile.name) {
            return Err(ValidationError::DuplicateProfileName(profile.name));
        }

        let (profile, duplicates) = validation::normalize(profile);
        warnings.extend(duplicates);
        self.profiles[index] = profile;
        Ok(warnings)
    }

    pub fn remove(&mut self, name: &str) -> Option<Profile> {
        let index = self.profiles.iter().position(|p| p.name == name)?;
        Some(self.profiles.remove(index))
    }

    pub fn export_json(&self) -> Result<String, OverrideError> {
        serde_json::to_string_pretty(self).map_err(|e| OverrideError::StorageFormat {
            key: "export".to_string(),
            message: e.to_string(),
        })
    }

    /// Merge profiles from an exported document. Profiles that fail
    /// validation or collide with an existing name are skipped.
    pub fn import_json(&mut self, json: &str) -> Result<ImportReport, OverrideError> {
        let incoming: Vec<Profile> = serde_json::from_str(json).format_context("import")?;
        let mut report = ImportReport::default();

        for profile in incoming {
            let name = profile.name.clone();
            match self.insert(profile) {
                Ok(warnings) => {
                    report.imported.push(name);
                    report.warnings.extend(warnings);
                }
                Err(e) => {
                    tracing::warn!(profile = %name, error = %e, "skipping imported profile");
                    report.skipped.push((name, e));
                }
            }
        }

        Ok(report)
    }
}
