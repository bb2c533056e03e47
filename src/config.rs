//! Engine configuration.

use crate::base::overrideerror::OverrideError;
use crate::injector::retry::RetryConfig;
use crate::injector::{InjectorConfig, DISABLED_FLAG_KEY};
use crate::overlay::OverlayConfig;
use serde::Deserialize;
use std::time::Duration;

/// Fixed storage key of the profile collection.
pub const DEFAULT_STORAGE_KEY: &str = "overrideProfiles";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Storage key holding the whole profile collection
    pub storage_key: String,
    /// Retry policy and page-session flag used by the injector
    pub injector: InjectorConfig,
    /// Pause between disabling and re-applying an edited active profile
    pub reapply_delay: Duration,
    /// Lifetime of transient notices
    pub notice_ttl: Duration,
    /// Initial state of the comparison overlay
    pub overlay: OverlayConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            injector: InjectorConfig::default(),
            reapply_delay: Duration::from_millis(300),
            notice_ttl: Duration::from_secs(5),
            overlay: OverlayConfig::default(),
        }
    }
}

/// JSON form: every field optional, milliseconds for durations.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawEngineConfig {
    storage_key: Option<String>,
    disabled_flag_key: Option<String>,
    max_attempts: Option<usize>,
    retry_base_delay_ms: Option<u64>,
    reapply_delay_ms: Option<u64>,
    notice_ttl_ms: Option<u64>,
    overlay_opacity: Option<f32>,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by the fields present in `json`.
    pub fn from_json_str(json: &str) -> Result<Self, OverrideError> {
        let raw: RawEngineConfig =
            serde_json::from_str(json).map_err(|e| OverrideError::Config(e.to_string()))?;
        let mut config = Self::default();

        if let Some(key) = raw.storage_key {
            config = config.storage_key(key);
        }
        if let Some(flag) = raw.disabled_flag_key {
            config.injector.disabled_flag_key = flag;
        }
        if let Some(attempts) = raw.max_attempts {
            config.injector.retry = config.injector.retry.max_attempts(attempts);
        }
        if let Some(ms) = raw.retry_base_delay_ms {
            config.injector.retry = config.injector.retry.base_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = raw.reapply_delay_ms {
            config.reapply_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = raw.notice_ttl_ms {
            config.notice_ttl = Duration::from_millis(ms);
        }
        if let Some(opacity) = raw.overlay_opacity {
            config.overlay.opacity = opacity;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), OverrideError> {
        if self.storage_key.is_empty() {
            return Err(OverrideError::Config("storage key must not be empty".into()));
        }
        if self.injector.disabled_flag_key.is_empty() {
            return Err(OverrideError::Config(
                "disabled flag key must not be empty".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.overlay.opacity) {
            return Err(OverrideError::Config(format!(
                "overlay opacity {} is outside 0..=1",
                self.overlay.opacity
            )));
        }
        Ok(())
    }

    /// Set the storage key.
    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Set the injector retry policy.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.injector.retry = retry;
        self
    }

    /// Set the re-apply delay after editing an active profile.
    pub fn reapply_delay(mut self, delay: Duration) -> Self {
        self.reapply_delay = delay;
        self
    }

    /// Set notice lifetime.
    pub fn notice_ttl(mut self, ttl: Duration) -> Self {
        self.notice_ttl = ttl;
        self
    }

    pub fn overlay(mut self, overlay: OverlayConfig) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn disabled_flag_key(&self) -> &str {
        &self.injector.disabled_flag_key
    }
}
