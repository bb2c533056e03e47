//! Page-side override injection.
//!
//! The injector runs inside the target page once per page load. It reads
//! the page's cookies, keeps the ones shaped like valid overrides, and loads
//! each replacement script through its own loader element with bounded
//! retries.
//!
//! # Algorithm
//!
//! 1. If the page-session flag `overridesDisabled` is set, consume it and stop.
//! 2. Parse `document.cookie`, tolerating malformed segments.
//! 3. Skip cookies that are not candidate overrides; warn on invalid URLs.
//! 4. For each valid override, derive the element id from the key. An
//!    existing element with that id means the script is already loading or
//!    loaded, so nothing is done. The check is repeated after every wait,
//!    since a concurrent run on the same page may have appended it.
//! 5. Append a `<script>` (anonymous CORS, no referrer) to `<head>`, waiting
//!    for the document if the head does not exist yet.
//! 6. On load error, remove the element and retry after `base × attempt`,
//!    up to [`RetryConfig::max_attempts`] loads in total. Abort ends the
//!    sequence without retrying.
//!
//! Every override's sequence is independent of the others.

pub mod cookieparse;
pub mod program;
pub mod retry;

use crate::cookies::encoding;
use crate::overlay::OverlaySpec;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use futures::future::{join_all, BoxFuture};
use retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

/// Page-session storage key suppressing the next injector run.
pub const DISABLED_FLAG_KEY: &str = "overridesDisabled";
pub const DISABLED_FLAG_VALUE: &str = "true";

/// Prefix of loader element ids.
pub const ELEMENT_ID_PREFIX: &str = "override-";

/// Outcome reported by a script element's handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadEvent {
    Load,
    Error(String),
    Abort,
}

/// A `<script>` loader element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptElement {
    pub id: String,
    pub src: Url,
    pub cross_origin: &'static str,
    pub referrer_policy: &'static str,
}

impl ScriptElement {
    pub fn new(id: impl Into<String>, src: Url) -> Self {
        Self {
            id: id.into(),
            src,
            cross_origin: "anonymous",
            referrer_policy: "no-referrer",
        }
    }
}

/// The DOM and storage surface of one page instance.
///
/// Implementations are single-page: a reload produces a new context sharing
/// only page-session storage with the old one.
pub trait PageContext: Send + Sync {
    /// URL of the document.
    fn location(&self) -> Url;

    /// The `document.cookie` string.
    fn cookie_string(&self) -> String;

    fn session_item(&self, key: &str) -> Option<String>;

    fn set_session_item(&self, key: &str, value: &str);

    fn remove_session_item(&self, key: &str);

    fn has_element(&self, id: &str) -> bool;

    /// Whether `<head>` exists yet.
    fn head_ready(&self) -> bool;

    /// Resolves once the document has been parsed.
    fn document_ready(&self) -> BoxFuture<'_, ()>;

    /// Append a script to `<head>`; resolves with the first handler fired.
    fn append_script(&self, script: ScriptElement) -> BoxFuture<'_, LoadEvent>;

    /// Returns false when no element had that id.
    fn remove_element(&self, id: &str) -> bool;

    /// Build the comparison frame and panel. Returns false if one is already mounted.
    fn mount_overlay(&self, overlay: &OverlaySpec) -> bool;

    fn unmount_overlay(&self) -> bool;
}

/// Injector settings shared by every page load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectorConfig {
    pub retry: RetryConfig,
    pub disabled_flag_key: String,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            disabled_flag_key: DISABLED_FLAG_KEY.to_string(),
        }
    }
}

/// What happened to one override during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum KeyOutcome {
    Loaded { attempts: usize },
    AlreadyPresent,
    GaveUp { attempts: usize },
    Aborted { attempts: usize },
    Invalid { url: String },
}

/// Result of one injector run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionSummary {
    /// The run was stopped by the disabled flag.
    pub suppressed: bool,
    pub outcomes: Vec<(String, KeyOutcome)>,
}

impl InjectionSummary {
    pub fn outcome(&self, key: &str) -> Option<&KeyOutcome> {
        self.outcomes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, outcome)| outcome)
    }

    pub fn loaded(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, KeyOutcome::Loaded { .. }))
            .map(|(k, _)| k.as_str())
            .collect()
    }
}

/// Element id for an override key: prefix plus URL-safe base64 of the key.
pub fn element_id(key: &str) -> String {
    format!("{}{}", ELEMENT_ID_PREFIX, URL_SAFE_NO_PAD.encode(key))
}

/// Inverse of [`element_id`].
pub fn key_from_element_id(id: &str) -> Option<String> {
    let encoded = id.strip_prefix(ELEMENT_ID_PREFIX)?;
    let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}

pub struct Injector<P: ?Sized> {
    page: Arc<P>,
    config: InjectorConfig,
}

impl<P: PageContext + ?Sized> Injector<P> {
    pub fn new(page: Arc<P>, config: InjectorConfig) -> Self {
        Self { page, config }
    }

    /// One full pass over the page's cookies.
    pub async fn run(&self) -> InjectionSummary {
        let flag = &self.config.disabled_flag_key;
        if self.page.session_item(flag).as_deref() == Some(DISABLED_FLAG_VALUE) {
            self.page.remove_session_item(flag);
            tracing::debug!(page = %self.page.location(), "overrides disabled for this load");
            return InjectionSummary {
                suppressed: true,
                outcomes: Vec::new(),
            };
        }

        let mut invalid = Vec::new();
        let mut pending = Vec::new();
        for (name, value) in cookieparse::parse_cookie_string(&self.page.cookie_string()) {
            if !encoding::is_candidate(&name) {
                continue;
            }
            let decoded = encoding::DecodedOverride { key: name, url: value };
            match decoded.validate() {
                Ok(url) => pending.push((decoded.key, url)),
                Err(e) => {
                    tracing::warn!(key = %decoded.key, error = %e, "skipping invalid override");
                    invalid.push((decoded.key, KeyOutcome::Invalid { url: decoded.url }));
                }
            }
        }

        let injections = pending.iter().map(|(key, url)| async move {
            (key.clone(), self.inject(key, url).await)
        });
        let mut outcomes = join_all(injections).await;
        outcomes.extend(invalid);

        InjectionSummary {
            suppressed: false,
            outcomes,
        }
    }

    /// Load one override, retrying failed loads.
    pub async fn inject(&self, key: &str, url: &Url) -> KeyOutcome {
        let id = element_id(key);
        if self.already_injected(key, &id) {
            return KeyOutcome::AlreadyPresent;
        }

        if !self.page.head_ready() {
            self.page.document_ready().await;
        }

        let retry = &self.config.retry;
        let mut attempt = 0;
        loop {
            // Another run may have appended the element while this one waited
            if self.already_injected(key, &id) {
                return KeyOutcome::AlreadyPresent;
            }

            attempt += 1;
            let event = self
                .page
                .append_script(ScriptElement::new(id.clone(), url.clone()))
                .await;

            match event {
                LoadEvent::Load => {
                    tracing::debug!(key = %key, url = %url, attempt, "override loaded");
                    return KeyOutcome::Loaded { attempts: attempt };
                }
                LoadEvent::Abort => {
                    tracing::debug!(key = %key, attempt, "override load aborted");
                    return KeyOutcome::Aborted { attempts: attempt };
                }
                LoadEvent::Error(ref reason) if retry::should_retry(attempt, &event, retry) => {
                    let delay = retry::calculate_backoff(attempt, retry);
                    tracing::warn!(
                        key = %key,
                        attempt,
                        reason = %reason,
                        ?delay,
                        "override load failed, retrying"
                    );
                    self.page.remove_element(&id);
                    tokio::time::sleep(delay).await;
                }
                LoadEvent::Error(reason) => {
                    tracing::error!(
                        key = %key,
                        url = %url,
                        attempts = attempt,
                        reason = %reason,
                        "giving up on override"
                    );
                    return KeyOutcome::GaveUp { attempts: attempt };
                }
            }
        }
    }

    fn already_injected(&self, key: &str, id: &str) -> bool {
        let present = self.page.has_element(id);
        if present {
            tracing::debug!(key = %key, "override already injected");
        }
        present
    }
}
