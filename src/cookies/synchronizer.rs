//! Keeps the active tab's cookie jar in step with a profile.
//!
//! Every operation resolves the active tab once. Without an active tab, or
//! with a tab that has no URL, the operation does nothing and succeeds.
//! Per-cookie calls are issued together and joined; the completion of an
//! operation is gated on every call captured at the start having answered.

use crate::base::overrideerror::OverrideError;
use crate::cookies::encoding::{self, DecodedOverride};
use crate::host::{BrowserHost, CookieQuery, SetCookie, Tab, TabId};
use crate::profile::Profile;
use futures::future::join_all;
use std::sync::Arc;
use url::Url;

/// One cookie call the host rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieFailure {
    pub name: String,
    pub error: OverrideError,
}

/// Outcome of one synchronizer operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// The tab acted on; `None` when there was nothing to act on.
    pub tab: Option<TabId>,
    /// Number of cookie calls issued.
    pub attempted: usize,
    pub failures: Vec<CookieFailure>,
}

impl SyncReport {
    fn skipped() -> Self {
        Self::default()
    }

    pub fn succeeded(&self) -> usize {
        self.attempted - self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Resolved target of one operation.
struct Target {
    tab: TabId,
    url: Url,
    host: String,
}

pub struct CookieSynchronizer<H> {
    host: Arc<H>,
}

impl<H> Clone for CookieSynchronizer<H> {
    fn clone(&self) -> Self {
        Self {
            host: Arc::clone(&self.host),
        }
    }
}

impl<H: BrowserHost> CookieSynchronizer<H> {
    pub fn new(host: Arc<H>) -> Self {
        Self { host }
    }

    async fn target(&self) -> Result<Option<Target>, OverrideError> {
        let tab: Option<Tab> = self.host.active_tab().await?;
        let Some(tab) = tab else {
            tracing::debug!("no active tab, cookie sync skipped");
            return Ok(None);
        };
        let host = match tab.hostname() {
            Some(host) => host.to_string(),
            None => {
                tracing::debug!(tab = %tab.id, "active tab has no hostname, cookie sync skipped");
                return Ok(None);
            }
        };
        let Some(url) = tab.url else {
            return Ok(None);
        };

        Ok(Some(Target {
            tab: tab.id,
            url,
            host,
        }))
    }

    /// Remove every override-shaped cookie of the tab's hostname.
    ///
    /// The set of cookies is captured once; cookies appearing while the
    /// removals are in flight are not accounted for.
    pub async fn clear_all(&self) -> Result<SyncReport, OverrideError> {
        let Some(target) = self.target().await? else {
            return Ok(SyncReport::skipped());
        };

        let snapshot: Vec<_> = self
            .host
            .get_all(CookieQuery::domain(&target.host))
            .await?
            .into_iter()
            .filter(|c| encoding::is_candidate(&c.name))
            .collect();

        let removals = snapshot.iter().map(|cookie| {
            let url = cookie
                .removal_url()
                .unwrap_or_else(|| target.url.clone());
            let name = cookie.name.clone();
            async move {
                let result = self.host.remove(url, name.clone()).await;
                (name, result)
            }
        });
        let report = collect_report(target.tab, join_all(removals).await);

        tracing::debug!(
            tab = %target.tab,
            host = %target.host,
            removed = report.succeeded(),
            failed = report.failures.len(),
            "cleared override cookies"
        );
        Ok(report)
    }

    /// Set one host-only cookie per entry of `profile` for the tab's hostname.
    pub async fn write(&self, profile: &Profile) -> Result<SyncReport, OverrideError> {
        let Some(target) = self.target().await? else {
            return Ok(SyncReport::skipped());
        };

        let writes = profile.overrides.iter().map(|entry| {
            let encoded = encoding::encode(entry);
            let cookie = SetCookie {
                url: target.url.clone(),
                name: encoded.name.clone(),
                value: encoded.value,
                domain: None,
                path: "/".to_string(),
            };
            async move {
                let result = self.host.set(cookie).await;
                (encoded.name, result)
            }
        });
        let report = collect_report(target.tab, join_all(writes).await);

        tracing::debug!(
            tab = %target.tab,
            profile = %profile.name,
            written = report.succeeded(),
            failed = report.failures.len(),
            "wrote override cookies"
        );
        Ok(report)
    }

    /// Remove only the cookies named by `keys`.
    pub async fn remove_keys(&self, keys: &[String]) -> Result<SyncReport, OverrideError> {
        let Some(target) = self.target().await? else {
            return Ok(SyncReport::skipped());
        };

        let per_key = keys.iter().map(|key| {
            let query = CookieQuery::domain(&target.host).name(key);
            let fallback = target.url.clone();
            async move {
                let matches = match self.host.get_all(query).await {
                    Ok(matches) => matches,
                    Err(e) => return vec![(key.clone(), Err(e))],
                };
                let removals = matches.into_iter().map(|cookie| {
                    let url = cookie.removal_url().unwrap_or_else(|| fallback.clone());
                    async move {
                        let result = self.host.remove(url, cookie.name.clone()).await;
                        (cookie.name, result)
                    }
                });
                join_all(removals).await
            }
        });
        let results = join_all(per_key).await.into_iter().flatten().collect();
        let report = collect_report(target.tab, results);

        tracing::debug!(
            tab = %target.tab,
            keys = keys.len(),
            removed = report.succeeded(),
            failed = report.failures.len(),
            "removed profile cookies"
        );
        Ok(report)
    }

    /// Decoded override cookies currently visible for the tab's hostname.
    pub async fn snapshot(&self) -> Result<Vec<DecodedOverride>, OverrideError> {
        let Some(target) = self.target().await? else {
            return Ok(Vec::new());
        };

        let mut live: Vec<DecodedOverride> = self
            .host
            .get_all(CookieQuery::domain(&target.host))
            .await?
            .into_iter()
            .filter(|c| encoding::is_candidate(&c.name))
            .map(|c| encoding::decode(&c.name, &c.value))
            .collect();
        live.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(live)
    }
}

fn collect_report(tab: TabId, results: Vec<(String, Result<(), OverrideError>)>) -> SyncReport {
    let attempted = results.len();
    let failures = results
        .into_iter()
        .filter_map(|(name, result)| {
            result.err().map(|error| {
                tracing::warn!(cookie = %name, error = %error, "cookie call failed");
                CookieFailure { name, error }
            })
        })
        .collect();

    SyncReport {
        tab: Some(tab),
        attempted,
        failures,
    }
}
