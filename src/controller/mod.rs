//! Profile lifecycle controller.
//!
//! Drives profiles through apply, disable and overlay against the active
//! tab, and owns the stored collection and the in-memory active set.
//!
//! # Operation lock
//!
//! At most one lifecycle operation runs at a time. A call arriving while
//! another is in flight returns [`Completion::Busy`] without touching the
//! tab, the storage or the active set. Host calls already issued are never
//! cancelled; the lock only gates new operations.
//!
//! # States
//!
//! ```text
//! apply:   Idle -> ClearingCookies -> WritingCookies -> ExecutingScript -> Reloading -> Idle
//! disable: Idle -> RemovingCookies -> ExecutingScript -> Reloading -> Idle
//! overlay: Idle -> ClearingCookies -> WritingCookies -> MountingOverlay -> Idle
//! edit:    Idle -> [disable] -> Persisting -> AwaitingReapply -> [apply] -> Idle
//! ```
//!
//! Every transition is published on a [`watch`] channel.
//!
//! Apply and overlay clear every override cookie of the tab first, so the
//! applied profile replaces the active set. An overlay that is already open
//! is unmounted before the new one mounts, and the fresh frame loads with
//! the new cookies.
//!
//! # Failures
//!
//! Host failures abort the operation, leave whatever partial state the
//! completed steps produced, and post a transient notice. Validation
//! failures are returned before anything is written.

pub mod notice;

use crate::base::loadstate::{LifecycleState, Operation};
use crate::base::overrideerror::{OverrideError, ValidationError};
use crate::config::EngineConfig;
use crate::cookies::encoding::DecodedOverride;
use crate::cookies::synchronizer::{CookieFailure, CookieSynchronizer, SyncReport};
use crate::host::{BrowserHost, ProfileStorage, TabId};
use crate::injector::program::{PageProgram, ProgramOutcome};
use crate::overlay::{OverlaySpec, OVERLAY_CSS};
use crate::profile::{ImportReport, Profile, ProfileCollection, ValidationWarning};
use notice::{Notice, NoticeBoard, NoticeLevel};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use url::Url;

/// Result of a guarded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion<T> {
    Done(T),
    /// Another operation was in flight; nothing was done.
    Busy,
}

impl<T> Completion<T> {
    pub fn is_busy(&self) -> bool {
        matches!(self, Completion::Busy)
    }

    pub fn done(self) -> Option<T> {
        match self {
            Completion::Done(value) => Some(value),
            Completion::Busy => None,
        }
    }
}

/// What a tab operation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabReport {
    /// Tab acted on, `None` when there was no usable active tab.
    pub tab: Option<TabId>,
    pub cleared: SyncReport,
    pub written: SyncReport,
    pub removed: SyncReport,
    /// Loader elements removed from the live page.
    pub elements_removed: usize,
    pub reloaded: bool,
    pub overlay_mounted: bool,
}

impl TabReport {
    pub fn cookie_failures(&self) -> impl Iterator<Item = &CookieFailure> {
        self.cleared
            .failures
            .iter()
            .chain(&self.written.failures)
            .chain(&self.removed.failures)
    }

    pub fn is_complete(&self) -> bool {
        self.cookie_failures().next().is_none()
    }
}

/// Result of [`LifecycleController::edit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditReport {
    pub warnings: Vec<ValidationWarning>,
    /// Present when the edited profile was active.
    pub disabled: Option<TabReport>,
    pub reapplied: Option<TabReport>,
}

/// Holds the operation lock; publishes `Idle` and releases on drop.
struct OperationGuard<'a> {
    busy: &'a AtomicBool,
    state: &'a watch::Sender<LifecycleState>,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.state.send_replace(LifecycleState::Idle);
        self.busy.store(false, Ordering::Release);
    }
}

pub struct LifecycleController<H, S> {
    host: Arc<H>,
    storage: Arc<S>,
    sync: CookieSynchronizer<H>,
    config: EngineConfig,
    profiles: tokio::sync::Mutex<ProfileCollection>,
    active: Mutex<BTreeSet<String>>,
    busy: AtomicBool,
    state: watch::Sender<LifecycleState>,
    notices: NoticeBoard,
}

impl<H, S> LifecycleController<H, S>
where
    H: BrowserHost,
    S: ProfileStorage,
{
    pub fn new(
        host: Arc<H>,
        storage: Arc<S>,
        profiles: ProfileCollection,
        config: EngineConfig,
    ) -> Self {
        let (state, _) = watch::channel(LifecycleState::Idle);
        Self {
            sync: CookieSynchronizer::new(Arc::clone(&host)),
            host,
            storage,
            notices: NoticeBoard::new(config.notice_ttl),
            config,
            profiles: tokio::sync::Mutex::new(profiles),
            active: Mutex::new(BTreeSet::new()),
            busy: AtomicBool::new(false),
            state,
        }
    }

    /// Read the stored collection once and build a controller over it.
    pub async fn load(
        host: Arc<H>,
        storage: Arc<S>,
        config: EngineConfig,
    ) -> Result<Self, OverrideError> {
        config.validate()?;
        let profiles = ProfileCollection::load(storage.as_ref(), &config.storage_key).await?;
        tracing::debug!(
            key = %config.storage_key,
            profiles = profiles.len(),
            "loaded stored profiles"
        );
        Ok(Self::new(host, storage, profiles, config))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Notices that have not yet expired.
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.visible()
    }

    pub async fn profiles(&self) -> ProfileCollection {
        self.profiles.lock().await.clone()
    }

    pub async fn profile(&self, name: &str) -> Option<Profile> {
        self.profiles.lock().await.get(name).cloned()
    }

    /// Names believed live in the current tab, sorted.
    pub fn active_profiles(&self) -> Vec<String> {
        self.active().iter().cloned().collect()
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.active().contains(name)
    }

    /// Clear all override cookies, write `profile`'s, and reload the tab so
    /// the injector runs against the new set.
    pub async fn apply(&self, profile: &Profile) -> Result<Completion<TabReport>, OverrideError> {
        let Some(_guard) = self.begin(Operation::Apply) else {
            return Ok(Completion::Busy);
        };
        self.apply_steps(profile, Operation::Apply)
            .await
            .map(Completion::Done)
            .map_err(|e| self.surface(Operation::Apply, e))
    }

    /// Remove `profile`'s cookies and loader elements, and reload with the
    /// injector suppressed.
    pub async fn disable(&self, profile: &Profile) -> Result<Completion<TabReport>, OverrideError> {
        let Some(_guard) = self.begin(Operation::Disable) else {
            return Ok(Completion::Busy);
        };
        self.disable_steps(profile, Operation::Disable)
            .await
            .map(Completion::Done)
            .map_err(|e| self.surface(Operation::Disable, e))
    }

    /// Write `profile`'s cookies and mount the comparison frame over the
    /// current page without reloading it.
    pub async fn apply_overlay(
        &self,
        profile: &Profile,
    ) -> Result<Completion<TabReport>, OverrideError> {
        let Some(_guard) = self.begin(Operation::Overlay) else {
            return Ok(Completion::Busy);
        };
        self.overlay_steps(profile)
            .await
            .map(Completion::Done)
            .map_err(|e| self.surface(Operation::Overlay, e))
    }

    /// Validate and persist a new profile.
    pub async fn save(
        &self,
        profile: Profile,
    ) -> Result<Completion<Vec<ValidationWarning>>, OverrideError> {
        let Some(_guard) = self.begin(Operation::Save) else {
            return Ok(Completion::Busy);
        };
        self.save_steps(profile)
            .await
            .map(Completion::Done)
            .map_err(|e| self.surface(Operation::Save, e))
    }

    /// Replace the profile named `original`.
    ///
    /// An active profile is disabled before the edit is persisted and the
    /// updated version is applied again after [`EngineConfig::reapply_delay`].
    pub async fn edit(
        &self,
        original: &str,
        updated: Profile,
    ) -> Result<Completion<EditReport>, OverrideError> {
        let Some(_guard) = self.begin(Operation::Edit) else {
            return Ok(Completion::Busy);
        };
        self.edit_steps(original, updated)
            .await
            .map(Completion::Done)
            .map_err(|e| self.surface(Operation::Edit, e))
    }

    /// Remove a profile from storage and from the active set.
    ///
    /// The tab is not touched: cookies and elements the profile left behind
    /// stay until the next clear or disable.
    pub async fn delete(&self, name: &str) -> Result<Completion<Profile>, OverrideError> {
        let Some(_guard) = self.begin(Operation::Delete) else {
            return Ok(Completion::Busy);
        };
        self.delete_steps(name)
            .await
            .map(Completion::Done)
            .map_err(|e| self.surface(Operation::Delete, e))
    }

    /// Merge profiles from an exported document and persist the result.
    pub async fn import(&self, json: &str) -> Result<Completion<ImportReport>, OverrideError> {
        let Some(_guard) = self.begin(Operation::Save) else {
            return Ok(Completion::Busy);
        };
        let result = async {
            let mut next = self.profiles.lock().await.clone();
            let report = next.import_json(json)?;
            if !report.imported.is_empty() {
                self.persist(next, Operation::Save).await?;
            }
            self.post_warnings(&report.warnings);
            Ok::<_, OverrideError>(report)
        };
        result
            .await
            .map(Completion::Done)
            .map_err(|e| self.surface(Operation::Save, e))
    }

    pub async fn export(&self) -> Result<String, OverrideError> {
        self.profiles.lock().await.export_json()
    }

    /// Override cookies currently live in the active tab.
    pub async fn inspect_tab(&self) -> Result<Vec<DecodedOverride>, OverrideError> {
        self.sync
            .snapshot()
            .await
            .map_err(|e| self.surface(Operation::Refresh, e))
    }

    /// Recompute the active set from the tab's cookies. A profile is active
    /// when every one of its keys is present with its URL.
    pub async fn refresh_active(&self) -> Result<Completion<Vec<String>>, OverrideError> {
        let Some(_guard) = self.begin(Operation::Refresh) else {
            return Ok(Completion::Busy);
        };
        self.transition(LifecycleState::ReadingCookies(Operation::Refresh));
        let live = self
            .sync
            .snapshot()
            .await
            .map_err(|e| self.surface(Operation::Refresh, e))?;
        let live: HashMap<&str, &str> = live
            .iter()
            .map(|o| (o.key.as_str(), o.url.as_str()))
            .collect();

        let active: BTreeSet<String> = self
            .profiles
            .lock()
            .await
            .iter()
            .filter(|p| {
                !p.overrides.is_empty()
                    && p.overrides
                        .iter()
                        .all(|e| live.get(e.key().as_str()) == Some(&e.url.as_str()))
            })
            .map(|p| p.name.clone())
            .collect();

        tracing::debug!(active = active.len(), live = live.len(), "refreshed active profiles");
        let names = active.iter().cloned().collect();
        *self.active() = active;
        Ok(Completion::Done(names))
    }

    async fn apply_steps(
        &self,
        profile: &Profile,
        op: Operation,
    ) -> Result<TabReport, OverrideError> {
        self.transition(LifecycleState::ClearingCookies(op));
        let cleared = self.sync.clear_all().await?;
        self.transition(LifecycleState::WritingCookies(op));
        let written = self.sync.write(profile).await?;

        let mut report = TabReport {
            tab: written.tab.or(cleared.tab),
            cleared,
            written,
            ..TabReport::default()
        };

        if let Some((tab, _)) = self.script_target().await? {
            self.transition(LifecycleState::ExecutingScript(op));
            self.host
                .execute(tab, PageProgram::ClearOverridesDisabled)
                .await?;
            self.transition(LifecycleState::Reloading(op));
            self.host.reload(tab, true).await?;
            report.tab = Some(tab);
            report.reloaded = true;
        }

        self.mark_active(&profile.name, &report.cleared);
        self.warn_partial(op, &report);
        tracing::info!(profile = %profile.name, tab = ?report.tab, "profile applied");
        Ok(report)
    }

    async fn disable_steps(
        &self,
        profile: &Profile,
        op: Operation,
    ) -> Result<TabReport, OverrideError> {
        let keys = profile.keys();
        self.transition(LifecycleState::RemovingCookies(op));
        let removed = self.sync.remove_keys(&keys).await?;

        let mut report = TabReport {
            tab: removed.tab,
            removed,
            ..TabReport::default()
        };

        if let Some((tab, _)) = self.script_target().await? {
            self.transition(LifecycleState::ExecutingScript(op));
            self.host
                .execute(tab, PageProgram::SetOverridesDisabled)
                .await?;

            // Best effort: the reload below drops the elements anyway
            match self
                .host
                .execute(tab, PageProgram::RemoveInjected { keys })
                .await
            {
                Ok(ProgramOutcome::Removed { count }) => report.elements_removed = count,
                Ok(other) => tracing::debug!(?other, "unexpected outcome removing elements"),
                Err(e) => {
                    tracing::warn!(tab = %tab, error = %e, "could not remove injected elements")
                }
            }

            self.transition(LifecycleState::Reloading(op));
            self.host.reload(tab, true).await?;
            report.tab = Some(tab);
            report.reloaded = true;
        }

        self.active().remove(&profile.name);
        self.warn_partial(op, &report);
        tracing::info!(profile = %profile.name, tab = ?report.tab, "profile disabled");
        Ok(report)
    }

    async fn overlay_steps(&self, profile: &Profile) -> Result<TabReport, OverrideError> {
        let op = Operation::Overlay;
        self.transition(LifecycleState::ClearingCookies(op));
        let cleared = self.sync.clear_all().await?;
        self.transition(LifecycleState::WritingCookies(op));
        let written = self.sync.write(profile).await?;

        let mut report = TabReport {
            tab: written.tab.or(cleared.tab),
            cleared,
            written,
            ..TabReport::default()
        };

        if let Some((tab, url)) = self.script_target().await? {
            self.transition(LifecycleState::MountingOverlay);
            self.host.insert_css(tab, OVERLAY_CSS.to_string()).await?;

            // A frame left open still runs the previous profile's scripts
            if let ProgramOutcome::OverlayUnmounted { removed: true } =
                self.host.execute(tab, PageProgram::UnmountOverlay).await?
            {
                tracing::debug!(tab = %tab, "replacing open overlay");
                self.notices.post(
                    NoticeLevel::Info,
                    format!("Overlay reloaded with profile {}", profile.name),
                );
            }

            let spec = OverlaySpec::new(url, &self.config.overlay);
            match self.host.execute(tab, PageProgram::MountOverlay(spec)).await? {
                ProgramOutcome::OverlayMounted { mounted } => {
                    if !mounted {
                        tracing::debug!(tab = %tab, "overlay already mounted");
                    }
                    report.overlay_mounted = mounted;
                }
                other => tracing::debug!(?other, "unexpected outcome mounting overlay"),
            }
            report.tab = Some(tab);
        }

        self.mark_active(&profile.name, &report.cleared);
        self.warn_partial(op, &report);
        tracing::info!(profile = %profile.name, tab = ?report.tab, "overlay applied");
        Ok(report)
    }

    async fn save_steps(&self, profile: Profile) -> Result<Vec<ValidationWarning>, OverrideError> {
        let name = profile.name.clone();
        let mut next = self.profiles.lock().await.clone();
        let warnings = next.insert(profile)?;

        self.persist(next, Operation::Save).await?;
        self.post_warnings(&warnings);
        tracing::info!(profile = %name, warnings = warnings.len(), "profile saved");
        Ok(warnings)
    }

    async fn edit_steps(
        &self,
        original: &str,
        updated: Profile,
    ) -> Result<EditReport, OverrideError> {
        let mut next = self.profiles.lock().await.clone();
        let previous = next
            .get(original)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownProfile(original.to_string()))?;
        let name = updated.name.clone();
        let warnings = next.replace(original, updated)?;

        let was_active = self.is_active(original);
        let reapply = if was_active { next.get(&name).cloned() } else { None };
        let mut report = EditReport {
            warnings,
            ..EditReport::default()
        };

        if was_active {
            report.disabled = Some(self.disable_steps(&previous, Operation::Edit).await?);
        }

        self.persist(next, Operation::Edit).await?;
        self.post_warnings(&report.warnings);

        if let Some(profile) = reapply {
            self.transition(LifecycleState::AwaitingReapply);
            tokio::time::sleep(self.config.reapply_delay).await;
            report.reapplied = Some(self.apply_steps(&profile, Operation::Edit).await?);
        }

        tracing::info!(profile = %original, renamed = %name, was_active, "profile edited");
        Ok(report)
    }

    async fn delete_steps(&self, name: &str) -> Result<Profile, OverrideError> {
        let mut next = self.profiles.lock().await.clone();
        let removed = next
            .remove(name)
            .ok_or_else(|| ValidationError::UnknownProfile(name.to_string()))?;

        self.persist(next, Operation::Delete).await?;
        self.active().remove(name);
        tracing::info!(profile = %name, "profile deleted");
        Ok(removed)
    }

    /// Write `next` to storage, then make it current.
    async fn persist(&self, next: ProfileCollection, op: Operation) -> Result<(), OverrideError> {
        self.transition(LifecycleState::Persisting(op));
        next.store(self.storage.as_ref(), &self.config.storage_key)
            .await?;
        *self.profiles.lock().await = next;
        Ok(())
    }

    /// The active tab, if it has a URL to script against.
    async fn script_target(&self) -> Result<Option<(TabId, Url)>, OverrideError> {
        Ok(self
            .host
            .active_tab()
            .await?
            .and_then(|tab| tab.url.map(|url| (tab.id, url))))
    }

    fn begin(&self, op: Operation) -> Option<OperationGuard<'_>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(
                operation = ?op,
                state = ?self.state(),
                "controller busy, operation rejected"
            );
            return None;
        }
        Some(OperationGuard {
            busy: &self.busy,
            state: &self.state,
        })
    }

    fn transition(&self, next: LifecycleState) {
        tracing::trace!(state = ?next, "lifecycle transition");
        self.state.send_replace(next);
    }

    fn active(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clearing the tab removed every other profile's cookies, so `name`
    /// replaces the active set. Without a tab nothing was cleared.
    fn mark_active(&self, name: &str, cleared: &SyncReport) {
        let mut active = self.active();
        if cleared.tab.is_some() {
            active.clear();
        }
        active.insert(name.to_string());
    }

    /// Host failures become a transient notice; everything is returned as is.
    fn surface(&self, op: Operation, error: OverrideError) -> OverrideError {
        if error.is_host_failure() {
            tracing::error!(operation = ?op, error = %error, "lifecycle operation failed");
            self.notices.post(NoticeLevel::Error, error.to_string());
        } else {
            tracing::debug!(operation = ?op, error = %error, "lifecycle operation rejected");
        }
        error
    }

    fn warn_partial(&self, op: Operation, report: &TabReport) {
        let failed: Vec<&str> = report
            .cookie_failures()
            .map(|f| f.name.as_str())
            .collect();
        if failed.is_empty() {
            return;
        }
        tracing::warn!(operation = ?op, failed = failed.len(), "cookie calls failed");
        self.notices.post(
            NoticeLevel::Warning,
            format!("{} cookie call(s) failed: {}", failed.len(), failed.join(", ")),
        );
    }

    fn post_warnings(&self, warnings: &[ValidationWarning]) {
        for warning in warnings {
            tracing::warn!(%warning, "saved with warning");
            self.notices.post(NoticeLevel::Warning, warning.to_string());
        }
    }
}
