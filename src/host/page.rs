//! Simulated page context.
//!
//! One [`SimulatedPage`] is one page instance: a reload replaces it with a
//! fresh one. Page-session storage is shared between the instances of a tab
//! (and with a same-origin overlay frame), the cookie jar and the script
//! network are shared browser-wide.

use crate::cookies::monster::CookieMonster;
use crate::injector::{InjectionSummary, LoadEvent, PageContext, ScriptElement};
use crate::overlay::{OverlayPanel, OverlaySpec, OVERLAY_FRAME_ID, OVERLAY_PANEL_ID};
use dashmap::DashMap;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio::time::Instant;
use url::Url;

/// How the simulated network answers a script request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptBehavior {
    Load,
    Fail,
    Abort,
    /// Fail the first `n` requests, then load.
    FailTimes(usize),
}

/// Script responses by URL, with a request log.
#[derive(Default)]
pub struct ScriptNetwork {
    behaviors: DashMap<String, ScriptBehavior>,
    requests: DashMap<String, Vec<Instant>>,
}

impl ScriptNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unlisted URLs load successfully.
    pub fn set_behavior(&self, url: &str, behavior: ScriptBehavior) {
        self.behaviors.insert(url.to_string(), behavior);
    }

    /// Times at which `url` was requested.
    pub fn requests(&self, url: &str) -> Vec<Instant> {
        self.requests
            .get(url)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests.get(url).map_or(0, |r| r.len())
    }

    fn fetch(&self, url: &Url) -> LoadEvent {
        let mut log = self.requests.entry(url.to_string()).or_default();
        log.push(Instant::now());
        let previous = log.len() - 1;
        drop(log);

        let behavior = self
            .behaviors
            .get(url.as_str())
            .map(|b| b.value().clone())
            .unwrap_or(ScriptBehavior::Load);
        match behavior {
            ScriptBehavior::Load => LoadEvent::Load,
            ScriptBehavior::Fail => LoadEvent::Error(format!("failed to load {}", url)),
            ScriptBehavior::Abort => LoadEvent::Abort,
            ScriptBehavior::FailTimes(n) if previous < n => {
                LoadEvent::Error(format!("failed to load {}", url))
            }
            ScriptBehavior::FailTimes(_) => LoadEvent::Load,
        }
    }
}

/// Page-session storage shared by the page instances of one tab.
pub type SessionStorage = Arc<DashMap<String, String>>;

pub struct SimulatedPage {
    url: Url,
    jar: CookieMonster,
    network: Arc<ScriptNetwork>,
    session: SessionStorage,
    head: Mutex<Vec<ScriptElement>>,
    head_ready: AtomicBool,
    ready: Notify,
    overlay: Mutex<Option<OverlayPanel>>,
    frame: Mutex<Option<Arc<SimulatedPage>>>,
    injections: Mutex<Vec<InjectionSummary>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulatedPage {
    /// A page still being parsed: `<head>` appears on [`finish_parsing`](Self::finish_parsing).
    pub fn new(
        url: Url,
        jar: CookieMonster,
        network: Arc<ScriptNetwork>,
        session: SessionStorage,
    ) -> Self {
        Self {
            url,
            jar,
            network,
            session,
            head: Mutex::new(Vec::new()),
            head_ready: AtomicBool::new(false),
            ready: Notify::new(),
            overlay: Mutex::new(None),
            frame: Mutex::new(None),
            injections: Mutex::new(Vec::new()),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn finish_parsing(&self) {
        self.head_ready.store(true, Ordering::SeqCst);
        self.ready.notify_waiters();
    }

    /// Scripts currently in `<head>`, in insertion order.
    pub fn scripts(&self) -> Vec<ScriptElement> {
        lock(&self.head).clone()
    }

    pub fn script_srcs(&self) -> Vec<String> {
        lock(&self.head).iter().map(|s| s.src.to_string()).collect()
    }

    pub fn session_snapshot(&self) -> HashMap<String, String> {
        self.session
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    pub fn record_injection(&self, summary: InjectionSummary) {
        lock(&self.injections).push(summary);
    }

    /// Injector runs on this page instance, oldest first.
    pub fn injections(&self) -> Vec<InjectionSummary> {
        lock(&self.injections).clone()
    }

    pub fn overlay(&self) -> Option<OverlayPanel> {
        lock(&self.overlay).clone()
    }

    /// Interact with the overlay control panel, if mounted.
    pub fn with_overlay<R>(&self, f: impl FnOnce(&mut OverlayPanel) -> R) -> Option<R> {
        lock(&self.overlay).as_mut().map(f)
    }

    /// The page loaded inside the overlay frame.
    pub fn frame(&self) -> Option<Arc<SimulatedPage>> {
        lock(&self.frame).clone()
    }
}

impl PageContext for SimulatedPage {
    fn location(&self) -> Url {
        self.url.clone()
    }

    fn cookie_string(&self) -> String {
        self.jar.cookie_header(&self.url)
    }

    fn session_item(&self, key: &str) -> Option<String> {
        self.session.get(key).map(|v| v.value().clone())
    }

    fn set_session_item(&self, key: &str, value: &str) {
        self.session.insert(key.to_string(), value.to_string());
    }

    fn remove_session_item(&self, key: &str) {
        self.session.remove(key);
    }

    fn has_element(&self, id: &str) -> bool {
        if id == OVERLAY_FRAME_ID || id == OVERLAY_PANEL_ID {
            return lock(&self.overlay).is_some();
        }
        lock(&self.head).iter().any(|s| s.id == id)
    }

    fn head_ready(&self) -> bool {
        self.head_ready.load(Ordering::SeqCst)
    }

    fn document_ready(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            loop {
                let notified = self.ready.notified();
                if self.head_ready() {
                    return;
                }
                notified.await;
            }
        })
    }

    fn append_script(&self, script: ScriptElement) -> BoxFuture<'_, LoadEvent> {
        Box::pin(async move {
            let src = script.src.clone();
            lock(&self.head).push(script);
            // Handlers fire asynchronously after insertion
            tokio::task::yield_now().await;
            self.network.fetch(&src)
        })
    }

    fn remove_element(&self, id: &str) -> bool {
        let mut head = lock(&self.head);
        let before = head.len();
        head.retain(|s| s.id != id);
        head.len() != before
    }

    fn mount_overlay(&self, overlay: &OverlaySpec) -> bool {
        if self.has_element(OVERLAY_FRAME_ID) {
            return false;
        }
        *lock(&self.overlay) = Some(OverlayPanel::mount(overlay));

        let frame = SimulatedPage::new(
            overlay.frame_url.clone(),
            self.jar.clone(),
            Arc::clone(&self.network),
            Arc::clone(&self.session),
        );
        *lock(&self.frame) = Some(Arc::new(frame));
        true
    }

    fn unmount_overlay(&self) -> bool {
        lock(&self.frame).take();
        lock(&self.overlay).take().is_some()
    }
}
