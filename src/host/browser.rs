//! In-memory browser with a single active tab.
//!
//! Implements [`CookieJar`] and [`TabHost`] over a [`CookieMonster`] and
//! [`SimulatedPage`]s. A reload builds a new page instance and runs the
//! injector in it to completion before the reload call returns. Host
//! failures can be switched on per surface.

use crate::base::overrideerror::OverrideError;
use crate::cookies::canonical_cookie::CanonicalCookie;
use crate::cookies::monster::CookieMonster;
use crate::host::page::{ScriptNetwork, SessionStorage, SimulatedPage};
use crate::host::{CookieJar, CookieQuery, HostFuture, SetCookie, Tab, TabHost, TabId};
use crate::injector::program::{self, PageProgram, ProgramOutcome};
use crate::injector::InjectorConfig;
use dashmap::DashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use url::Url;

/// Host calls in the order they were received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    QueryTab,
    GetCookies { domain: String, name: Option<String> },
    SetCookie { name: String },
    RemoveCookie { name: String },
    InsertCss,
    Execute { program: String },
    Reload { bypass_cache: bool },
}

struct TabState {
    id: TabId,
    url: Option<Url>,
    session: SessionStorage,
    page: Option<Arc<SimulatedPage>>,
}

#[derive(Default)]
struct Faults {
    tab_query: AtomicBool,
    cookie_writes: AtomicBool,
    cookie_removals: DashSet<String>,
    scripting: AtomicBool,
    reload: AtomicBool,
}

pub struct SimulatedBrowser {
    jar: CookieMonster,
    network: Arc<ScriptNetwork>,
    injector: InjectorConfig,
    next_tab: AtomicU32,
    tab: Mutex<Option<TabState>>,
    faults: Faults,
    calls: Mutex<Vec<HostCall>>,
    stylesheets: Mutex<Vec<(TabId, String)>>,
}

impl Default for SimulatedBrowser {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulatedBrowser {
    pub fn new() -> Self {
        Self::with_injector_config(InjectorConfig::default())
    }

    pub fn with_injector_config(injector: InjectorConfig) -> Self {
        Self {
            jar: CookieMonster::new(),
            network: Arc::new(ScriptNetwork::new()),
            injector,
            next_tab: AtomicU32::new(1),
            tab: Mutex::new(None),
            faults: Faults::default(),
            calls: Mutex::new(Vec::new()),
            stylesheets: Mutex::new(Vec::new()),
        }
    }

    pub fn jar(&self) -> &CookieMonster {
        &self.jar
    }

    pub fn network(&self) -> &ScriptNetwork {
        &self.network
    }

    /// Open a tab at `url` and make it active, running the initial page load.
    pub async fn open_tab(&self, url: &str) -> Result<TabId, OverrideError> {
        let url = Url::parse(url).map_err(|e| OverrideError::Config(e.to_string()))?;
        let id = self.install_tab(Some(url));
        self.load_page().await;
        Ok(id)
    }

    /// Open an active tab that has no URL (a blank or privileged page).
    pub fn open_blank_tab(&self) -> TabId {
        self.install_tab(None)
    }

    pub fn close_tab(&self) {
        lock(&self.tab).take();
    }

    fn install_tab(&self, url: Option<Url>) -> TabId {
        let id = TabId(self.next_tab.fetch_add(1, Ordering::SeqCst));
        *lock(&self.tab) = Some(TabState {
            id,
            url,
            session: SessionStorage::default(),
            page: None,
        });
        id
    }

    /// The current page instance of the active tab.
    pub fn page(&self) -> Option<Arc<SimulatedPage>> {
        lock(&self.tab).as_ref().and_then(|t| t.page.clone())
    }

    pub fn calls(&self) -> Vec<HostCall> {
        lock(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    pub fn reloads(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, HostCall::Reload { .. }))
            .count()
    }

    pub fn stylesheets(&self) -> Vec<(TabId, String)> {
        lock(&self.stylesheets).clone()
    }

    pub fn fail_tab_query(&self, fail: bool) {
        self.faults.tab_query.store(fail, Ordering::SeqCst);
    }

    pub fn fail_cookie_writes(&self, fail: bool) {
        self.faults.cookie_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_cookie_removal(&self, name: &str) {
        self.faults.cookie_removals.insert(name.to_string());
    }

    pub fn fail_scripting(&self, fail: bool) {
        self.faults.scripting.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reload(&self, fail: bool) {
        self.faults.reload.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: HostCall) {
        lock(&self.calls).push(call);
    }

    /// Replace the tab's page with a fresh instance and run the injector in it.
    async fn load_page(&self) -> Option<Arc<SimulatedPage>> {
        let page = {
            let mut tab = lock(&self.tab);
            let tab = tab.as_mut()?;
            let url = tab.url.clone()?;
            let page = Arc::new(SimulatedPage::new(
                url,
                self.jar.clone(),
                Arc::clone(&self.network),
                Arc::clone(&tab.session),
            ));
            tab.page = Some(Arc::clone(&page));
            page
        };

        self.run_injector(&page).await;
        Some(page)
    }

    /// Parse the document, then run the injector program the way a content
    /// script would at document start.
    async fn run_injector(&self, page: &Arc<SimulatedPage>) {
        page.finish_parsing();
        let outcome =
            program::run_program(Arc::clone(page), PageProgram::RunInjector, &self.injector).await;
        if let ProgramOutcome::Injected(summary) = outcome {
            page.record_injection(summary);
        }
    }

    fn current_page(&self, id: TabId) -> Result<Arc<SimulatedPage>, OverrideError> {
        let tab = lock(&self.tab);
        match tab.as_ref() {
            Some(t) if t.id == id => t.page.clone().ok_or_else(|| OverrideError::Scripting {
                tab: id.0,
                message: "cannot access a page without a URL".to_string(),
            }),
            _ => Err(OverrideError::Scripting {
                tab: id.0,
                message: "no tab with that id".to_string(),
            }),
        }
    }
}

fn program_name(program: &PageProgram) -> String {
    serde_json::to_value(program)
        .ok()
        .and_then(|v| v.get("program").and_then(|p| p.as_str()).map(str::to_string))
        .unwrap_or_default()
}

impl CookieJar for SimulatedBrowser {
    fn get_all(&self, query: CookieQuery) -> HostFuture<'_, Vec<CanonicalCookie>> {
        Box::pin(async move {
            self.record(HostCall::GetCookies {
                domain: query.domain.clone(),
                name: query.name.clone(),
            });
            Ok(self
                .jar
                .cookies_for_domain(&query.domain, query.name.as_deref()))
        })
    }

    fn set(&self, cookie: SetCookie) -> HostFuture<'_, ()> {
        Box::pin(async move {
            self.record(HostCall::SetCookie {
                name: cookie.name.clone(),
            });
            tokio::task::yield_now().await;
            if self.faults.cookie_writes.load(Ordering::SeqCst) {
                return Err(OverrideError::cookie_store("set", cookie.name, "write rejected"));
            }

            let url_host = cookie.url.host_str().unwrap_or("").to_string();
            let canonical = match cookie.domain {
                Some(domain) => CanonicalCookie::new(cookie.name, cookie.value, domain),
                None => CanonicalCookie::new(cookie.name, cookie.value, url_host).host_only(),
            };
            self.jar.set_canonical_cookie(canonical.with_path(cookie.path));
            Ok(())
        })
    }

    fn remove(&self, url: Url, name: String) -> HostFuture<'_, ()> {
        Box::pin(async move {
            self.record(HostCall::RemoveCookie { name: name.clone() });
            tokio::task::yield_now().await;
            if self.faults.cookie_removals.contains(&name) {
                return Err(OverrideError::cookie_store("remove", name, "removal rejected"));
            }
            self.jar.remove(&url, &name);
            Ok(())
        })
    }
}

impl TabHost for SimulatedBrowser {
    fn active_tab(&self) -> HostFuture<'_, Option<Tab>> {
        Box::pin(async move {
            self.record(HostCall::QueryTab);
            if self.faults.tab_query.load(Ordering::SeqCst) {
                return Err(OverrideError::TabQuery("tabs API unavailable".to_string()));
            }
            Ok(lock(&self.tab).as_ref().map(|t| Tab {
                id: t.id,
                url: t.url.clone(),
            }))
        })
    }

    fn insert_css(&self, tab: TabId, css: String) -> HostFuture<'_, ()> {
        Box::pin(async move {
            self.record(HostCall::InsertCss);
            if self.faults.scripting.load(Ordering::SeqCst) {
                return Err(OverrideError::StylesheetInjection {
                    tab: tab.0,
                    message: "cannot access contents of the page".to_string(),
                });
            }
            self.current_page(tab)?;
            lock(&self.stylesheets).push((tab, css));
            Ok(())
        })
    }

    fn execute(&self, tab: TabId, program: PageProgram) -> HostFuture<'_, ProgramOutcome> {
        Box::pin(async move {
            self.record(HostCall::Execute {
                program: program_name(&program),
            });
            if self.faults.scripting.load(Ordering::SeqCst) {
                return Err(OverrideError::Scripting {
                    tab: tab.0,
                    message: "cannot access contents of the page".to_string(),
                });
            }

            let page = self.current_page(tab)?;
            let outcome = program::run_program(Arc::clone(&page), program, &self.injector).await;

            // The framed copy loads like any other page
            if let ProgramOutcome::OverlayMounted { mounted: true } = outcome {
                if let Some(frame) = page.frame() {
                    self.run_injector(&frame).await;
                }
            }
            Ok(outcome)
        })
    }

    fn reload(&self, tab: TabId, bypass_cache: bool) -> HostFuture<'_, ()> {
        Box::pin(async move {
            self.record(HostCall::Reload { bypass_cache });
            if self.faults.reload.load(Ordering::SeqCst) {
                return Err(OverrideError::Reload {
                    tab: tab.0,
                    message: "tab was closed".to_string(),
                });
            }
            self.current_page(tab)?;
            self.load_page().await;
            tracing::debug!(tab = %tab, bypass_cache, "tab reloaded");
            Ok(())
        })
    }
}
