use scriptswap::cookies::canonical_cookie::CanonicalCookie;
use scriptswap::cookies::encoding;
use scriptswap::cookies::monster::CookieMonster;
use scriptswap::host::page::{ScriptBehavior, ScriptNetwork, SessionStorage, SimulatedPage};
use scriptswap::injector::program::{run_program, PageProgram, ProgramOutcome};
use scriptswap::injector::retry::RetryConfig;
use scriptswap::injector::{
    element_id, Injector, InjectorConfig, KeyOutcome, PageContext, DISABLED_FLAG_KEY,
};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const SCRIPT_A: &str = "https://cdn.example.com/a.js";
const SCRIPT_B: &str = "https://cdn.example.com/b.js";

struct Fixture {
    jar: CookieMonster,
    network: Arc<ScriptNetwork>,
    session: SessionStorage,
}

impl Fixture {
    fn new() -> Self {
        Self {
            jar: CookieMonster::new(),
            network: Arc::new(ScriptNetwork::new()),
            session: SessionStorage::default(),
        }
    }

    fn set_override(&self, key: &str, url: &str) {
        self.jar.set_canonical_cookie(CanonicalCookie::new(
            key,
            encoding::encode_component(url),
            "shop.example.com",
        ));
    }

    /// A page instance whose document has already been parsed.
    fn page(&self) -> Arc<SimulatedPage> {
        let page = self.unparsed_page();
        page.finish_parsing();
        page
    }

    fn unparsed_page(&self) -> Arc<SimulatedPage> {
        Arc::new(SimulatedPage::new(
            Url::parse("https://shop.example.com/cart").unwrap(),
            self.jar.clone(),
            Arc::clone(&self.network),
            Arc::clone(&self.session),
        ))
    }
}

#[tokio::test]
async fn test_injects_one_element_per_override() {
    let fx = Fixture::new();
    fx.set_override("checkout/bootstrap/js", SCRIPT_A);
    fx.set_override("search/widget", SCRIPT_B);
    let page = fx.page();

    let summary = Injector::new(Arc::clone(&page), InjectorConfig::default())
        .run()
        .await;

    assert!(!summary.suppressed);
    assert_eq!(
        summary.outcome("checkout/bootstrap/js"),
        Some(&KeyOutcome::Loaded { attempts: 1 })
    );
    assert_eq!(
        summary.outcome("search/widget"),
        Some(&KeyOutcome::Loaded { attempts: 1 })
    );

    let scripts = page.scripts();
    assert_eq!(scripts.len(), 2);
    let a = scripts
        .iter()
        .find(|s| s.id == element_id("checkout/bootstrap/js"))
        .unwrap();
    assert_eq!(a.src.as_str(), SCRIPT_A);
    assert_eq!(a.cross_origin, "anonymous");
    assert_eq!(a.referrer_policy, "no-referrer");
}

#[tokio::test]
async fn test_injection_is_idempotent_per_page() {
    let fx = Fixture::new();
    fx.set_override("checkout/bootstrap/js", SCRIPT_A);
    let page = fx.page();
    let injector = Injector::new(Arc::clone(&page), InjectorConfig::default());

    injector.run().await;
    let second = injector.run().await;

    assert_eq!(
        second.outcome("checkout/bootstrap/js"),
        Some(&KeyOutcome::AlreadyPresent)
    );
    assert_eq!(page.scripts().len(), 1);
    assert_eq!(fx.network.request_count(SCRIPT_A), 1);
}

#[tokio::test]
async fn test_inject_skips_existing_element() {
    let fx = Fixture::new();
    let page = fx.page();
    let injector = Injector::new(Arc::clone(&page), InjectorConfig::default());
    let url = Url::parse(SCRIPT_A).unwrap();

    assert_eq!(
        injector.inject("a/b", &url).await,
        KeyOutcome::Loaded { attempts: 1 }
    );
    assert_eq!(injector.inject("a/b", &url).await, KeyOutcome::AlreadyPresent);
    assert_eq!(page.scripts().len(), 1);
}

#[tokio::test]
async fn test_concurrent_inject_waiting_for_head_loads_once() {
    let fx = Fixture::new();
    let page = fx.unparsed_page();
    let injector = Injector::new(Arc::clone(&page), InjectorConfig::default());
    let url = Url::parse(SCRIPT_A).unwrap();

    let parse = async {
        tokio::task::yield_now().await;
        page.finish_parsing();
    };
    let (first, second, ()) = tokio::join!(
        injector.inject("a/b", &url),
        injector.inject("a/b", &url),
        parse
    );

    let mut outcomes = [first, second];
    outcomes.sort_by_key(|o| matches!(o, KeyOutcome::AlreadyPresent));
    assert_eq!(
        outcomes,
        [KeyOutcome::Loaded { attempts: 1 }, KeyOutcome::AlreadyPresent]
    );
    assert_eq!(page.scripts().len(), 1);
    assert_eq!(fx.network.request_count(SCRIPT_A), 1);
}

#[tokio::test(start_paused = true)]
async fn test_inject_during_backoff_is_not_duplicated() {
    let fx = Fixture::new();
    fx.network.set_behavior(SCRIPT_A, ScriptBehavior::FailTimes(1));
    let page = fx.page();
    let injector = Injector::new(Arc::clone(&page), InjectorConfig::default());
    let url = Url::parse(SCRIPT_A).unwrap();

    let late = async {
        // Lands inside the first call's 500ms backoff
        tokio::time::sleep(Duration::from_millis(100)).await;
        injector.inject("a/b", &url).await
    };
    let (retrying, late) = tokio::join!(injector.inject("a/b", &url), late);

    assert_eq!(late, KeyOutcome::Loaded { attempts: 1 });
    assert_eq!(retrying, KeyOutcome::AlreadyPresent);
    assert_eq!(page.scripts().len(), 1);
    assert_eq!(fx.network.request_count(SCRIPT_A), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failing_script_is_attempted_three_times() {
    let fx = Fixture::new();
    fx.set_override("checkout/bootstrap/js", SCRIPT_A);
    fx.network.set_behavior(SCRIPT_A, ScriptBehavior::Fail);
    let page = fx.page();

    let summary = Injector::new(Arc::clone(&page), InjectorConfig::default())
        .run()
        .await;
    assert_eq!(
        summary.outcome("checkout/bootstrap/js"),
        Some(&KeyOutcome::GaveUp { attempts: 3 })
    );

    let requests = fx.network.requests(SCRIPT_A);
    assert_eq!(requests.len(), 3);
    let first_gap = requests[1] - requests[0];
    let second_gap = requests[2] - requests[1];
    assert!(first_gap >= Duration::from_millis(500));
    assert!(second_gap >= Duration::from_millis(1000));
    assert!(second_gap > first_gap);

    // Nothing further happens once the injector has given up
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(fx.network.request_count(SCRIPT_A), 3);
    assert_eq!(page.scripts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_replaces_failed_element() {
    let fx = Fixture::new();
    fx.set_override("checkout/bootstrap/js", SCRIPT_A);
    fx.network.set_behavior(SCRIPT_A, ScriptBehavior::FailTimes(2));
    let page = fx.page();

    let summary = Injector::new(Arc::clone(&page), InjectorConfig::default())
        .run()
        .await;

    assert_eq!(
        summary.outcome("checkout/bootstrap/js"),
        Some(&KeyOutcome::Loaded { attempts: 3 })
    );
    assert_eq!(page.scripts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_sequences_are_independent() {
    let fx = Fixture::new();
    fx.set_override("checkout/bootstrap/js", SCRIPT_A);
    fx.set_override("search/widget", SCRIPT_B);
    fx.network.set_behavior(SCRIPT_A, ScriptBehavior::Fail);
    let page = fx.page();

    let summary = Injector::new(Arc::clone(&page), InjectorConfig::default())
        .run()
        .await;

    assert_eq!(
        summary.outcome("search/widget"),
        Some(&KeyOutcome::Loaded { attempts: 1 })
    );
    assert_eq!(
        summary.outcome("checkout/bootstrap/js"),
        Some(&KeyOutcome::GaveUp { attempts: 3 })
    );
    assert_eq!(fx.network.request_count(SCRIPT_B), 1);
}

#[tokio::test]
async fn test_abort_is_not_retried() {
    let fx = Fixture::new();
    fx.set_override("checkout/bootstrap/js", SCRIPT_A);
    fx.network.set_behavior(SCRIPT_A, ScriptBehavior::Abort);
    let page = fx.page();

    let summary = Injector::new(Arc::clone(&page), InjectorConfig::default())
        .run()
        .await;

    assert_eq!(
        summary.outcome("checkout/bootstrap/js"),
        Some(&KeyOutcome::Aborted { attempts: 1 })
    );
    assert_eq!(fx.network.request_count(SCRIPT_A), 1);
}

#[tokio::test]
async fn test_no_retry_config() {
    let fx = Fixture::new();
    fx.set_override("checkout/bootstrap/js", SCRIPT_A);
    fx.network.set_behavior(SCRIPT_A, ScriptBehavior::Fail);
    let config = InjectorConfig {
        retry: RetryConfig::no_retry(),
        ..InjectorConfig::default()
    };

    let summary = Injector::new(fx.page(), config).run().await;
    assert_eq!(
        summary.outcome("checkout/bootstrap/js"),
        Some(&KeyOutcome::GaveUp { attempts: 1 })
    );
}

#[tokio::test]
async fn test_waits_for_document_head() {
    let fx = Fixture::new();
    fx.set_override("checkout/bootstrap/js", SCRIPT_A);
    let page = fx.unparsed_page();
    let injector = Injector::new(Arc::clone(&page), InjectorConfig::default());

    let parse = async {
        tokio::task::yield_now().await;
        assert!(page.scripts().is_empty());
        page.finish_parsing();
    };
    let (summary, ()) = tokio::join!(injector.run(), parse);

    assert_eq!(summary.loaded(), vec!["checkout/bootstrap/js"]);
    assert_eq!(page.scripts().len(), 1);
}

#[tokio::test]
async fn test_disabled_flag_suppresses_one_run() {
    let fx = Fixture::new();
    fx.set_override("checkout/bootstrap/js", SCRIPT_A);
    let page = fx.page();
    page.set_session_item(DISABLED_FLAG_KEY, "true");

    let injector = Injector::new(Arc::clone(&page), InjectorConfig::default());
    let suppressed = injector.run().await;
    assert!(suppressed.suppressed);
    assert!(suppressed.outcomes.is_empty());
    assert!(page.scripts().is_empty());
    assert_eq!(page.session_item(DISABLED_FLAG_KEY), None);

    // The next page load injects again
    let next = fx.page();
    let summary = Injector::new(Arc::clone(&next), InjectorConfig::default())
        .run()
        .await;
    assert_eq!(summary.loaded(), vec!["checkout/bootstrap/js"]);
}

#[tokio::test]
async fn test_skips_non_candidates_and_invalid_urls() {
    let fx = Fixture::new();
    fx.jar.set_canonical_cookie(CanonicalCookie::new("session", "abc", "shop.example.com"));
    fx.set_override("checkout/bootstrap/js", SCRIPT_A);
    fx.set_override("legacy/ftp", "ftp://files.example.com/a.js");
    fx.set_override("evil/js", "javascript:alert(1)");
    let page = fx.page();

    let summary = Injector::new(Arc::clone(&page), InjectorConfig::default())
        .run()
        .await;

    assert_eq!(summary.outcome("session"), None);
    assert!(matches!(
        summary.outcome("legacy/ftp"),
        Some(KeyOutcome::Invalid { .. })
    ));
    assert!(matches!(
        summary.outcome("evil/js"),
        Some(KeyOutcome::Invalid { .. })
    ));
    assert_eq!(page.script_srcs(), vec![SCRIPT_A.to_string()]);
}

#[tokio::test]
async fn test_undecodable_value_is_tried_raw() {
    let fx = Fixture::new();
    fx.jar
        .set_canonical_cookie(CanonicalCookie::new(
            "a/b",
            "https://cdn.example.com/%ZZ.js",
            "shop.example.com",
        ));
    let page = fx.page();

    let summary = Injector::new(Arc::clone(&page), InjectorConfig::default())
        .run()
        .await;

    // Raw value is still an http(s) URL, so it gets loaded
    assert_eq!(summary.loaded(), vec!["a/b"]);
}

#[tokio::test]
async fn test_remove_injected_program() {
    let fx = Fixture::new();
    fx.set_override("checkout/bootstrap/js", SCRIPT_A);
    fx.set_override("search/widget", SCRIPT_B);
    let page = fx.page();
    let config = InjectorConfig::default();

    let outcome = run_program(Arc::clone(&page), PageProgram::RunInjector, &config).await;
    assert!(matches!(outcome, ProgramOutcome::Injected(_)));

    let outcome = run_program(
        Arc::clone(&page),
        PageProgram::RemoveInjected {
            keys: vec!["checkout/bootstrap/js".into(), "missing/key".into()],
        },
        &config,
    )
    .await;

    assert_eq!(outcome, ProgramOutcome::Removed { count: 1 });
    assert_eq!(page.script_srcs(), vec![SCRIPT_B.to_string()]);
}
