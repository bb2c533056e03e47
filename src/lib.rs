//! # scriptswap
//!
//! A script override engine for a single browser tab.
//!
//! `scriptswap` lets a user keep named override profiles, each a set of
//! `(application, feature, replacement URL)` triples, and apply them to the
//! active tab so that the page loads the replacement scripts instead of the
//! production ones.
//!
//! ## Features
//!
//! - **Cookie protocol**: One domain-scoped cookie per override, named `app/feature`
//! - **Page injector**: De-duplicated script loading with bounded linear backoff
//! - **Lifecycle controller**: Apply, disable and overlay with a single-flight lock
//! - **Overlay compare**: Framed copy of the page with opacity and difference blend
//! - **Profile storage**: Validated, wholesale-persisted profile collection
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scriptswap::config::EngineConfig;
//! use scriptswap::controller::LifecycleController;
//! use scriptswap::host::browser::SimulatedBrowser;
//! use scriptswap::host::storage::MemoryStorage;
//! use scriptswap::profile::Profile;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), scriptswap::base::OverrideError> {
//!     let browser = Arc::new(SimulatedBrowser::new());
//!     browser.open_tab("https://shop.example.com/").await?;
//!
//!     let controller = LifecycleController::load(
//!         Arc::clone(&browser),
//!         Arc::new(MemoryStorage::new()),
//!         EngineConfig::default(),
//!     )
//!     .await?;
//!
//!     let demo = Profile::new("demo")
//!         .with_override("checkout", "bootstrap/js", "https://cdn.example.com/a.js");
//!     controller.save(demo.clone()).await?;
//!     controller.apply(&demo).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error definitions and lifecycle states
//! - [`config`] - Engine configuration
//! - [`controller`] - Profile lifecycle controller and notices
//! - [`cookies`] - Override cookie encoding, cookie store and synchronizer
//! - [`host`] - Host traits and the simulated browser
//! - [`injector`] - Page-side injector and page programs
//! - [`overlay`] - Comparison overlay
//! - [`profile`] - Profiles, validation and the stored collection

pub mod base;
pub mod config;
pub mod controller;
pub mod cookies;
pub mod host;
pub mod injector;
pub mod overlay;
pub mod profile;
