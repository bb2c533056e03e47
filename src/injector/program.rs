//! Programs executed inside the page context.
//!
//! The controller never builds page code inline. It sends one of these
//! serializable programs across the scripting boundary, and the page side
//! runs it with [`run_program`].

use crate::injector::{
    element_id, InjectionSummary, Injector, InjectorConfig, PageContext, DISABLED_FLAG_VALUE,
};
use crate::overlay::OverlaySpec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "program", rename_all = "camelCase")]
pub enum PageProgram {
    /// Run the injector against the current cookies.
    RunInjector,
    /// Suppress the injector on the next page load.
    SetOverridesDisabled,
    ClearOverridesDisabled,
    /// Remove loader elements of the given override keys.
    RemoveInjected { keys: Vec<String> },
    MountOverlay(OverlaySpec),
    UnmountOverlay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ProgramOutcome {
    Injected(InjectionSummary),
    FlagUpdated,
    Removed { count: usize },
    OverlayMounted { mounted: bool },
    OverlayUnmounted { removed: bool },
}

/// Execute `program` in `page`.
pub async fn run_program<P: PageContext + ?Sized>(
    page: Arc<P>,
    program: PageProgram,
    config: &InjectorConfig,
) -> ProgramOutcome {
    match program {
        PageProgram::RunInjector => {
            let summary = Injector::new(page, config.clone()).run().await;
            ProgramOutcome::Injected(summary)
        }
        PageProgram::SetOverridesDisabled => {
            page.set_session_item(&config.disabled_flag_key, DISABLED_FLAG_VALUE);
            ProgramOutcome::FlagUpdated
        }
        PageProgram::ClearOverridesDisabled => {
            page.remove_session_item(&config.disabled_flag_key);
            ProgramOutcome::FlagUpdated
        }
        PageProgram::RemoveInjected { keys } => {
            let count = keys
                .iter()
                .filter(|key| page.remove_element(&element_id(key)))
                .count();
            tracing::debug!(requested = keys.len(), removed = count, "removed injected elements");
            ProgramOutcome::Removed { count }
        }
        PageProgram::MountOverlay(spec) => ProgramOutcome::OverlayMounted {
            mounted: page.mount_overlay(&spec),
        },
        PageProgram::UnmountOverlay => ProgramOutcome::OverlayUnmounted {
            removed: page.unmount_overlay(),
        },
    }
}
