/// The lifecycle operation currently holding the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Apply,
    Disable,
    Overlay,
    Save,
    Edit,
    Delete,
    Refresh,
}

/// The current state of the lifecycle controller.
///
/// Published to observers on every transition; `Idle` means a new
/// operation will be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// No operation in flight.
    #[default]
    Idle,

    /// Reading the tab's live override cookies.
    ReadingCookies(Operation),

    /// Removing every override-shaped cookie from the tab.
    ClearingCookies(Operation),

    /// Writing a profile's cookies into the tab's jar.
    WritingCookies(Operation),

    /// Removing one profile's cookies by name.
    RemovingCookies(Operation),

    /// Running a page program inside the tab.
    ExecutingScript(Operation),

    /// Waiting on a cache-bypassing reload.
    Reloading(Operation),

    /// Installing the comparison frame and control panel.
    MountingOverlay,

    /// Writing the profile collection to storage.
    Persisting(Operation),

    /// Letting cookie removal settle before re-applying an edited profile.
    AwaitingReapply,
}

impl LifecycleState {
    pub fn is_idle(&self) -> bool {
        matches!(self, LifecycleState::Idle)
    }

    pub fn operation(&self) -> Option<Operation> {
        match self {
            LifecycleState::Idle => None,
            LifecycleState::ReadingCookies(op)
            | LifecycleState::ClearingCookies(op)
            | LifecycleState::WritingCookies(op)
            | LifecycleState::RemovingCookies(op)
            | LifecycleState::ExecutingScript(op)
            | LifecycleState::Reloading(op)
            | LifecycleState::Persisting(op) => Some(*op),
            LifecycleState::MountingOverlay => Some(Operation::Overlay),
            LifecycleState::AwaitingReapply => Some(Operation::Edit),
        }
    }
}
