//! Base types and error handling.
//!
//! Provides foundational types shared by every layer of the engine:
//! - [`OverrideError`]: Host-API, validation and protocol failures
//! - [`LifecycleState`]: Controller operation states observed by the UI

pub mod context;
pub mod loadstate;
pub mod overrideerror;

pub use loadstate::{LifecycleState, Operation};
pub use overrideerror::{OverrideError, ValidationError};
