//! Error types for the governor control loop.

use thiserror::Error;

/// Result type for control operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur in control operations.
///
/// None of these leave a controller partially updated: a rejected call has no
/// effect on existing state.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    /// Tuning, limit, or timing parameter out of range.
    #[error("Invalid configuration: {what}")]
    InvalidConfig { what: String },

    /// Operation not allowed in the controller's current mode.
    #[error("Controller state error: {what}")]
    StateError { what: String },

    /// The actuator rejected or failed to apply an output.
    #[error("Actuator error: {message}")]
    Actuator { message: String },
}

impl ControlError {
    pub(crate) fn invalid(what: impl Into<String>) -> Self {
        ControlError::InvalidConfig { what: what.into() }
    }
}
