//! Error types produced by the signal registry.
//!
//! The taxonomy is deliberately small. Connecting, disconnecting and tearing
//! down never fail: a missing connection or endpoint is a no-op. What remains
//! is a callback failing during an emission, and a signal being redeclared
//! with a different argument type.

use thiserror::Error;

use crate::signals::ObjectId;

/// Error type a callback may return to abort an emission.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// # Errors produced by the signal registry.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SignalError {
    /// A connected callback returned an error; the remaining callbacks of
    /// that emission were not invoked.
    #[error("callback for signal `{signal}` on {owner} failed: {source}")]
    Callback {
        /// Diagnostic name of the signal being emitted.
        signal: &'static str,
        /// The emitter the signal was fired on.
        owner: ObjectId,
        /// The error returned by the callback.
        #[source]
        source: CallbackError,
    },

    /// A signal name was declared twice on the same type with different
    /// argument types.
    #[error("signal `{name}` already declared with arguments `{declared}`, not `{requested}`")]
    ArgumentMismatch {
        /// The signal name.
        name: &'static str,
        /// Argument type of the existing declaration.
        declared: &'static str,
        /// Argument type of the rejected declaration.
        requested: &'static str,
    },
}

impl SignalError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SignalError::Callback { .. } => "signal_callback_failed",
            SignalError::ArgumentMismatch { .. } => "signal_argument_mismatch",
        }
    }

    /// The owner whose emission failed, for callback errors.
    pub fn owner(&self) -> Option<ObjectId> {
        match self {
            SignalError::Callback { owner, .. } => Some(*owner),
            SignalError::ArgumentMismatch { .. } => None,
        }
    }
}
