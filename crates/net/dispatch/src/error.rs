//! Dispatcher errors.

use weft_bus::BusError;

/// Errors raised while translating network notifications.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// Acquiring a subscription or emitter failed during setup.
    #[error("dispatcher setup failed: {0}")]
    Setup(#[source] BusError),
    /// Publishing a translated event failed.
    #[error("failed to emit {event}: {source}")]
    Emit {
        event: &'static str,
        #[source]
        source: BusError,
    },
}

pub type DispatchResult<T> = Result<T, DispatchError>;
