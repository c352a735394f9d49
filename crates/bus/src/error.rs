//! Event bus errors.

/// Errors from acquiring or using bus handles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// The bus has been closed.
    #[error("event bus closed")]
    Closed,
    /// A subscriber queue had no capacity for a non-blocking emit.
    #[error("subscriber queue full for {event}")]
    Full { event: &'static str },
    /// The registry holds a different type under this event's key.
    #[error("event type registry mismatch for {event}")]
    TypeMismatch { event: &'static str },
}

pub type BusResult<T> = Result<T, BusError>;
