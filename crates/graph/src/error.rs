use std::time::Duration;

use weft_bus::BusError;

/// Graph coordinator errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("jitter {jitter:?} exceeds scheduling period {period:?}")]
    InvalidJitter { period: Duration, jitter: Duration },
    #[error("scheduling period must be non-zero")]
    ZeroPeriod,
    #[error("coordinator setup failed: {0}")]
    Setup(#[source] BusError),
    #[error("failed to emit {event}: {source}")]
    Emit {
        event: &'static str,
        #[source]
        source: BusError,
    },
}

pub type GraphResult<T> = Result<T, GraphError>;
