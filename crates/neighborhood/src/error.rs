use weft_bus::BusError;
use weft_primitives::PeerId;

/// Neighborhood tracker errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NeighborhoodError {
    #[error("invalid neighborhood bounds: kmin {kmin} exceeds kmax {kmax}")]
    InvalidBounds { kmin: usize, kmax: usize },
    /// A `Closed` event arrived for a peer with no recorded connection.
    #[error("unpaired close for peer {peer}")]
    UnpairedClose { peer: PeerId },
    #[error("tracker setup failed: {0}")]
    Setup(#[source] BusError),
    #[error("failed to emit neighborhood change: {0}")]
    Emit(#[source] BusError),
}

pub type NeighborhoodResult<T> = Result<T, NeighborhoodError>;
