//! Neighborhood tracking for weft hosts.
//!
//! The [`Tracker`] maintains a reference count of open connections per host
//! peer and classifies the number of distinct peers into a
//! [`Phase`](weft_primitives::Phase). Every lease (first connection to a peer)
//! and eviction (last connection closed) is published as an
//! [`EvtNeighborhoodChanged`](weft_primitives::EvtNeighborhoodChanged).

mod error;
mod metrics;
mod neighborhood;
mod tracker;

pub use error::{NeighborhoodError, NeighborhoodResult};
pub use neighborhood::{DEFAULT_KMAX, DEFAULT_KMIN, Neighborhood, NeighborhoodConfig};
pub use tracker::Tracker;
