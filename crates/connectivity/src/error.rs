use weft_graph::GraphError;
use weft_net_dispatch::DispatchError;
use weft_neighborhood::NeighborhoodError;

use crate::ConfigError;

/// Errors raised while starting or running the connectivity pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectivityError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("event translator: {0}")]
    Dispatch(#[from] DispatchError),
    #[error("neighborhood tracker: {0}")]
    Neighborhood(#[from] NeighborhoodError),
    #[error("graph coordinator: {0}")]
    Graph(#[from] GraphError),
}
