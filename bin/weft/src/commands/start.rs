//! Start command - run a host process until interrupted.

use std::sync::Arc;

use eyre::{Result, WrapErr};
use tracing::{error, info};
use weft_connectivity::Connectivity;
use weft_net_dispatch::SwarmNetwork;
use weft_primitives::{ControlRequest, EvtNeighborhoodChanged};

use crate::{cli::StartArgs, config::StartConfig, host::Host};

pub(crate) async fn run(args: StartArgs) -> Result<()> {
    let config = StartConfig::resolve(&args)?;
    info!(ns = %config.ns, join = config.join.len(), "Starting host");

    let bus = config.connectivity.bus();
    let network = Arc::new(SwarmNetwork::new(&bus)?);
    let requests = bus.subscribe::<ControlRequest>()?;
    let changes = bus.subscribe::<EvtNeighborhoodChanged>()?;

    let mut host = Host::new(&config.ns, network.clone(), config.join.clone())?;
    let local_peer_id = host.local_peer_id();
    info!(%local_peer_id, "Local peer ID");

    let mut connectivity = Connectivity::start(&bus, &network, &local_peer_id, &config.connectivity)
        .wrap_err("failed to start connectivity")?;

    host.listen(&config.listen);
    host.dial_join();

    let outcome = tokio::select! {
        result = host.run(requests, changes) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            Ok(())
        }
        Some(err) = connectivity.next_error() => {
            error!(error = %err, "Connectivity failed");
            Err(eyre::Report::new(err))
        }
    };

    connectivity.stop().await;
    bus.close();
    info!("Host stopped");

    outcome
}
