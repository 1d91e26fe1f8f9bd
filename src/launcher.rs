//! Wires a [`Topology`] into running branches and customers.
//!
//! Branches are built first and every one of them lists all others as peers.
//! Once they are reachable, each customer runs on its own task and the run ends
//! when every customer has finished its script.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::config::{Timing, Topology};
use crate::ledger::branch::{Branch, BranchSnapshot};
use crate::ledger::customer::{Customer, Report};
use crate::ledger::propagator::{Propagate, Propagator};
use crate::server::BranchServer;
use crate::transport::{InProcessTransport, Transport, WebSocketTransport};

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// One report per customer, in input order
    pub reports: Vec<Report>,
    /// Branch state after the final propagations landed, in input order
    pub branches: Vec<BranchSnapshot>,
}

/// Creates every branch of `topology`, all sharing one `propagator`.
pub fn build_branches<T: Transport>(
    topology: &Topology,
    propagator: &Arc<Propagator<T>>,
) -> Vec<Arc<Branch>> {
    let ids = topology.branch_ids();
    let propagator: Arc<dyn Propagate> = propagator.clone();

    topology
        .branches
        .iter()
        .map(|config| {
            info!(
                "Initialize branch {} with balance {}",
                config.id, config.balance
            );
            Arc::new(Branch::new(
                config.id,
                config.balance,
                ids.clone(),
                Arc::clone(&propagator),
            ))
        })
        .collect()
}

/// Runs every customer concurrently and collects their reports in input order.
pub async fn run_customers<T: Transport>(
    topology: &Topology,
    transport: &T,
    timing: Timing,
) -> anyhow::Result<Vec<Report>> {
    let handles: Vec<_> = topology
        .customers
        .iter()
        .map(|config| {
            info!("Initialize customer {}", config.id);
            let mut customer = Customer::new(config.id, config.events.clone())
                .with_retry_interval(timing.retry_interval);
            let transport = transport.clone();
            tokio::spawn(async move { customer.execute_events(&transport).await })
        })
        .collect();

    let mut reports = Vec::with_capacity(handles.len());
    for (config, handle) in topology.customers.iter().zip(handles) {
        let report = handle
            .await
            .with_context(|| format!("customer {} task aborted", config.id))?
            .with_context(|| format!("customer {} failed", config.id))?;
        info!(
            "Customer {} finished with {} replies",
            report.id,
            report.recv.len()
        );
        reports.push(report);
    }
    Ok(reports)
}

/// Runs `topology` with every branch reachable through direct calls.
pub async fn run_in_process(topology: &Topology, timing: Timing) -> anyhow::Result<RunResult> {
    let transport = InProcessTransport::default();
    let propagator = Arc::new(Propagator::new(transport.clone(), timing.propagation_delay));
    let branches = build_branches(topology, &propagator);
    for branch in &branches {
        transport.register(Arc::clone(branch));
    }

    drive(topology, &transport, &propagator, &branches, timing).await
}

/// Runs `topology` with one WebSocket server per branch, bound on `host`.
pub async fn run_over_network(
    topology: &Topology,
    timing: Timing,
    host: IpAddr,
) -> anyhow::Result<RunResult> {
    let transport = WebSocketTransport::default();
    let propagator = Arc::new(Propagator::new(transport.clone(), timing.propagation_delay));
    let branches = build_branches(topology, &propagator);

    let mut servers = Vec::with_capacity(branches.len());
    for branch in &branches {
        let server = BranchServer::bind(Arc::clone(branch), SocketAddr::new(host, 0))
            .await
            .with_context(|| format!("cannot bind branch {}", branch.id()))?;
        transport.register(branch.id(), server.local_addr());
        servers.push(server);
    }

    let result = drive(topology, &transport, &propagator, &branches, timing).await;
    for server in servers {
        server.shutdown();
    }
    result
}

async fn drive<T: Transport>(
    topology: &Topology,
    transport: &T,
    propagator: &Propagator<T>,
    branches: &[Arc<Branch>],
    timing: Timing,
) -> anyhow::Result<RunResult> {
    tokio::time::sleep(timing.settle).await;
    let reports = run_customers(topology, transport, timing).await?;

    info!(
        "Customers done; waiting for {} propagations",
        propagator.in_flight()
    );
    propagator.idle().await;
    let branches: Vec<_> = branches.iter().map(|branch| branch.snapshot()).collect();
    for snapshot in &branches {
        info!(
            "Branch {} final balance {} at {}",
            snapshot.id, snapshot.balance, snapshot.write_set
        );
    }

    Ok(RunResult { reports, branches })
}
