// Background resync workers (identity cache and conntrack sampling).
// Each tick dispatches its pass as a detached task; a tick that fires while
// the previous pass is still running is skipped (single-flight), so one
// stuck pass can neither delay the timer nor race an older result over a
// newer one.

use crate::aggregation::aggregate;
use crate::cluster_repo::ClusterRepo;
use crate::conntrack_repo::ConntrackSource;
use crate::flow_store::FlowStore;
use crate::identity_builder;
use crate::identity_store::IdentityStore;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};

/// Repo, store, and shutdown for the identity worker.
pub struct IdentityWorkerDeps {
    pub cluster_repo: Arc<ClusterRepo>,
    pub identity_store: Arc<IdentityStore>,
    pub shutdown_rx: oneshot::Receiver<()>,
}

/// Source, store, node name, and shutdown for the flow worker.
pub struct FlowWorkerDeps {
    pub source: Arc<ConntrackSource>,
    pub flow_store: Arc<FlowStore>,
    pub node_name: String,
    pub shutdown_rx: oneshot::Receiver<()>,
}

/// Spawns the identity resync task. The first build waits for the cluster
/// source to report itself synced (checked once); after that the interval's
/// immediate first tick triggers the initial build, then one per period.
pub fn spawn_identity_worker(deps: IdentityWorkerDeps, period: Duration) -> JoinHandle<()> {
    let IdentityWorkerDeps {
        cluster_repo,
        identity_store,
        mut shutdown_rx,
    } = deps;
    tokio::spawn(async move {
        tokio::select! {
            _ = cluster_repo.wait_ready() => {
                tracing::debug!("cluster state synced");
            }
            _ = &mut shutdown_rx => {
                tracing::debug!("identity worker shutting down before first sync");
                return;
            }
        }
        run_periodic("identity", period, shutdown_rx, move || {
            let repo = cluster_repo.clone();
            let store = identity_store.clone();
            tokio::spawn(identity_pass(repo, store))
        })
        .await;
    })
}

/// Spawns the conntrack sampling task.
pub fn spawn_flow_worker(deps: FlowWorkerDeps, period: Duration) -> JoinHandle<()> {
    let FlowWorkerDeps {
        source,
        flow_store,
        node_name,
        shutdown_rx,
    } = deps;
    tokio::spawn(async move {
        run_periodic("conntrack", period, shutdown_rx, move || {
            let source = source.clone();
            let store = flow_store.clone();
            let node = node_name.clone();
            tokio::spawn(flow_pass(source, store, node))
        })
        .await;
    })
}

/// Shared tick loop: dispatch one pass per tick, skip ticks while a pass is
/// in flight, harvest finished handles so a panicking pass is logged instead
/// of killing the timer. Shutdown exits the loop without interrupting an
/// in-flight pass; the process is exiting anyway.
async fn run_periodic<F>(
    task: &'static str,
    period: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
    dispatch: F,
) where
    F: Fn() -> JoinHandle<()>,
{
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut in_flight: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            _ = tick.tick() => {
                if let Some(handle) = in_flight.take() {
                    if handle.is_finished() {
                        if let Err(e) = handle.await {
                            tracing::error!(task, error = %e, "resync pass panicked");
                        }
                    } else {
                        tracing::debug!(task, "previous pass still running, skipping tick");
                        in_flight = Some(handle);
                        continue;
                    }
                }
                in_flight = Some(dispatch());
            }
            _ = &mut shutdown_rx => {
                tracing::debug!(task, "worker shutting down");
                break;
            }
        }
    }
}

async fn identity_pass(repo: Arc<ClusterRepo>, store: Arc<IdentityStore>) {
    match identity_builder::build(&repo).await {
        Ok(snapshot) => {
            let entries = snapshot.len();
            store.replace(snapshot);
            tracing::debug!(
                entries,
                operation = "build_snapshot",
                "identity snapshot installed"
            );
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                operation = "build_snapshot",
                "identity resync failed, previous snapshot retained"
            );
        }
    }
}

async fn flow_pass(source: Arc<ConntrackSource>, store: Arc<FlowStore>, node: String) {
    tracing::debug!(operation = "collect_flows", "updating conntrack entries");
    match source.collect().await {
        Ok(tuples) => {
            if tuples.is_empty() {
                // "no traffic" must stay distinguishable from "decoder broken"
                tracing::warn!(operation = "collect_flows", "conntrack returned zero entries");
            }
            let raw = tuples.len();
            let counts = aggregate(&node, tuples);
            tracing::debug!(
                raw,
                flows = counts.len(),
                operation = "collect_flows",
                "flow counts updated"
            );
            store.replace(counts);
        }
        Err(e) if e.is_configuration() => {
            tracing::error!(
                error = %e,
                operation = "collect_flows",
                "conntrack source misconfigured, previous flow counts retained"
            );
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                operation = "collect_flows",
                "conntrack update failed, previous flow counts retained"
            );
        }
    }
}
