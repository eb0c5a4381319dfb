use anyhow::Result;
use khan::*;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;

    let identity_store = Arc::new(identity_store::IdentityStore::new());
    let flow_store = Arc::new(flow_store::FlowStore::new());

    let mut shutdown_txs: Vec<oneshot::Sender<()>> = Vec::new();
    let mut worker_handles = Vec::new();

    match app_config.identity.mode {
        config::IdentityMode::Cluster => {
            let cluster_repo = Arc::new(cluster_repo::ClusterRepo::connect().await?);
            let (shutdown_tx, shutdown_rx) = oneshot::channel();
            shutdown_txs.push(shutdown_tx);
            worker_handles.push(worker::spawn_identity_worker(
                worker::IdentityWorkerDeps {
                    cluster_repo,
                    identity_store: identity_store.clone(),
                    shutdown_rx,
                },
                std::time::Duration::from_secs(app_config.identity.resync_interval_secs),
            ));
        }
        config::IdentityMode::Push => {
            tracing::info!("identity builder disabled, cache is seeded via POST /cache");
        }
    }

    let source = Arc::new(conntrack_repo::ConntrackSource::Script(
        conntrack_repo::ScriptSource::new(app_config.conntrack.script_path.clone()),
    ));
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    shutdown_txs.push(shutdown_tx);
    worker_handles.push(worker::spawn_flow_worker(
        worker::FlowWorkerDeps {
            source,
            flow_store: flow_store.clone(),
            node_name: app_config.node.name.clone(),
            shutdown_rx,
        },
        std::time::Duration::from_secs(app_config.conntrack.resync_interval_secs),
    ));

    let app = routes::app(identity_store, flow_store);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
            for tx in shutdown_txs {
                let _ = tx.send(());
            }
            futures_util::future::join_all(worker_handles).await;
        }
    }

    Ok(())
}
