// Cluster topology via the Kubernetes API

use k8s_openapi::api::core::v1::{Node, Pod, Service};
use kube::Client;
use kube::api::{Api, ListParams};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// How long to wait between readiness probes before the first build.
const READY_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// A failed listing, per resource kind. Any one of these fails the whole
/// build; a partial snapshot is never installed.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("listing pods: {0}")]
    Pods(#[source] kube::Error),
    #[error("listing services: {0}")]
    Services(#[source] kube::Error),
    #[error("listing nodes: {0}")]
    Nodes(#[source] kube::Error),
}

/// Pod addressing and labels, reduced to what identity resolution needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodRecord {
    pub namespace: String,
    pub name: String,
    pub app: String,
    pub pod_ip: String,
    pub host_ip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceRecord {
    pub namespace: String,
    pub name: String,
    pub app: String,
    pub cluster_ip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeRecord {
    pub name: String,
    /// First address the node reports; empty when the node publishes none.
    pub address: String,
    pub pod_cidr: String,
}

/// Read-only repository over the three resource kinds the identity builder
/// consumes. Maps API objects down to plain records so snapshot construction
/// stays a pure function.
pub struct ClusterRepo {
    client: Client,
}

impl ClusterRepo {
    /// Connect using the ambient configuration (in-cluster service account
    /// or local kubeconfig). An unreachable API server here is fatal.
    pub async fn connect() -> anyhow::Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self { client })
    }

    /// One-time readiness gate: block until the API server answers a cheap
    /// list. Checked once before the first build, never re-checked.
    pub async fn wait_ready(&self) {
        let api: Api<Node> = Api::all(self.client.clone());
        let params = ListParams::default().limit(1);
        loop {
            match api.list(&params).await {
                Ok(_) => return,
                Err(e) => {
                    warn!(error = %e, "cluster state not ready, retrying");
                    tokio::time::sleep(READY_RETRY_INTERVAL).await;
                }
            }
        }
    }

    pub async fn pods(&self) -> Result<Vec<PodRecord>, ClusterError> {
        let api: Api<Pod> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(ClusterError::Pods)?;
        Ok(list
            .items
            .into_iter()
            .map(|pod| {
                let status = pod.status.unwrap_or_default();
                PodRecord {
                    namespace: pod.metadata.namespace.unwrap_or_default(),
                    name: pod.metadata.name.unwrap_or_default(),
                    app: app_label(pod.metadata.labels.as_ref()),
                    pod_ip: status.pod_ip.unwrap_or_default(),
                    host_ip: status.host_ip.unwrap_or_default(),
                }
            })
            .collect())
    }

    pub async fn services(&self) -> Result<Vec<ServiceRecord>, ClusterError> {
        let api: Api<Service> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(ClusterError::Services)?;
        Ok(list
            .items
            .into_iter()
            .map(|service| {
                let cluster_ip = service
                    .spec
                    .and_then(|spec| spec.cluster_ip)
                    .unwrap_or_default();
                ServiceRecord {
                    namespace: service.metadata.namespace.unwrap_or_default(),
                    name: service.metadata.name.unwrap_or_default(),
                    app: app_label(service.metadata.labels.as_ref()),
                    cluster_ip,
                }
            })
            .collect())
    }

    pub async fn nodes(&self) -> Result<Vec<NodeRecord>, ClusterError> {
        let api: Api<Node> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(ClusterError::Nodes)?;
        Ok(list
            .items
            .into_iter()
            .map(|node| {
                let address = node
                    .status
                    .and_then(|status| status.addresses)
                    .and_then(|addresses| addresses.into_iter().next())
                    .map(|a| a.address)
                    .unwrap_or_default();
                let pod_cidr = node
                    .spec
                    .and_then(|spec| spec.pod_cidr)
                    .unwrap_or_default();
                NodeRecord {
                    name: node.metadata.name.unwrap_or_default(),
                    address,
                    pod_cidr,
                }
            })
            .collect())
    }
}

fn app_label(labels: Option<&std::collections::BTreeMap<String, String>>) -> String {
    labels
        .and_then(|l| l.get("app"))
        .cloned()
        .unwrap_or_default()
}
