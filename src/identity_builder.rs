// Builds identity snapshots from cluster topology

use crate::cluster_repo::{ClusterError, ClusterRepo, NodeRecord, PodRecord, ServiceRecord};
use crate::models::{Identity, IdentityKind, IdentitySnapshot};
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use tracing::warn;

/// Cluster IP value marking a headless service. Headless services have no
/// stable IP to key on and are omitted from the snapshot.
const HEADLESS_CLUSTER_IP: &str = "None";

/// One full build pass: list the three resource kinds and map them into a
/// fresh snapshot. Any listing failure aborts the pass so the previously
/// installed snapshot stays untouched.
pub async fn build(repo: &ClusterRepo) -> Result<IdentitySnapshot, ClusterError> {
    let pods = repo.pods().await?;
    let services = repo.services().await?;
    let nodes = repo.nodes().await?;
    Ok(build_snapshot(pods, services, nodes))
}

/// Pure snapshot construction from plain topology records.
///
/// Pods without an assigned IP (pending, host-network edge cases) and
/// headless services are skipped. Each node contributes its own address and,
/// when it publishes a pod CIDR, two synthetic identities: the CIDR network
/// address and the conventional gateway at network + 1, so flows terminating
/// at a node's virtual network resolve to the owning node instead of an
/// unidentified IP.
pub fn build_snapshot(
    pods: Vec<PodRecord>,
    services: Vec<ServiceRecord>,
    nodes: Vec<NodeRecord>,
) -> IdentitySnapshot {
    let mut snapshot = IdentitySnapshot::new();

    for pod in pods {
        if pod.pod_ip.is_empty() {
            continue;
        }
        snapshot.insert(
            pod.pod_ip,
            Identity {
                kind: IdentityKind::Pod,
                namespace: pod.namespace,
                name: pod.name,
                app: pod.app,
                node_ip: pod.host_ip,
            },
        );
    }

    for service in services {
        if service.cluster_ip.is_empty() || service.cluster_ip == HEADLESS_CLUSTER_IP {
            continue;
        }
        snapshot.insert(
            service.cluster_ip,
            Identity {
                kind: IdentityKind::Service,
                namespace: service.namespace,
                name: service.name,
                app: service.app,
                node_ip: String::new(),
            },
        );
    }

    for node in nodes {
        if node.address.is_empty() {
            warn!(node = %node.name, "node reports no address, skipping");
            continue;
        }
        snapshot.insert(
            node.address.clone(),
            Identity {
                kind: IdentityKind::Node,
                namespace: String::new(),
                name: node.name.clone(),
                app: String::new(),
                node_ip: node.address.clone(),
            },
        );
        if !node.pod_cidr.is_empty() {
            insert_cidr_identities(&mut snapshot, &node);
        }
    }

    snapshot
}

/// Derive the network and gateway identities for a node's pod CIDR. A CIDR
/// that does not parse logs a warning and contributes nothing; the rest of
/// the build is unaffected.
fn insert_cidr_identities(snapshot: &mut IdentitySnapshot, node: &NodeRecord) {
    let net: Ipv4Net = match node.pod_cidr.parse() {
        Ok(net) => net,
        Err(e) => {
            warn!(node = %node.name, cidr = %node.pod_cidr, error = %e, "unparsable pod CIDR");
            return;
        }
    };
    let network = net.network();
    let gateway = Ipv4Addr::from(u32::from(network).wrapping_add(1));
    for (ip, kind) in [(network, IdentityKind::Network), (gateway, IdentityKind::Gateway)] {
        snapshot.insert(
            ip.to_string(),
            Identity {
                kind,
                namespace: String::new(),
                name: node.name.clone(),
                app: String::new(),
                node_ip: node.address.clone(),
            },
        );
    }
}
