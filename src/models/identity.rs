// Endpoint identity and snapshot models

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What kind of cluster endpoint an IP resolves to. `Unknown` is the zero
/// value used for unresolved lookups and serializes as the empty string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentityKind {
    #[default]
    #[serde(rename = "")]
    Unknown,
    #[serde(rename = "pod")]
    Pod,
    #[serde(rename = "service")]
    Service,
    #[serde(rename = "node")]
    Node,
    #[serde(rename = "network")]
    Network,
    #[serde(rename = "gateway")]
    Gateway,
}

impl IdentityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityKind::Unknown => "",
            IdentityKind::Pod => "pod",
            IdentityKind::Service => "service",
            IdentityKind::Node => "node",
            IdentityKind::Network => "network",
            IdentityKind::Gateway => "gateway",
        }
    }
}

/// Resolved metadata for one endpoint IP. Fields not applicable to the kind
/// stay empty; the default value (all fields empty) is what lookups return
/// for addresses absent from the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "type", default)]
    pub kind: IdentityKind,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub app: String,
    #[serde(rename = "nodeIP", default)]
    pub node_ip: String,
}

/// One generation of the IP -> identity mapping. Built wholesale, installed
/// by atomic replacement, never mutated in place.
pub type IdentitySnapshot = HashMap<String, Identity>;
