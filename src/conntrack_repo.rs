// Conntrack decode: kernel entry dumps and script-produced JSON

use crate::models::{FlowTuple, Transport};
use serde::Deserialize;
use std::net::IpAddr;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;
use tracing::warn;

pub const TCP_PROTO: u8 = 6;
pub const UDP_PROTO: u8 = 17;

/// Kernel TCP conntrack states, indexed by the numeric state carried in the
/// entry's protocol info.
pub const TCP_STATES: [&str; 11] = [
    "ESTABLISHED",
    "SYN_SENT",
    "SYN_RECV",
    "FIN_WAIT1",
    "FIN_WAIT2",
    "TIME_WAIT",
    "CLOSE",
    "CLOSE_WAIT",
    "LAST_ACK",
    "LISTEN",
    "CLOSING",
];

/// IPS_ASSURED bit in the conntrack status word: the flow has seen traffic
/// in both directions.
const ASSURED_BIT: u32 = 2;

pub fn udp_state(status: u32) -> &'static str {
    if status & (1 << ASSURED_BIT) != 0 {
        "ASSURED"
    } else {
        "UNREPLIED"
    }
}

#[derive(Debug, Error)]
pub enum ConntrackError {
    /// The configured script is absent. A deployment problem, not a
    /// transient fault.
    #[error("conntrack script {0} does not exist")]
    MissingScript(String),
    #[error("running conntrack script: {0}")]
    Script(#[source] std::io::Error),
    #[error("conntrack script exited with status {status}: {stderr}")]
    ScriptFailed { status: i32, stderr: String },
    #[error("parsing conntrack script output: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("dumping conntrack entries: {0}")]
    Dump(#[source] anyhow::Error),
}

impl ConntrackError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, ConntrackError::MissingScript(_))
    }
}

/// Addressing half of a conntrack entry (one direction).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTuple {
    pub src: IpAddr,
    pub dst: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
}

/// One structured kernel conntrack entry: origin/reply tuples, protocol
/// number, protocol-specific TCP state, and the status bitmask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelEntry {
    pub origin: EndpointTuple,
    pub reply: EndpointTuple,
    pub proto: u8,
    pub tcp_state: Option<u8>,
    pub status: u32,
}

/// Acquisition boundary for the kernel source: a netlink conntrack dump in
/// production, a fixture in tests.
pub trait EntryDump: Send + Sync {
    fn dump(&self) -> anyhow::Result<Vec<KernelEntry>>;
}

/// Decode structured kernel entries into canonical tuples.
///
/// Protocols other than TCP/UDP do not populate the expected port and state
/// layout and are dropped outright. A TCP state index outside the state
/// table is a decode error for that record only: skip and continue.
pub fn decode_kernel_entries(entries: Vec<KernelEntry>) -> Vec<FlowTuple> {
    let mut tuples = Vec::with_capacity(entries.len());
    for entry in entries {
        let transport = match entry.proto {
            TCP_PROTO => Transport::Tcp,
            UDP_PROTO => Transport::Udp,
            _ => continue,
        };
        let state = match transport {
            Transport::Tcp => match entry.tcp_state {
                Some(index) => match TCP_STATES.get(index as usize) {
                    Some(state) => (*state).to_string(),
                    None => {
                        warn!(index, "TCP state index out of range, skipping entry");
                        continue;
                    }
                },
                // Entries without protocol info carry no state.
                None => String::new(),
            },
            Transport::Udp => udp_state(entry.status).to_string(),
        };
        tuples.push(FlowTuple {
            src_ip: entry.origin.src.to_string(),
            dst_ip: entry.origin.dst.to_string(),
            src_port: Some(entry.origin.src_port),
            dst_port: Some(entry.origin.dst_port),
            transport,
            state,
        });
    }
    tuples
}

/// One record of the helper script's JSON array. Only the request direction
/// carries addressing; reply-direction fields in the script output are not
/// consumed. Ports arrive as strings and may be empty.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ScriptRecord {
    #[serde(default)]
    pub req_src_ip: String,
    #[serde(default)]
    pub req_dst_ip: String,
    #[serde(default)]
    pub req_sport: String,
    #[serde(default)]
    pub req_dport: String,
    #[serde(default)]
    pub transport: String,
    #[serde(default)]
    pub state: String,
}

impl ScriptRecord {
    /// The script terminates its array with one empty record.
    fn is_sentinel(&self) -> bool {
        self.req_src_ip.is_empty() && self.req_dst_ip.is_empty()
    }
}

/// Decode script records into canonical tuples. The trailing sentinel is
/// discarded when present; records with an unknown transport are skipped.
pub fn decode_script_records(mut records: Vec<ScriptRecord>) -> Vec<FlowTuple> {
    if records.last().is_some_and(ScriptRecord::is_sentinel) {
        records.pop();
    }
    let mut tuples = Vec::with_capacity(records.len());
    for record in records {
        let transport = match record.transport.trim() {
            "tcp" => Transport::Tcp,
            "udp" => Transport::Udp,
            other => {
                warn!(transport = other, "unsupported transport in conntrack record, skipping");
                continue;
            }
        };
        tuples.push(FlowTuple {
            src_ip: record.req_src_ip.trim().to_string(),
            dst_ip: record.req_dst_ip.trim().to_string(),
            src_port: parse_port(&record.req_sport),
            dst_port: parse_port(&record.req_dport),
            transport,
            state: record.state.trim().to_string(),
        });
    }
    tuples
}

fn parse_port(raw: &str) -> Option<u16> {
    raw.trim().parse().ok()
}

/// External helper process emitting the JSON flow array.
pub struct ScriptSource {
    path: String,
}

impl ScriptSource {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub async fn dump(&self) -> Result<Vec<ScriptRecord>, ConntrackError> {
        if !Path::new(&self.path).exists() {
            return Err(ConntrackError::MissingScript(self.path.clone()));
        }
        let output = Command::new("/bin/sh")
            .arg("-c")
            .arg(&self.path)
            .output()
            .await
            .map_err(ConntrackError::Script)?;
        if !output.status.success() {
            return Err(ConntrackError::ScriptFailed {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

/// The two interchangeable raw sources behind one decode surface.
pub enum ConntrackSource {
    Kernel(Box<dyn EntryDump>),
    Script(ScriptSource),
}

impl ConntrackSource {
    /// One sampling pass: acquire a raw batch and decode it. A zero-length
    /// `Ok` is valid ("no traffic") and distinct from any error ("decoder
    /// broken"); callers log the two differently.
    pub async fn collect(&self) -> Result<Vec<FlowTuple>, ConntrackError> {
        match self {
            ConntrackSource::Kernel(dump) => {
                let entries = dump.dump().map_err(ConntrackError::Dump)?;
                Ok(decode_kernel_entries(entries))
            }
            ConntrackSource::Script(source) => {
                let records = source.dump().await?;
                Ok(decode_script_records(records))
            }
        }
    }
}
