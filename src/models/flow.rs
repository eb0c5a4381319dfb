// Flow tuple, aggregation key, and flow count models

/// Transport protocol of a tracked connection. Anything other than TCP/UDP
/// is dropped during decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Transport {
    Tcp,
    Udp,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Tcp => "tcp",
            Transport::Udp => "udp",
        }
    }
}

/// One observed connection direction. Ports are optional: script-produced
/// records may omit them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowTuple {
    pub src_ip: String,
    pub dst_ip: String,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
    pub transport: Transport,
    pub state: String,
}

impl FlowTuple {
    /// The aggregation key: source port excluded, so the same logical flow
    /// over many ephemeral ports collapses into one bucket.
    pub fn key(&self) -> FlowKey {
        FlowKey {
            src_ip: self.src_ip.clone(),
            dst_ip: self.dst_ip.clone(),
            dst_port: self.dst_port,
            transport: self.transport,
            state: self.state.clone(),
        }
    }
}

/// Composite grouping key; equality and hashing cover exactly these fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowKey {
    pub src_ip: String,
    pub dst_ip: String,
    pub dst_port: Option<u16>,
    pub transport: Transport,
    pub state: String,
}

/// One aggregation bucket: the representative tuple (seeded from the first
/// group member), how many raw records shared its key this pass, and the
/// observing node. Rebuilt fresh every sampling pass; a point-in-time gauge,
/// not a cumulative counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowCount {
    pub node: String,
    pub tuple: FlowTuple,
    pub count: u64,
}
