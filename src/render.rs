// Text exposition of the current flow counts

use crate::models::{FlowCount, Identity, IdentitySnapshot};
use std::fmt::Write as _;

/// Serialize the flow set, resolving both endpoints of every flow against
/// `snapshot`. One line per flow; the field order and label names are the
/// wire contract and never vary. Unresolved identities render as empty
/// strings, never as omitted fields, so the line shape is constant.
///
/// Identity resolution happens here, not at aggregation time: callers pass
/// the snapshot current at render so counts aggregated slightly earlier
/// still get the freshest labels.
pub fn render(flows: &[FlowCount], snapshot: &IdentitySnapshot) -> String {
    let unresolved = Identity::default();
    let mut out = String::with_capacity(flows.len() * 192);
    for flow in flows {
        let src = snapshot.get(&flow.tuple.src_ip).unwrap_or(&unresolved);
        let dst = snapshot.get(&flow.tuple.dst_ip).unwrap_or(&unresolved);
        let dst_port = flow
            .tuple
            .dst_port
            .map(|p| p.to_string())
            .unwrap_or_default();
        // fmt::Write on String never fails.
        let _ = writeln!(
            out,
            "khan_connection{{node=\"{}\",src_type=\"{}\",src_ip=\"{}\",src_ns=\"{}\",src_app=\"{}\",src_name=\"{}\",dst_type=\"{}\",dst_ip=\"{}\",dst_ns=\"{}\",dst_app=\"{}\",dst_name=\"{}\",dst_port=\"{}\",transport=\"{}\",state=\"{}\"}} {}",
            flow.node,
            src.kind.as_str(),
            flow.tuple.src_ip,
            src.namespace,
            src.app,
            src.name,
            dst.kind.as_str(),
            flow.tuple.dst_ip,
            dst.namespace,
            dst.app,
            dst.name,
            dst_port,
            flow.tuple.transport.as_str(),
            flow.tuple.state,
            flow.count,
        );
    }
    out
}
