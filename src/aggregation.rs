// Flow aggregation: group raw tuples by key, count duplicates

use crate::models::{FlowCount, FlowKey, FlowTuple};
use std::collections::BTreeMap;

/// Collapse raw tuples into one count per distinct aggregation key. The
/// first tuple seen for a key seeds the representative; later members only
/// bump the count, so `sum(counts) == tuples.len()` always holds.
///
/// Output is ordered by key. The ordered map costs a log-factor per insert
/// and buys a deterministic exposition: identical traffic renders as an
/// identical response body.
pub fn aggregate(node: &str, tuples: Vec<FlowTuple>) -> Vec<FlowCount> {
    let mut groups: BTreeMap<FlowKey, FlowCount> = BTreeMap::new();
    for tuple in tuples {
        groups
            .entry(tuple.key())
            .and_modify(|flow| flow.count += 1)
            .or_insert_with(|| FlowCount {
                node: node.to_string(),
                tuple,
                count: 1,
            });
    }
    groups.into_values().collect()
}
