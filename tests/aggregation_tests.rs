// Aggregation tests: key grouping, counting, source-port exclusion

use khan::aggregation::aggregate;
use khan::models::{FlowTuple, Transport};

fn flow(src_ip: &str, src_port: u16, dst_ip: &str, dst_port: u16, state: &str) -> FlowTuple {
    FlowTuple {
        src_ip: src_ip.to_string(),
        dst_ip: dst_ip.to_string(),
        src_port: Some(src_port),
        dst_port: Some(dst_port),
        transport: Transport::Tcp,
        state: state.to_string(),
    }
}

#[test]
fn one_count_per_distinct_key_and_counts_sum_to_input_len() {
    let tuples = vec![
        flow("10.0.0.1", 5000, "10.0.0.2", 80, "ESTABLISHED"),
        flow("10.0.0.1", 5001, "10.0.0.2", 80, "ESTABLISHED"),
        flow("10.0.0.1", 5002, "10.0.0.2", 443, "ESTABLISHED"),
        flow("10.0.0.3", 5000, "10.0.0.2", 80, "ESTABLISHED"),
    ];
    let total = tuples.len() as u64;
    let counts = aggregate("node-1", tuples);

    assert_eq!(counts.len(), 3);
    assert_eq!(counts.iter().map(|c| c.count).sum::<u64>(), total);
}

#[test]
fn source_port_is_excluded_from_the_key() {
    let tuples = vec![
        flow("10.0.0.1", 5000, "10.0.0.2", 80, "ESTABLISHED"),
        flow("10.0.0.1", 5001, "10.0.0.2", 80, "ESTABLISHED"),
        flow("10.0.0.1", 5002, "10.0.0.2", 80, "ESTABLISHED"),
    ];
    let counts = aggregate("node-1", tuples);
    assert_eq!(counts.len(), 1);
    assert_eq!(counts[0].count, 3);
}

#[test]
fn state_differences_split_buckets() {
    let tuples = vec![
        flow("10.0.0.1", 5000, "10.0.0.2", 80, "ESTABLISHED"),
        flow("10.0.0.1", 5001, "10.0.0.2", 80, "TIME_WAIT"),
    ];
    let counts = aggregate("node-1", tuples);
    assert_eq!(counts.len(), 2);
}

#[test]
fn first_member_seeds_the_representative_tuple() {
    let tuples = vec![
        flow("10.0.0.1", 5000, "10.0.0.2", 80, "ESTABLISHED"),
        flow("10.0.0.1", 5999, "10.0.0.2", 80, "ESTABLISHED"),
    ];
    let counts = aggregate("node-1", tuples);
    assert_eq!(counts[0].tuple.src_port, Some(5000));
    assert_eq!(counts[0].node, "node-1");
}

#[test]
fn output_order_is_deterministic_regardless_of_input_order() {
    let forward = vec![
        flow("10.0.0.1", 5000, "10.0.0.2", 80, "ESTABLISHED"),
        flow("10.0.0.9", 5000, "10.0.0.2", 80, "ESTABLISHED"),
        flow("10.0.0.5", 5000, "10.0.0.2", 443, "ESTABLISHED"),
    ];
    let mut reversed = forward.clone();
    reversed.reverse();

    let keys_forward: Vec<_> = aggregate("node-1", forward)
        .into_iter()
        .map(|c| c.tuple.key())
        .collect();
    let keys_reversed: Vec<_> = aggregate("node-1", reversed)
        .into_iter()
        .map(|c| c.tuple.key())
        .collect();
    assert_eq!(keys_forward, keys_reversed);
}

#[test]
fn empty_input_aggregates_to_empty_output() {
    assert!(aggregate("node-1", Vec::new()).is_empty());
}
