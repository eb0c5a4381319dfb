// Flow worker integration test: spawn, tick against a real script, shutdown

use khan::conntrack_repo::{ConntrackSource, ScriptSource};
use khan::flow_store::FlowStore;
use khan::worker::{FlowWorkerDeps, spawn_flow_worker};
use std::io::Write as _;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use tokio::time::Duration;

fn write_script(dir: &tempfile::TempDir, body: &str) -> String {
    let path = dir.path().join("conntrack.sh");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "#!/bin/sh").unwrap();
    writeln!(file, "{body}").unwrap();
    let mut perms = file.metadata().unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path.to_str().unwrap().to_string()
}

const SCRIPT_OUTPUT: &str = r#"[
  {"req_src_ip":"10.0.0.1","req_dst_ip":"10.0.0.2","req_sport":"5000","req_dport":"80","transport":"tcp","state":"ESTABLISHED"},
  {"req_src_ip":"10.0.0.1","req_dst_ip":"10.0.0.2","req_sport":"5001","req_dport":"80","transport":"tcp","state":"ESTABLISHED"},
  {}
]"#;

#[tokio::test]
async fn flow_worker_ticks_aggregates_and_shuts_down() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_script(&dir, &format!("cat <<'EOF'\n{SCRIPT_OUTPUT}\nEOF"));

    let flow_store = Arc::new(FlowStore::new());
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = spawn_flow_worker(
        FlowWorkerDeps {
            source: Arc::new(ConntrackSource::Script(ScriptSource::new(path))),
            flow_store: flow_store.clone(),
            node_name: "node-1".to_string(),
            shutdown_rx,
        },
        Duration::from_millis(25),
    );

    // Wait for at least one pass to land
    let mut counts = flow_store.current();
    for _ in 0..100 {
        if !counts.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        counts = flow_store.current();
    }

    assert_eq!(counts.len(), 1, "two identical-key records, one bucket");
    assert_eq!(counts[0].count, 2);
    assert_eq!(counts[0].node, "node-1");
    assert_eq!(counts[0].tuple.dst_port, Some(80));

    let _ = shutdown_tx.send(());
    handle.await.unwrap();
}

#[tokio::test]
async fn flow_worker_survives_missing_script_and_keeps_previous_set() {
    let flow_store = Arc::new(FlowStore::new());
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = spawn_flow_worker(
        FlowWorkerDeps {
            source: Arc::new(ConntrackSource::Script(ScriptSource::new(
                "/nonexistent/conntrack.sh",
            ))),
            flow_store: flow_store.clone(),
            node_name: "node-1".to_string(),
            shutdown_rx,
        },
        Duration::from_millis(25),
    );

    tokio::time::sleep(Duration::from_millis(120)).await;
    // Failed passes retain the previous (empty) result set and the worker
    // keeps ticking rather than dying.
    assert!(flow_store.current().is_empty());
    assert!(!handle.is_finished());

    let _ = shutdown_tx.send(());
    handle.await.unwrap();
}

#[tokio::test]
async fn flow_worker_replaces_result_set_wholesale() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_script(&dir, &format!("cat <<'EOF'\n{SCRIPT_OUTPUT}\nEOF"));

    let flow_store = Arc::new(FlowStore::new());
    // Stale counts from an earlier pass
    flow_store.replace(vec![khan::models::FlowCount {
        node: "node-1".to_string(),
        tuple: khan::models::FlowTuple {
            src_ip: "192.168.0.1".to_string(),
            dst_ip: "192.168.0.2".to_string(),
            src_port: Some(1),
            dst_port: Some(2),
            transport: khan::models::Transport::Udp,
            state: "UNREPLIED".to_string(),
        },
        count: 99,
    }]);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = spawn_flow_worker(
        FlowWorkerDeps {
            source: Arc::new(ConntrackSource::Script(ScriptSource::new(path))),
            flow_store: flow_store.clone(),
            node_name: "node-1".to_string(),
            shutdown_rx,
        },
        Duration::from_millis(25),
    );

    let mut counts = flow_store.current();
    for _ in 0..100 {
        if counts.len() == 1 && counts[0].count == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        counts = flow_store.current();
    }

    // The stale flow is gone, not merged or decayed
    assert_eq!(counts.len(), 1);
    assert_eq!(counts[0].tuple.src_ip, "10.0.0.1");

    let _ = shutdown_tx.send(());
    handle.await.unwrap();
}
