// Workload Integration Tests
//
// Drives the worker pool end-to-end over mock connections: bootstrap,
// threaded random runs with tallies, 1-based worker access, and reconnects.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::MockSql;
use parking_lot::Mutex;
use tempfile::TempDir;

use sqlstorm::config::WorkloadParams;
use sqlstorm::sql::{ServerParams, SqlClient};
use sqlstorm::workload::{Node, SqlFactory};

struct MockCounters {
    statements: Arc<AtomicUsize>,
    reconnects: Arc<Mutex<usize>>,
}

fn mock_node(dir: &TempDir) -> (Node, MockCounters) {
    let statements = Arc::new(AtomicUsize::new(0));
    let reconnects = Arc::new(Mutex::new(0));

    let counters = MockCounters {
        statements: statements.clone(),
        reconnects: reconnects.clone(),
    };

    let factory = SqlFactory::with_connector(
        ServerParams::default(),
        dir.path(),
        Box::new(move |_params| {
            Ok(Box::new(
                MockSql::counting(statements.clone()).with_shared_reconnects(reconnects.clone()),
            ) as Box<dyn SqlClient>)
        }),
    );

    (Node::new(factory), counters)
}

#[test]
fn bootstrap_worker_seeds_the_catalog() {
    let dir = TempDir::new().unwrap();
    let (node, counters) = mock_node(&dir);

    let mut init = node.make_worker("init").unwrap();
    init.create_random_tables(3).unwrap();

    let meta = node.metadata();
    assert_eq!(meta.size(), 3);
    assert_eq!(counters.statements.load(Ordering::Relaxed), 3);

    init.generate_initial_data().unwrap();
    // Ten insert batches per published table.
    assert_eq!(counters.statements.load(Ordering::Relaxed), 3 + 3 * 10);
}

#[test]
fn random_workload_runs_and_tallies_actions() {
    let dir = TempDir::new().unwrap();
    let (node, counters) = mock_node(&dir);

    node.make_worker("init")
        .unwrap()
        .create_random_tables(3)
        .unwrap();

    let mut workload = node
        .init_random_workload(WorkloadParams {
            duration_in_seconds: 1,
            repeat_times: 1,
            number_of_workers: 2,
        })
        .unwrap();

    assert_eq!(workload.worker_count(), 2);

    workload.run();
    workload.wait_completion();

    let mut successful = 0;
    let mut failed = 0;
    for idx in 1..=workload.worker_count() {
        let stats = workload.worker(idx).unwrap().stats();
        successful += stats.successful;
        failed += stats.failed;
    }

    assert!(successful > 0, "workers never executed an action");
    assert_eq!(failed, 0, "mock connections never fail");
    assert!(counters.statements.load(Ordering::Relaxed) > 0);

    // Every worker and connection got its own sink.
    assert!(dir.path().join("sql-conn-init.log").exists());
    assert!(dir.path().join("sql-conn-1.log").exists());
    assert!(dir.path().join("sql-conn-2.log").exists());
    assert!(dir.path().join("worker-1.log").exists());
    assert!(dir.path().join("worker-2.log").exists());
}

#[test]
fn worker_access_is_one_based() {
    let dir = TempDir::new().unwrap();
    let (node, _counters) = mock_node(&dir);

    let mut workload = node
        .init_random_workload(WorkloadParams {
            duration_in_seconds: 1,
            repeat_times: 1,
            number_of_workers: 2,
        })
        .unwrap();

    assert!(workload.worker(0).is_err());
    assert!(workload.worker(1).is_ok());
    assert!(workload.worker(2).is_ok());
    assert!(workload.worker(3).is_err());
}

#[test]
fn reconnect_workers_reaches_every_connection() {
    let dir = TempDir::new().unwrap();
    let (node, counters) = mock_node(&dir);

    let mut workload = node
        .init_random_workload(WorkloadParams {
            duration_in_seconds: 1,
            repeat_times: 1,
            number_of_workers: 3,
        })
        .unwrap();

    workload.reconnect_workers().unwrap();
    assert_eq!(*counters.reconnects.lock(), 3);
}

#[test]
fn zero_repeats_build_an_empty_workload() {
    let dir = TempDir::new().unwrap();
    let (node, _counters) = mock_node(&dir);

    let workload = node
        .init_random_workload(WorkloadParams {
            duration_in_seconds: 1,
            repeat_times: 0,
            number_of_workers: 4,
        })
        .unwrap();

    assert_eq!(workload.worker_count(), 0);
    assert_eq!(workload.repeat_times(), 0);
}

#[test]
fn workload_can_run_multiple_rounds() {
    let dir = TempDir::new().unwrap();
    let (node, _counters) = mock_node(&dir);

    node.make_worker("init")
        .unwrap()
        .create_random_tables(3)
        .unwrap();

    let mut workload = node
        .init_random_workload(WorkloadParams {
            duration_in_seconds: 1,
            repeat_times: 2,
            number_of_workers: 1,
        })
        .unwrap();

    for _ in 0..workload.repeat_times() {
        workload.run();
        workload.wait_completion();
        assert!(workload.worker(1).unwrap().stats().successful > 0);
    }
}
