//! Concurrency tests for the monitoring loop
//!
//! These tests verify that:
//! - Endpoints within a cycle are probed in parallel
//! - Concurrent cycles produce the same records as a sequential replay
//! - The health store tolerates writers from many threads

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use sitewatch::{AlertManager, HealthRecord, HealthStore, Monitor, Outcome, Transition};

use crate::helpers::*;

fn urls(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("https://site-{i}.example")).collect()
}

#[tokio::test(start_paused = true)]
async fn test_cycle_probes_endpoints_in_parallel() {
    let urls = urls(10);
    let probe = ScriptedProbe::with_delay(HashMap::new(), Duration::from_secs(1));
    let monitor = Monitor::new(
        monitor_config(&urls, 1),
        probe,
        Arc::new(RecordingSink::default()),
        AlertManager::disabled(),
    );

    let start = tokio::time::Instant::now();
    monitor.run_cycle().await;

    assert!(start.elapsed() < Duration::from_secs(2));
    for url in &urls {
        assert!(monitor.health(url).is_some(), "{url} was not probed");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cycles_match_sequential_replay() {
    let urls = urls(8);
    let script: Vec<Outcome> = vec![
        down(500),
        down(502),
        up(),
        down(503),
        down(500),
        down(500),
        up(),
    ];

    let scripts: HashMap<String, Vec<Outcome>> = urls
        .iter()
        .map(|url| (url.clone(), script.clone()))
        .collect();
    let notifier = RecordingNotifier::new();
    let monitor = Monitor::new(
        monitor_config(&urls, 2),
        ScriptedProbe::new(scripts),
        Arc::new(RecordingSink::default()),
        AlertManager::new(notifier.clone()),
    );

    for _ in 0..script.len() {
        monitor.run_cycle().await;
    }

    let mut expected = HealthRecord::default();
    let mut expected_alerts = 0;
    for outcome in &script {
        if expected.apply(outcome, 2) != Transition::None {
            expected_alerts += 1;
        }
    }

    for url in &urls {
        assert_eq!(monitor.health(url), Some(expected));
    }
    assert_eq!(notifier.count(), expected_alerts * urls.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_store_handles_concurrent_writers() {
    let store = Arc::new(HealthStore::new(3));
    let urls = urls(4);

    let mut tasks = tokio::task::JoinSet::new();
    for url in urls.clone() {
        for _ in 0..25 {
            let store = store.clone();
            let url = url.clone();
            tasks.spawn(async move { store.record_outcome(&url, &down(500)) });
        }
    }

    let mut transitions = Vec::new();
    while let Some(result) = tasks.join_next().await {
        transitions.push(result.unwrap());
    }

    for url in &urls {
        let record = store.get(url).unwrap();
        assert_eq!(record.consecutive_failures, 25);
        assert!(record.alerting);
    }

    let downs = transitions
        .iter()
        .filter(|t| matches!(t, Transition::BecameDown(_)))
        .count();
    assert_eq!(downs, urls.len(), "exactly one down transition per endpoint");
}
