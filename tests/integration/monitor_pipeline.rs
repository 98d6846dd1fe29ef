//! End-to-end tests of probe → health store → alert against real HTTP servers
//!
//! These tests verify that:
//! - Down alerts fire exactly at the configured threshold
//! - Recovery alerts fire once the endpoint answers 2xx again
//! - Metric instruments follow every probe
//! - A spawned monitor runs cycles on its own until shut down

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use sitewatch::{AlertManager, HttpProbe, Monitor, MonitorConfig, PrometheusMetrics};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

async fn mount_status(server: &MockServer, status: u16) {
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_down_alert_at_threshold() {
    let mock_server = MockServer::start().await;
    mount_status(&mock_server, 500).await;

    let url = format!("{}/health", mock_server.uri());
    let notifier = RecordingNotifier::new();
    let sink = Arc::new(RecordingSink::default());
    let monitor = create_http_monitor(&[url.clone()], 3, notifier.clone(), sink.clone());

    monitor.run_cycle().await;
    monitor.run_cycle().await;
    assert_eq!(notifier.count(), 0, "no alert before the threshold");

    monitor.run_cycle().await;
    assert_eq!(
        notifier.sent(),
        vec![(
            format!("[🚨 DOWN] {url} (returned status 500)"),
            format!("{url}: returned status 500"),
        )]
    );

    // Still failing: no duplicate down alert
    monitor.run_cycle().await;
    assert_eq!(notifier.count(), 1);

    let record = monitor.health(&url).unwrap();
    assert_eq!(record.consecutive_failures, 4);
    assert!(record.alerting);
}

#[tokio::test]
async fn test_recovery_alert() {
    let mock_server = MockServer::start().await;
    mount_status(&mock_server, 503).await;

    let url = format!("{}/health", mock_server.uri());
    let notifier = RecordingNotifier::new();
    let sink = Arc::new(RecordingSink::default());
    let monitor = create_http_monitor(&[url.clone()], 1, notifier.clone(), sink.clone());

    monitor.run_cycle().await;
    assert_eq!(notifier.count(), 1);

    mount_status(&mock_server, 200).await;
    monitor.run_cycle().await;

    assert_eq!(
        notifier.subjects(),
        vec![
            format!("[🚨 DOWN] {url} (returned status 503)"),
            format!("[✅ UP] {url} is back online"),
        ]
    );

    let record = monitor.health(&url).unwrap();
    assert_eq!(record.consecutive_failures, 0);
    assert!(!record.alerting);

    // Healthy again without alerting: silent
    monitor.run_cycle().await;
    assert_eq!(notifier.count(), 2);
}

#[tokio::test]
async fn test_unreachable_endpoint_alert() {
    let url = "http://127.0.0.1:9/health".to_string();
    let notifier = RecordingNotifier::new();
    let sink = Arc::new(RecordingSink::default());
    let monitor = create_http_monitor(&[url.clone()], 1, notifier.clone(), sink.clone());

    monitor.run_cycle().await;

    let subjects = notifier.subjects();
    assert_eq!(subjects.len(), 1);
    assert!(
        subjects[0].starts_with(&format!("[🚨 DOWN] {url} (unreachable: ")),
        "unexpected subject: {}",
        subjects[0]
    );
    assert_eq!(sink.status(&url), Some(0));
    assert_eq!(sink.errors(&url), Some(1));
    assert_eq!(sink.offline(), 1);
}

#[tokio::test]
async fn test_metrics_follow_probes() {
    let healthy = MockServer::start().await;
    mount_status(&healthy, 200).await;
    let failing = MockServer::start().await;
    mount_status(&failing, 404).await;

    let healthy_url = format!("{}/health", healthy.uri());
    let failing_url = format!("{}/health", failing.uri());

    let metrics = Arc::new(PrometheusMetrics::new().unwrap());
    let monitor = Monitor::new(
        MonitorConfig {
            urls: vec![healthy_url.clone(), failing_url.clone()],
            check_interval: Duration::from_secs(60),
            alert_threshold: 1,
        },
        Arc::new(HttpProbe::new(Duration::from_secs(2)).unwrap()),
        metrics.clone(),
        AlertManager::disabled(),
    );

    monitor.run_cycle().await;
    monitor.run_cycle().await;

    let output = metrics.render().unwrap();
    assert!(output.contains("sites 2"));
    assert!(output.contains("offline_sites 1"));
    assert!(output.contains(&format!(r#"site_status{{url="{healthy_url}"}} 200"#)));
    assert!(output.contains(&format!(r#"site_status{{url="{failing_url}"}} 404"#)));
    assert!(output.contains(&format!(r#"error_sites{{url="{healthy_url}"}} 0"#)));
    assert!(output.contains(&format!(r#"error_sites{{url="{failing_url}"}} 2"#)));
}

#[tokio::test]
async fn test_spawned_monitor_runs_until_shutdown() {
    let mock_server = MockServer::start().await;
    mount_status(&mock_server, 500).await;

    let url = format!("{}/health", mock_server.uri());
    let notifier = RecordingNotifier::new();
    let monitor = Monitor::new(
        MonitorConfig {
            urls: vec![url.clone()],
            check_interval: Duration::from_millis(50),
            alert_threshold: 2,
        },
        Arc::new(HttpProbe::new(Duration::from_secs(2)).unwrap()),
        Arc::new(RecordingSink::default()),
        AlertManager::new(notifier.clone()),
    );
    let view = monitor.clone();

    let handle = monitor.spawn();
    let alerted = wait_for(Duration::from_secs(5), || notifier.count() == 1).await;
    assert!(alerted, "down alert should be sent after two cycles");

    mount_status(&mock_server, 200).await;
    let recovered = wait_for(Duration::from_secs(5), || notifier.count() == 2).await;
    assert!(recovered, "recovery alert should follow");

    handle.shutdown().await.unwrap();

    assert!(!view.health(&url).unwrap().alerting);
    assert!(!mock_server.received_requests().await.unwrap().is_empty());
}
