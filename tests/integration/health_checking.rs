//! Health checking against real sockets and scripted probers

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use guardia_collector::Target;
use guardia_collector::actors::health_checker::HealthCheckerHandle;
use guardia_collector::monitors::health::HealthEvent;
use guardia_collector::monitors::probe::{NetworkProber, ProbeError, ProbeLayer, Prober};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::{ScriptedProber, closed_address, garbage_responder};

const NO_TICKS: Duration = Duration::from_secs(3600);

#[tokio::test]
async fn test_layered_probes_over_the_network() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let targets = vec![
        Target::new("web", mock_server.address().to_string(), ""),
        Target::new("gone", closed_address().await, ""),
        Target::new("ssh", garbage_responder().await, ""),
    ];

    let cancel = CancellationToken::new();
    let prober = Arc::new(NetworkProber::new(Duration::from_millis(500)).unwrap());
    let handle = HealthCheckerHandle::spawn(targets, prober, NO_TICKS, false, &cancel);

    // the initial cycle has already seen every target once
    let notices = handle.check_now().await.unwrap();
    assert_eq!(notices.len(), 3);

    assert_eq!(notices[0].target.name, "web");
    assert_eq!(notices[0].event, HealthEvent::Ok);
    assert_eq!(notices[0].status_code, Some(200));

    assert_eq!(notices[1].event, HealthEvent::Down);
    assert_eq!(notices[1].failed_layer(), Some(ProbeLayer::Transport));

    assert_eq!(notices[2].event, HealthEvent::Down);
    assert_eq!(notices[2].failed_layer(), Some(ProbeLayer::Application));
    assert!(notices[2].message().contains("does not answer HTTP"));

    cancel.cancel();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn test_outage_is_reported_on_transitions_only() {
    let cancel = CancellationToken::new();
    let prober = Arc::new(ScriptedProber::new(&[
        true, true, false, false, false, true, true,
    ]));
    let handle = HealthCheckerHandle::spawn(
        vec![Target::new("web", "10.0.0.1:80", "")],
        prober,
        NO_TICKS,
        false,
        &cancel,
    );

    let mut events = Vec::new();
    for _ in 0..6 {
        let notices = handle.check_now().await.unwrap();
        events.extend(notices.into_iter().map(|notice| notice.event));
    }

    // first observation (OK) happened in the initial cycle
    assert_eq!(
        events,
        vec![
            HealthEvent::Ok,
            HealthEvent::Alert,
            HealthEvent::Down,
            HealthEvent::Down,
            HealthEvent::Recovered,
            HealthEvent::Ok,
        ]
    );

    cancel.cancel();
    handle.join().await.unwrap();
}

/// Reports a fixed set of addresses as down
struct AddressProber {
    down: HashSet<String>,
}

#[async_trait]
impl Prober for AddressProber {
    async fn probe(&self, address: &str) -> Result<u16, ProbeError> {
        if self.down.contains(address) {
            Err(ProbeError::Transport("no route to host".to_string()))
        } else {
            Ok(204)
        }
    }
}

#[tokio::test]
async fn test_quiet_mode_reports_only_problems() {
    let cancel = CancellationToken::new();
    let prober = Arc::new(AddressProber {
        down: HashSet::from(["10.0.0.2:80".to_string()]),
    });
    let handle = HealthCheckerHandle::spawn(
        vec![
            Target::new("a", "10.0.0.1:80", ""),
            Target::new("b", "10.0.0.2:80", ""),
            Target::new("c", "10.0.0.3:80", ""),
        ],
        prober,
        NO_TICKS,
        true,
        &cancel,
    );

    let notices = handle.check_now().await.unwrap();

    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].target.name, "b");
    assert_eq!(notices[0].event, HealthEvent::Down);

    cancel.cancel();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn test_periodic_cycles_reach_subscribers() {
    let cancel = CancellationToken::new();
    let prober = Arc::new(AddressProber {
        down: HashSet::new(),
    });
    let handle = HealthCheckerHandle::spawn(
        vec![Target::new("a", "10.0.0.1:80", "")],
        prober,
        Duration::from_millis(50),
        false,
        &cancel,
    );
    let mut rx = handle.subscribe();

    for _ in 0..3 {
        let notice = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(notice.event, HealthEvent::Ok);
        assert_eq!(notice.status_code, Some(204));
    }

    cancel.cancel();
    handle.join().await.unwrap();
}
