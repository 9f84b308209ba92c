mod common;

use anyhow::Result;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use common::{session, settle, MockTransport, PUMPHOUSE, WORKSHOP};
use relaydeck::core::{
    reconciler::LoopPhase,
    view::{EndpointStatus, StatusKind},
    IdentityKey, Intent,
};

const ALL_OFF: &str = "input:\n1:off 2:off\noutput:\n1:off\n2:off\n6:off\nall states\n";

#[tokio::test(start_paused = true)]
async fn test_poll_runs_immediately_then_every_interval() -> Result<()> {
    let transport = MockTransport::new();
    let session = session(transport.clone());

    session.poll().start();
    assert_eq!(session.poll().phase(), LoopPhase::Running);
    settle().await;
    // One fetch per endpoint and cycle.
    assert_eq!(transport.state_fetches(), 2);

    sleep(Duration::from_millis(2000)).await;
    assert_eq!(transport.state_fetches(), 4);
    sleep(Duration::from_millis(2000)).await;
    assert_eq!(transport.state_fetches(), 6);

    session.poll().stop();
    sleep(Duration::from_millis(6000)).await;
    assert_eq!(transport.state_fetches(), 6);
    assert_eq!(session.poll().phase(), LoopPhase::Stopped);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_reports_reach_view() -> Result<()> {
    let transport = MockTransport::new();
    transport.set_states(WORKSHOP, "input:\n1:on\noutput:\n1:on\n2:off\n6:off\n");
    transport.set_states(PUMPHOUSE, "output:\n1:on\n");
    let session = session(transport.clone());

    session.poll().start();
    settle().await;

    let view = session.view().read();
    assert!(view.is_on(&IdentityKey::device(WORKSHOP, 0)));
    assert!(view.is_on(&IdentityKey::group(WORKSHOP, "Lights")));
    assert!(!view.is_on(&IdentityKey::group(WORKSHOP, "Other")));
    assert!(view.is_on(&IdentityKey::group(PUMPHOUSE, "Water")));
    assert!(view.input(WORKSHOP, 0).unwrap().on);
    assert!(view.input(PUMPHOUSE, 0).is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_pauses_polling() -> Result<()> {
    let transport = MockTransport::new();
    let session = session(transport.clone());

    session.poll().start();
    settle().await;
    assert_eq!(transport.state_fetches(), 2);

    assert!(
        session
            .handle(Intent::Toggle {
                address: WORKSHOP.to_string(),
                number: 0,
                on: true,
            })
            .await
    );
    assert_eq!(session.poll().phase(), LoopPhase::Stopped);

    sleep(Duration::from_millis(900)).await;
    assert_eq!(transport.state_fetches(), 2);

    // Resumed after one second with an immediate cycle.
    sleep(Duration::from_millis(200)).await;
    assert_eq!(session.poll().phase(), LoopPhase::Running);
    assert_eq!(transport.state_fetches(), 4);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_polled_state_does_not_override_fresh_command() -> Result<()> {
    let transport = MockTransport::new();
    transport.set_states(WORKSHOP, ALL_OFF);
    let session = session(transport.clone());
    let lamp = IdentityKey::device(WORKSHOP, 0);
    let lights = IdentityKey::group(WORKSHOP, "Lights");

    session.poll().start();
    settle().await;
    assert!(!session.view().read().is_on(&lamp));

    // The board keeps answering "off", e.g. a report that predates the command.
    assert!(
        session
            .handle(Intent::ToggleGroup {
                address: WORKSHOP.to_string(),
                group: "Lights".to_string(),
                on: true,
            })
            .await
    );

    sleep(Duration::from_millis(2500)).await;
    assert!(transport.state_fetches() > 2);
    assert!(session.view().read().is_on(&lamp));
    assert!(session.view().read().is_on(&lights));

    // Once the window is over the next cycle applies the board's state.
    sleep(Duration::from_millis(2600)).await;
    assert!(!session.tracker().is_suppressed(&lamp));
    assert!(!session.view().read().is_on(&lamp));
    assert!(!session.view().read().is_on(&lights));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_input_change_flashes() -> Result<()> {
    let transport = MockTransport::new();
    transport.set_states(WORKSHOP, "input:\n1:on 2:off\noutput:\n");
    let session = session(transport.clone());

    session.poll().start();
    settle().await;
    let now = Instant::now();
    assert!(!session.view().read().input(WORKSHOP, 0).unwrap().is_flashing(now));
    assert!(!session.render(now).contains(" <<"));

    transport.set_states(WORKSHOP, "input:\n1:off 2:off\noutput:\n");
    sleep(Duration::from_millis(2000)).await;
    let now = Instant::now();
    let input = session.view().read().input(WORKSHOP, 0).unwrap();
    assert!(!input.on);
    assert!(input.is_flashing(now));
    assert!(session.render(now).contains(" <<"));

    sleep(Duration::from_millis(4000)).await;
    assert!(!input.is_flashing(Instant::now()));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_connectivity_reports_network() -> Result<()> {
    let transport = MockTransport::new();
    transport.set_reachable(WORKSHOP);
    let session = session(transport.clone());

    session.monitor().start();
    assert!(session.monitor().is_running());
    settle().await;

    {
        let view = session.view().read();
        assert_eq!(view.endpoint_status(WORKSHOP), EndpointStatus::Connected);
        assert_eq!(view.endpoint_status(PUMPHOUSE), EndpointStatus::Offline);
        let status = view.status().unwrap();
        assert_eq!(status.message, "Connected to relay-net - Devices reachable");
        assert_eq!(status.kind, StatusKind::Success);
    }

    transport.set_reachable(PUMPHOUSE);
    sleep(Duration::from_millis(10_000)).await;
    assert_eq!(
        session.view().read().endpoint_status(PUMPHOUSE),
        EndpointStatus::Connected
    );

    session.monitor().stop();
    assert!(!session.monitor().is_running());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_connectivity_warns_when_nothing_reachable() -> Result<()> {
    let transport = MockTransport::new();
    let session = session(transport.clone());

    session.start();
    settle().await;

    let view = session.view().read();
    assert_eq!(view.endpoint_status(WORKSHOP), EndpointStatus::Offline);
    let status = view.status().unwrap();
    assert_eq!(
        status.message,
        "Warning: Please connect to WiFi network \"relay-net\""
    );
    assert_eq!(status.kind, StatusKind::Error);
    Ok(())
}
