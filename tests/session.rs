mod common;

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use weather_station::{
    ingest::{Delivery, Ingestor},
    mqtt::{Backoff, Session, SessionConfig, SessionHandle, SessionState},
};

use common::{MemorySink, ScriptedTransport, Step, connected, message, subscribed};

fn config(backoff: Backoff) -> SessionConfig {
    SessionConfig {
        backoff,
        ..SessionConfig::default()
    }
}

async fn wait_for_state(handle: &SessionHandle, state: SessionState) {
    handle
        .watch()
        .wait_for(|status| status.state == state)
        .await
        .expect("session dropped its status channel");
}

#[tokio::test(start_paused = true)]
async fn forwards_messages_in_arrival_order() {
    let (transport, counters) = ScriptedTransport::new([
        connected(),
        subscribed(true),
        message(r#"{"Temp": 1}"#),
        message("not json"),
        message(r#"{"Temp": 3}"#),
    ]);
    let (tx, mut rx) = mpsc::channel(8);
    let (session, handle) = Session::new(transport, SessionConfig::default(), tx);
    let task = tokio::spawn(session.run());

    let mut payloads = Vec::new();
    for _ in 0..3 {
        let delivery: Delivery = rx.recv().await.unwrap();
        assert_eq!(delivery.topic, "awsData");
        payloads.push(delivery.payload.to_vec());
    }
    assert_eq!(
        payloads,
        vec![
            br#"{"Temp": 1}"#.to_vec(),
            b"not json".to_vec(),
            br#"{"Temp": 3}"#.to_vec(),
        ]
    );

    let status = handle.status();
    assert_eq!(status.state, SessionState::Subscribed);
    assert_eq!(status.attempt, 0);
    assert_eq!(counters.subscribes(), 1);

    handle.shutdown();
    task.await.unwrap();

    assert_eq!(counters.closes(), 1);
    assert_eq!(counters.resets(), 0);
    assert_eq!(handle.status().state, SessionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn reconnects_after_each_failure_with_backoff() {
    let (transport, counters) = ScriptedTransport::new([
        Step::Fail,
        Step::Fail,
        Step::Fail,
        connected(),
        subscribed(true),
    ]);
    let (tx, _rx) = mpsc::channel(8);
    let backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(10));
    let (session, handle) = Session::new(transport, config(backoff), tx);

    let started = Instant::now();
    let task = tokio::spawn(session.run());
    wait_for_state(&handle, SessionState::Subscribed).await;

    // 1s + 2s + 4s of backoff before the fourth connect succeeds.
    assert!(started.elapsed() >= Duration::from_secs(7));
    assert_eq!(counters.resets(), 3);

    let status = handle.status();
    assert_eq!(status.total_reconnects, 3);
    assert_eq!(status.attempt, 0);

    handle.shutdown();
    task.await.unwrap();
    assert_eq!(counters.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn keeps_retrying_without_a_limit() {
    let (transport, counters) = ScriptedTransport::new((0..50).map(|_| Step::Fail));
    let (tx, _rx) = mpsc::channel(8);
    let (session, handle) = Session::new(
        transport,
        config(Backoff::fixed(Duration::from_millis(100))),
        tx,
    );
    let task = tokio::spawn(session.run());

    // The script runs dry after 50 failures and the 51st connect hangs.
    handle
        .watch()
        .wait_for(|status| status.total_reconnects == 50 && status.state == SessionState::Connecting)
        .await
        .unwrap();

    assert!(!task.is_finished());
    assert_eq!(counters.resets(), 50);
    assert_eq!(handle.status().attempt, 50);
    assert_eq!(counters.closes(), 0);

    handle.shutdown();
    task.await.unwrap();
    assert_eq!(counters.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn rejected_subscription_triggers_reconnect() {
    let (transport, counters) = ScriptedTransport::new([
        connected(),
        subscribed(false),
        connected(),
        subscribed(true),
    ]);
    let (tx, _rx) = mpsc::channel(8);
    let (session, handle) = Session::new(transport, SessionConfig::default(), tx);
    let task = tokio::spawn(session.run());

    wait_for_state(&handle, SessionState::Subscribed).await;

    assert_eq!(counters.subscribes(), 2);
    assert_eq!(counters.resets(), 1);

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn missing_subscription_ack_times_out_and_reconnects() {
    let (transport, counters) = ScriptedTransport::new([
        connected(),
        Step::Hang,
        connected(),
        subscribed(true),
    ]);
    let (tx, _rx) = mpsc::channel(8);
    let mut config = config(Backoff::fixed(Duration::from_secs(1)));
    config.subscribe_timeout = Duration::from_secs(5);
    let (session, handle) = Session::new(transport, config, tx);

    let started = Instant::now();
    let task = tokio::spawn(session.run());
    wait_for_state(&handle, SessionState::Subscribed).await;

    assert!(started.elapsed() >= Duration::from_secs(6));
    assert_eq!(counters.resets(), 1);
    assert_eq!(counters.subscribes(), 2);

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn missing_connection_ack_times_out_and_reconnects() {
    let (transport, counters) = ScriptedTransport::new([Step::Hang, connected(), subscribed(true)]);
    let (tx, _rx) = mpsc::channel(8);
    let mut config = config(Backoff::fixed(Duration::from_secs(1)));
    config.connect_timeout = Duration::from_secs(3);
    let (session, handle) = Session::new(transport, config, tx);

    let task = tokio::spawn(session.run());
    wait_for_state(&handle, SessionState::Subscribed).await;

    assert_eq!(counters.resets(), 1);
    assert_eq!(counters.subscribes(), 1);

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn resubscribes_after_broker_disconnect() {
    let (transport, counters) = ScriptedTransport::new([
        connected(),
        subscribed(true),
        message(r#"{"Temp": 1}"#),
        Step::Event(weather_station::mqtt::TransportEvent::Disconnected),
        connected(),
        subscribed(true),
        message(r#"{"Temp": 2}"#),
    ]);
    let (tx, mut rx) = mpsc::channel(8);
    let (session, handle) = Session::new(transport, SessionConfig::default(), tx);
    let task = tokio::spawn(session.run());

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(&first.payload[..], br#"{"Temp": 1}"#);
    assert_eq!(&second.payload[..], br#"{"Temp": 2}"#);
    assert!(first.received_at <= second.received_at);

    assert_eq!(counters.subscribes(), 2);
    assert_eq!(counters.resets(), 1);
    assert_eq!(handle.status().total_reconnects, 1);

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_backoff_cancels_the_wait() {
    let (transport, counters) = ScriptedTransport::new([Step::Fail]);
    let (tx, _rx) = mpsc::channel(8);
    let (session, handle) = Session::new(
        transport,
        config(Backoff::fixed(Duration::from_secs(60))),
        tx,
    );

    let started = Instant::now();
    let task = tokio::spawn(session.run());
    wait_for_state(&handle, SessionState::Reconnecting).await;

    handle.shutdown();
    handle.shutdown();
    task.await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(counters.resets(), 0);
    assert_eq!(counters.closes(), 1);
    assert_eq!(handle.status().state, SessionState::Disconnected);
    assert_eq!(handle.status().total_reconnects, 1);
}

#[tokio::test(start_paused = true)]
async fn repeated_shutdown_closes_once() {
    let (transport, counters) = ScriptedTransport::new([connected(), subscribed(true)]);
    let (tx, _rx) = mpsc::channel(8);
    let (session, handle) = Session::new(transport, SessionConfig::default(), tx);
    let task = tokio::spawn(session.run());
    wait_for_state(&handle, SessionState::Subscribed).await;

    let other = handle.clone();
    handle.shutdown();
    other.shutdown();
    task.await.unwrap();
    handle.shutdown();

    assert!(handle.is_shutdown());
    assert_eq!(counters.closes(), 1);
    assert_eq!(counters.resets(), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_before_start_never_connects() {
    let (transport, counters) = ScriptedTransport::new([connected(), subscribed(true)]);
    let (tx, _rx) = mpsc::channel(8);
    let (session, handle) = Session::new(transport, SessionConfig::default(), tx);

    handle.shutdown();
    session.run().await;

    assert_eq!(counters.polls.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert_eq!(counters.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn stops_when_ingest_queue_closes() {
    let (transport, counters) =
        ScriptedTransport::new([connected(), subscribed(true), message(r#"{"Temp": 1}"#)]);
    let (tx, rx) = mpsc::channel(8);
    drop(rx);
    let (session, handle) = Session::new(transport, SessionConfig::default(), tx);

    session.run().await;

    assert_eq!(counters.closes(), 1);
    assert_eq!(counters.resets(), 0);
    assert_eq!(handle.status().state, SessionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn full_queue_drops_messages_and_keeps_polling() {
    let mut steps = vec![connected(), subscribed(true)];
    steps.extend((0..10).map(|_| message(r#"{"Temp": 1}"#)));
    let (transport, counters) = ScriptedTransport::new(steps);
    let (tx, mut rx) = mpsc::channel(1);
    let (session, handle) = Session::new(transport, SessionConfig::default(), tx);
    let task = tokio::spawn(session.run());

    tokio::time::sleep(Duration::from_secs(120)).await;

    // Every scripted step was polled, plus the final poll that hangs.
    assert_eq!(counters.polls.load(std::sync::atomic::Ordering::SeqCst), 13);
    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_err());

    let status = handle.status();
    assert_eq!(status.state, SessionState::Subscribed);
    assert_eq!(status.total_reconnects, 0);

    handle.shutdown();
    task.await.unwrap();
    assert_eq!(counters.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn bridge_persists_past_a_failed_insert() {
    let (transport, _counters) = ScriptedTransport::new([
        connected(),
        subscribed(true),
        message(r#"{"Temp": 1, "Rh": 40}"#),
        message(r#"{"Temp": 2, "Rh": 41}"#),
        message(r#"{"Temp": 3, "Rh": 42}"#),
    ]);
    let sink = MemorySink::failing_on([1]);
    let (tx, rx) = mpsc::channel(8);
    let worker = tokio::spawn(Ingestor::new(sink.clone()).run(rx));
    let (session, handle) = Session::new(transport, SessionConfig::default(), tx);
    let task = tokio::spawn(session.run());

    while sink.calls() < 3 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    handle.shutdown();
    task.await.unwrap();
    let stats = worker.await.unwrap();

    assert_eq!(stats.stored, 2);
    assert_eq!(stats.dropped, 1);
    let humidity: Vec<Option<f64>> = sink.records().iter().map(|r| r.relative_humidity).collect();
    assert_eq!(humidity, vec![Some(40.0), Some(42.0)]);
    assert_eq!(handle.status().total_reconnects, 0);
}
