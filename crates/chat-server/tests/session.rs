use std::sync::Arc;
use std::time::Duration;

use chat_bus::EventBus;
use chat_moderation::{ModerationAction, ModerationContext, StrategyKind};
use chat_server::{AdminCommand, AdminResponse, ChatServer, ChatServerConfig, Session};
use chat_stats::StatsAggregator;
use futures::channel::mpsc;
use futures::StreamExt;
use serde_json::Value;
use tokio::time::timeout;

type Frames = mpsc::UnboundedReceiver<String>;

fn server() -> ChatServer {
    let (bus, _handle) = EventBus::start(256);
    ChatServer::new(
        bus,
        Arc::new(ModerationContext::default()),
        StatsAggregator::shared(),
        ChatServerConfig::default(),
    )
}

fn connect(server: &ChatServer) -> (Session, Frames) {
    let (tx, rx) = mpsc::unbounded::<String>();
    (server.connect(tx), rx)
}

async fn next_frame(rx: &mut Frames) -> Value {
    let frame = timeout(Duration::from_secs(2), rx.next())
        .await
        .expect("timed out waiting for frame")
        .expect("transport closed");
    serde_json::from_str(&frame).expect("frame is not JSON")
}

async fn expect_kind(rx: &mut Frames, kind: &str) -> Value {
    let frame = next_frame(rx).await;
    assert_eq!(frame["type"], kind, "unexpected frame: {frame}");
    frame
}

async fn settle(server: &ChatServer) {
    let mut last = u64::MAX;
    for _ in 0..200 {
        let m = server.bus_metrics();
        if m.dispatched == m.published && m.published == last {
            return;
        }
        last = m.published;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("bus did not settle");
}

#[tokio::test]
async fn connect_allocates_ids_and_announces_join() {
    let server = server();
    let (alice, mut alice_rx) = connect(&server);
    let own_join = expect_kind(&mut alice_rx, "user_join").await;
    assert_eq!(own_join["data"]["observer_id"], "obs_1");

    let (bob, mut bob_rx) = connect(&server);
    assert_eq!(alice.id().as_str(), "obs_1");
    assert_eq!(bob.id().as_str(), "obs_2");
    assert_eq!(server.connection_count(), 2);

    let bob_join = expect_kind(&mut alice_rx, "user_join").await;
    assert_eq!(bob_join["data"]["observer_id"], "obs_2");

    let bob_own = expect_kind(&mut bob_rx, "user_join").await;
    assert_eq!(bob_own["data"]["observer_id"], "obs_2");
}

#[tokio::test]
async fn modified_messages_reach_everyone_censored() {
    let server = server();
    let (mut alice, mut alice_rx) = connect(&server);
    expect_kind(&mut alice_rx, "user_join").await;
    let (_bob, mut bob_rx) = connect(&server);
    expect_kind(&mut alice_rx, "user_join").await;
    expect_kind(&mut bob_rx, "user_join").await;

    let verdict = alice.handle_inbound(r#"{"username":"ana","message":"eres tonto"}"#);
    assert_eq!(verdict.action, ModerationAction::Modify);
    assert_eq!(alice.username(), Some("ana"));

    for rx in [&mut alice_rx, &mut bob_rx] {
        let frame = expect_kind(rx, "message").await;
        assert_eq!(frame["message"], "eres ***");
        assert_eq!(frame["username"], "ana");
        assert_eq!(frame["data"]["sender_id"], "obs_1");
        assert_eq!(frame["data"]["chat_message"]["message"], "eres tonto");
        assert_eq!(frame["data"]["moderation_result"]["action"], "modify");
        assert_eq!(frame["data"]["moderation_result"]["confidence"], 0.8);
    }
}

#[tokio::test]
async fn blocked_message_only_notifies_sender() {
    let server = server();
    server.set_strategy(StrategyKind::StrictBlocking);

    let (mut alice, mut alice_rx) = connect(&server);
    expect_kind(&mut alice_rx, "user_join").await;
    let (_bob, mut bob_rx) = connect(&server);
    expect_kind(&mut alice_rx, "user_join").await;
    expect_kind(&mut bob_rx, "user_join").await;

    let verdict = alice.handle_inbound(r#"{"username":"ana","message":"this is spam content"}"#);
    assert!(verdict.is_blocked());

    let notice = expect_kind(&mut alice_rx, "system").await;
    assert!(notice["message"]
        .as_str()
        .unwrap()
        .starts_with("Your message was blocked: "));
    assert!(notice["message"].as_str().unwrap().contains("spam"));
    assert_eq!(notice["data"]["blocked_message"], true);
    assert_eq!(notice["data"]["sender_id"], "obs_1");

    // Bob's next frame is the follow-up, not the notice or the spam.
    alice.handle_inbound("hello again");
    let frame = expect_kind(&mut bob_rx, "message").await;
    assert_eq!(frame["message"], "hello again");
    assert_eq!(frame["username"], "ana");

    let stats = server.moderation_stats();
    assert_eq!(stats.blocked_messages, 1);
    assert_eq!(stats.strategy, "StrictBlocking");
}

#[tokio::test]
async fn warned_messages_pass_unchanged() {
    let server = server();
    server.set_strategy(StrategyKind::Warning);
    let (mut alice, mut alice_rx) = connect(&server);
    expect_kind(&mut alice_rx, "user_join").await;

    let verdict = alice.handle_inbound("cuidado con el peligro");
    assert_eq!(verdict.action, ModerationAction::Warn);

    let frame = expect_kind(&mut alice_rx, "message").await;
    assert_eq!(frame["message"], "cuidado con el peligro");
    assert_eq!(frame["data"]["moderation_result"]["action"], "warn");
}

#[tokio::test]
async fn composite_allow_publishes_original_text() {
    let server = server();
    server.set_strategy(StrategyKind::Composite);
    let (mut alice, mut alice_rx) = connect(&server);
    expect_kind(&mut alice_rx, "user_join").await;

    let verdict = alice.handle_inbound(r#"{"username":"ana","message":"eres tonto"}"#);
    assert_eq!(verdict.action, ModerationAction::Allow);
    assert_eq!(verdict.strategy_used, "Composite");
    assert_eq!(verdict.modified_message, "eres ***");

    let frame = expect_kind(&mut alice_rx, "message").await;
    assert_eq!(frame["message"], "eres tonto");
    assert_eq!(frame["data"]["moderation_result"]["modified_message"], "eres ***");
}

#[tokio::test]
async fn plain_text_keeps_last_username() {
    let server = server();
    let (mut alice, mut alice_rx) = connect(&server);
    expect_kind(&mut alice_rx, "user_join").await;

    alice.handle_inbound(r#"{"username":"ana","message":"hola"}"#);
    alice.handle_inbound("plain words");
    alice.handle_inbound(r#"{"message":"no name this time"}"#);

    for text in ["hola", "plain words", "no name this time"] {
        let frame = expect_kind(&mut alice_rx, "message").await;
        assert_eq!(frame["message"], text);
        assert_eq!(frame["username"], "ana");
    }
}

#[tokio::test]
async fn json_array_payload_cannot_rename_sender() {
    let server = server();
    let (mut alice, mut alice_rx) = connect(&server);
    expect_kind(&mut alice_rx, "user_join").await;

    alice.handle_inbound(r#"{"username":"ana","message":"hola"}"#);
    alice.handle_inbound(r#"["mallory","hola"]"#);
    assert_eq!(alice.username(), Some("ana"));

    expect_kind(&mut alice_rx, "message").await;
    let frame = expect_kind(&mut alice_rx, "message").await;
    assert_eq!(frame["username"], "ana");
    assert_eq!(frame["message"], r#"["mallory","hola"]"#);
}

#[tokio::test]
async fn disconnect_announces_leave_and_releases_transport() {
    let server = server();
    let (mut alice, mut alice_rx) = connect(&server);
    expect_kind(&mut alice_rx, "user_join").await;
    let (_bob, mut bob_rx) = connect(&server);
    expect_kind(&mut bob_rx, "user_join").await;

    alice.handle_inbound(r#"{"username":"ana","message":"bye"}"#);
    expect_kind(&mut bob_rx, "message").await;

    alice.disconnect();
    assert_eq!(server.connection_count(), 1);

    let leave = expect_kind(&mut bob_rx, "user_leave").await;
    assert_eq!(leave["username"], "ana");
    assert_eq!(leave["data"]["observer_id"], "obs_1");

    // Alice's transport is closed once her drain task ends.
    let mut seen = Vec::new();
    while let Ok(Some(frame)) = timeout(Duration::from_secs(2), alice_rx.next()).await {
        seen.push(frame);
    }
    assert!(seen.iter().all(|f| !f.contains("user_leave")));
}

#[tokio::test]
async fn dropping_a_session_tears_it_down() {
    let server = server();
    let (alice, _alice_rx) = connect(&server);
    assert_eq!(server.connection_count(), 1);
    assert_eq!(server.bus().subscriber_count(), 2);

    drop(alice);
    assert_eq!(server.connection_count(), 0);
    assert_eq!(server.bus().subscriber_count(), 1);
}

#[tokio::test]
async fn admin_commands_report_live_state() {
    let server = server();
    let (mut alice, mut alice_rx) = connect(&server);
    let (_bob, mut bob_rx) = connect(&server);

    alice.handle_inbound("eres tonto");
    alice.handle_inbound("hola");

    assert_eq!(
        server.execute(AdminCommand::ConnectionCount),
        AdminResponse::ConnectionCount { connections: 2 }
    );

    assert_eq!(
        server.execute(AdminCommand::Broadcast {
            message: "maintenance at noon".to_string()
        }),
        AdminResponse::Broadcast { accepted: true }
    );

    for rx in [&mut alice_rx, &mut bob_rx] {
        let frame = loop {
            let frame = next_frame(rx).await;
            if frame["type"] == "system" {
                break frame;
            }
        };
        assert_eq!(frame["message"], "maintenance at noon");
        assert_eq!(frame["data"]["system_message"], true);
    }

    settle(&server).await;
    match server.execute(AdminCommand::ChatStats) {
        AdminResponse::ChatStats(snap) => {
            assert_eq!(snap.total_messages, 2);
            assert_eq!(snap.total_unique_users, 2);
        }
        other => panic!("unexpected response: {other:?}"),
    }

    match server.execute(AdminCommand::ModerationStats) {
        AdminResponse::ModerationStats(stats) => {
            assert_eq!(stats.modified_messages, 1);
            assert_eq!(stats.blocked_messages, 0);
            assert_eq!(stats.strategy, "BadWordReplacement");
        }
        other => panic!("unexpected response: {other:?}"),
    }

    assert_eq!(
        server.execute(AdminCommand::SetStrategy {
            strategy: StrategyKind::StrictBlocking
        }),
        AdminResponse::StrategyChanged {
            strategy: "StrictBlocking".to_string()
        }
    );

    match server.execute(AdminCommand::BusMetrics) {
        AdminResponse::BusMetrics(metrics) => {
            assert_eq!(metrics.ingress_dropped, 0);
            assert!(metrics.published >= 5);
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn shutdown_closes_every_mailbox() {
    let server = server();
    let (_alice, mut alice_rx) = connect(&server);
    let (_bob, mut bob_rx) = connect(&server);
    settle(&server).await;

    server.shutdown();

    for rx in [&mut alice_rx, &mut bob_rx] {
        let mut frames = 0;
        while let Ok(Some(_)) = timeout(Duration::from_secs(2), rx.next()).await {
            frames += 1;
        }
        assert!(frames <= 2);
    }
}
