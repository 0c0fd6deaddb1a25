use std::time::Duration;

use chat_bus::{ChatEvent, EventBus, EventKind, SubscriberId};
use chat_transcript::{rotated_path, TranscriptConfig, TranscriptRecord, TranscriptSink};

fn read_records(path: &std::path::Path) -> Vec<TranscriptRecord> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn writes_one_line_per_event_and_flushes_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/dir/transcript.jsonl");

    let (sink, handle) = TranscriptSink::start(TranscriptConfig::new(&path)).await.unwrap();
    sink.record(
        &ChatEvent::message("hola")
            .with_username("ana")
            .with_origin(SubscriberId::from("obs_1")),
    );
    sink.record(
        &ChatEvent::system("Your message was blocked")
            .addressed_to(SubscriberId::from("obs_1")),
    );
    sink.record(&ChatEvent::new(EventKind::UserLeave, "User disconnected"));
    drop(sink);

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("writer did not stop")
        .unwrap();

    let records = read_records(&path);
    assert_eq!(records.len(), 3);

    assert_eq!(records[0].event.text, "hola");
    assert_eq!(records[0].event.username.as_deref(), Some("ana"));
    assert_eq!(records[0].origin.as_deref(), Some("obs_1"));
    assert!(records[0].recipient.is_none());

    assert_eq!(records[1].event.kind, EventKind::System);
    assert_eq!(records[1].recipient.as_deref(), Some("obs_1"));

    assert_eq!(records[2].event.kind, EventKind::UserLeave);
    assert_ne!(records[0].id, records[1].id);
}

#[tokio::test]
async fn appends_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("transcript.jsonl");

    for round in 0..2 {
        let (sink, handle) = TranscriptSink::start(TranscriptConfig::new(&path)).await.unwrap();
        sink.record(&ChatEvent::message(format!("round {round}")));
        drop(sink);
        handle.await.unwrap();
    }

    let texts: Vec<String> = read_records(&path)
        .into_iter()
        .map(|r| r.event.text)
        .collect();
    assert_eq!(texts, vec!["round 0", "round 1"]);
}

#[tokio::test]
async fn records_bus_traffic_as_a_subscriber() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("transcript.jsonl");

    let (bus, _bus_handle) = EventBus::start(16);
    let (sink, handle) = TranscriptSink::start(TranscriptConfig::new(&path)).await.unwrap();
    let id = SubscriberId::from(TranscriptSink::ID);
    bus.subscribe(id.clone(), sink.clone());

    for i in 0..4 {
        bus.publish(ChatEvent::message(i.to_string())).unwrap();
    }
    for _ in 0..200 {
        if bus.metrics().snapshot().dispatched == 4 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    bus.unsubscribe(&id);
    drop(sink);
    handle.await.unwrap();

    assert_eq!(read_records(&path).len(), 4);
}

#[tokio::test]
async fn dropped_events_leave_a_gap_marker() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("transcript.jsonl");
    let config = TranscriptConfig::new(&path).with_queue_capacity(1);

    let (sink, handle) = TranscriptSink::start(config).await.unwrap();
    // The writer task has not run yet, so only the first fits.
    sink.record(&ChatEvent::message("first"));
    sink.record(&ChatEvent::message("lost 1"));
    sink.record(&ChatEvent::message("lost 2"));
    assert_eq!(sink.dropped(), 2);

    tokio::time::sleep(Duration::from_millis(50)).await;
    sink.record(&ChatEvent::message("after the gap"));
    drop(sink);
    handle.await.unwrap();

    let records = read_records(&path);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].event.text, "first");
    assert_eq!(records[0].dropped_before, 0);
    assert_eq!(records[1].event.text, "after the gap");
    assert_eq!(records[1].dropped_before, 2);
}

#[tokio::test]
async fn drops_at_shutdown_are_recorded_as_trailing_gap() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("transcript.jsonl");
    let config = TranscriptConfig::new(&path).with_queue_capacity(1);

    let (sink, handle) = TranscriptSink::start(config).await.unwrap();
    sink.record(&ChatEvent::message("kept"));
    sink.record(&ChatEvent::message("lost"));
    drop(sink);
    handle.await.unwrap();

    let records = read_records(&path);
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].event.kind, EventKind::System);
    assert_eq!(records[1].dropped_before, 1);
    assert_eq!(records[1].event.text, "1 events were not recorded");
}

#[tokio::test]
async fn rotates_by_size_and_keeps_newest_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("transcript.jsonl");
    // Every record is larger than the threshold, so each one rotates.
    let config = TranscriptConfig::new(&path).with_rotation(1, 2);

    let (sink, handle) = TranscriptSink::start(config).await.unwrap();
    for i in 1..=4 {
        sink.record(&ChatEvent::message(format!("msg {i}")));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    drop(sink);
    handle.await.unwrap();

    let text_of = |p: &std::path::Path| -> Vec<String> {
        read_records(p).into_iter().map(|r| r.event.text).collect()
    };
    assert_eq!(text_of(&path), vec!["msg 4"]);
    assert_eq!(text_of(&rotated_path(&path, 1)), vec!["msg 3"]);
    assert_eq!(text_of(&rotated_path(&path, 2)), vec!["msg 2"]);
    assert!(!rotated_path(&path, 3).exists());
}
