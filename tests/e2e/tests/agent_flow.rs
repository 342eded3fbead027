//! End-to-end flows: fake adapters over real TCP sockets feeding a real
//! broker, queried through the query engine.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use agent_service::{PathFilter, StreamChunk, StreamOptions};
use spindle_e2e_tests::{wait_until, TestAgent};

#[tokio::test(flavor = "multi_thread")]
async fn capacity_window_scenario() {
    // Empty buffer, capacity 4; values 1..=5 for key "X".
    let agent = TestAgent::start(4, &[Some("mill-3")]).await.unwrap();
    let engine = agent.broker.query_engine();

    let mut adapter = agent.connect_adapter(0).await.unwrap();
    for value in 1..=5 {
        let line = format!("2024-03-01T12:00:0{value}Z|X|{value}\n");
        adapter.write_all(line.as_bytes()).await.unwrap();
    }

    wait_until("five observations sequenced", || {
        agent.broker.observations().bounds().last_sequence == 5
    })
    .await
    .unwrap();

    let filter = PathFilter::all();
    let current = engine.current(&filter, None).unwrap();
    assert_eq!(current.header.first_sequence, 2);
    assert_eq!(current.header.last_sequence, 5);
    assert_eq!(current.observations.len(), 1);
    assert_eq!(current.observations[0].observation.value(), Some("5"));

    let sample = engine.sample(&filter, Some(2), None, Some(2)).unwrap();
    let values: Vec<_> = sample
        .observations
        .iter()
        .map(|r| r.observation.value().unwrap().to_string())
        .collect();
    assert_eq!(values, vec!["2", "3"]);

    agent.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn stream_delivers_the_delta_across_two_adapters() {
    let agent = TestAgent::start(4096, &[Some("mill-a"), Some("mill-b")])
        .await
        .unwrap();
    let engine = agent.broker.query_engine();

    let mut session = engine
        .stream(
            PathFilter::all(),
            StreamOptions::default(),
            CancellationToken::new(),
        )
        .unwrap();
    let start = session.next_sequence();

    const PER_WRITER: usize = 50;
    let mut writers = Vec::new();
    for index in 0..2 {
        let stream = agent.connect_adapter(index).await.unwrap();
        writers.push(tokio::spawn(async move {
            let mut stream = stream;
            for i in 0..PER_WRITER {
                let line = format!("|counter|{i}\n");
                stream.write_all(line.as_bytes()).await.unwrap();
                tokio::task::yield_now().await;
            }
            stream
        }));
    }

    let mut delivered = Vec::new();
    while delivered.len() < PER_WRITER * 2 {
        match session.next_chunk().await.unwrap() {
            StreamChunk::Data(doc) => {
                delivered.extend(doc.observations.iter().map(|r| r.sequence));
            }
            StreamChunk::Heartbeat { .. } => {}
        }
    }
    for writer in writers {
        writer.await.unwrap();
    }

    // Exactly the delta, in sequence order, no duplicates, no gaps,
    // regardless of how the two connections interleaved.
    let expected: Vec<u64> = (start..start + (PER_WRITER * 2) as u64).collect();
    assert_eq!(delivered, expected);

    agent.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn heartbeat_ping_pong() {
    let agent = TestAgent::start(64, &[Some("mill-3")]).await.unwrap();
    let mut adapter = agent.connect_adapter(0).await.unwrap();

    adapter.write_all(b"* PING\n").await.unwrap();
    let mut reply = vec![0u8; "* PONG 10000\n".len()];
    adapter.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, b"* PONG 10000\n");

    agent.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn disconnect_marks_items_unavailable() {
    let agent = TestAgent::start(64, &[Some("mill-3")]).await.unwrap();
    let engine = agent.broker.query_engine();

    let mut adapter = agent.connect_adapter(0).await.unwrap();
    adapter
        .write_all(b"|temp:sample|21.5\n|system|FAULT|A17|||overtemp\n")
        .await
        .unwrap();
    wait_until("observations ingested", || {
        agent.broker.observations().bounds().last_sequence >= 2
    })
    .await
    .unwrap();

    drop(adapter);
    wait_until("availability fallback", || {
        agent.broker.observations().bounds().last_sequence >= 4
    })
    .await
    .unwrap();

    let current = engine.current(&PathFilter::all(), None).unwrap();
    assert_eq!(current.observations.len(), 2);
    assert!(current
        .observations
        .iter()
        .all(|r| r.observation.is_unavailable()));

    agent.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn wildcard_adapter_and_assets() {
    let agent = TestAgent::start(64, &[None, Some("mill-3")]).await.unwrap();
    let engine = agent.broker.query_engine();

    // Wildcard adapter: keys carry the device.
    let mut wildcard = agent.connect_adapter(0).await.unwrap();
    wildcard
        .write_all(b"|lathe-1:speed:sample|880\n")
        .await
        .unwrap();

    // Device-bound adapter supplies an asset with a length-prefixed body.
    let mut bound = agent.connect_adapter(1).await.unwrap();
    bound
        .write_all(b"|@ASSET@|T1|CuttingTool|16\n<tool>7mm</tool>")
        .await
        .unwrap();

    wait_until("records arrived", || {
        agent.broker.observations().bounds().last_sequence >= 1
            && agent.broker.assets().count() == 1
    })
    .await
    .unwrap();

    let current = engine
        .current(&PathFilter::parse("lathe-1:*"), None)
        .unwrap();
    assert_eq!(current.observations.len(), 1);
    assert_eq!(current.observations[0].observation.value(), Some("880"));

    let assets = engine.assets(&buffer::AssetQuery::default());
    assert_eq!(assets.assets.len(), 1);
    assert_eq!(assets.assets[0].device_uuid, "mill-3");
    assert_eq!(assets.assets[0].body, "<tool>7mm</tool>");

    agent.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn stream_sees_live_inserts_after_subscription() {
    let agent = TestAgent::start(64, &[Some("mill-3")]).await.unwrap();
    let engine = agent.broker.query_engine();

    let mut session = engine
        .stream(
            PathFilter::all(),
            StreamOptions {
                heartbeat: Duration::from_secs(30),
                ..StreamOptions::default()
            },
            CancellationToken::new(),
        )
        .unwrap();

    let mut adapter = agent.connect_adapter(0).await.unwrap();
    adapter.write_all(b"|mode|AUTO\n").await.unwrap();

    match session.next_chunk().await.unwrap() {
        StreamChunk::Data(doc) => {
            assert_eq!(doc.observations.len(), 1);
            assert_eq!(doc.observations[0].observation.value(), Some("AUTO"));
        }
        StreamChunk::Heartbeat { .. } => panic!("expected data chunk"),
    }

    agent.shutdown().await;
}
