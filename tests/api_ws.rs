// tests/api_ws.rs
//
// End-to-end test for GET /api/events/stream over a real socket:
// an injected event reaches a connected client as one JSON text frame,
// and closing the client releases its bus subscription.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt as _;
use serde_json::{json, Value as Json};
use tokio_tungstenite::tungstenite::Message;

use crisis_ingest::bus::EventBus;
use crisis_ingest::credibility::CredibilityTable;
use crisis_ingest::ingest::config::IngestConfig;
use crisis_ingest::{build_state_with, router};

const WAIT: Duration = Duration::from_secs(5);

async fn wait_for_subscribers(bus: &EventBus, expected: usize) {
    tokio::time::timeout(WAIT, async {
        while bus.subscriber_count() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "subscriber count stuck at {} (expected {expected})",
            bus.subscriber_count()
        )
    });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn injected_event_is_streamed_and_close_unsubscribes() {
    let cfg = IngestConfig {
        sources: Vec::new(),
        ..Default::default()
    };
    let state = build_state_with(&cfg, Vec::new(), Arc::new(CredibilityTable::default_seed()));
    let bus = Arc::clone(&state.bus);
    let baseline = bus.subscriber_count();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind api");
    let addr = listener.local_addr().expect("local addr");
    let app = router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve api");
    });

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/api/events/stream"))
        .await
        .expect("ws handshake");
    wait_for_subscribers(&bus, baseline + 1).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/api/events"))
        .json(&json!({
            "headline": "Military buildup reported near Taiwan",
            "source": "Reuters",
        }))
        .send()
        .await
        .expect("inject request");
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
    let created: Json = resp.json().await.expect("inject body");

    let frame = loop {
        let msg = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("frame before timeout")
            .expect("stream still open")
            .expect("ws read");
        match msg {
            Message::Text(_) => break msg,
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    };
    let ev: Json = serde_json::from_str(frame.to_text().expect("utf-8 frame")).expect("json frame");
    assert_eq!(ev["id"], created["id"]);
    assert_eq!(ev["headline"], "Military buildup reported near Taiwan");
    assert_eq!(ev["category"], "military");
    assert_eq!(ev["region"], "Asia-Pacific");
    assert_eq!(ev["synthetic"], true);

    ws.close(None).await.expect("ws close");
    wait_for_subscribers(&bus, baseline).await;
}
