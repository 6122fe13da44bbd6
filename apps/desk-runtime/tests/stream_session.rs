//! Stream Session Integration Tests
//!
//! Runs the stream client against a real in-process WebSocket server and
//! the poller against a canned HTTP listener: typed dispatch, fixed-delay
//! retries, terminal close, and the poll fallback path.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use desk_runtime::infrastructure::stream::poller::{SnapshotPoller, SnapshotPollerConfig};
use desk_runtime::{
    BackendLocator, ConnectionState, MarketUpdate, ReconnectConfig, StreamClient,
    StreamClientConfig, StreamEvent,
};

fn client_config(url: String, delay: Duration) -> StreamClientConfig {
    StreamClientConfig {
        url,
        reconnect: ReconnectConfig {
            delay,
            jitter_factor: 0.0,
        },
    }
}

#[tokio::test]
async fn known_frames_dispatch_once_each_and_bogus_is_dropped() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let frames = [
            r#"{"type":"market_update","symbol":"BTCUSDT","timestamp":"2026-08-29T10:00:00Z","price":45123.5}"#
                .to_string(),
            r#"{"type":"heartbeat","seq":1}"#.to_string(),
            "this is not json".to_string(),
            r#"{"type":"new_signal","signal":{"id":"7f3c2a9e-1b4d-4c8a-9f0e-2d6b5a8c7e1f","timestamp":"2026-08-29T10:05:00Z","symbol":"BTCUSDT","signal_type":"BUY","model":"TREND_CONTINUATION","entry_price":45123.5,"stop_loss":44800,"take_profit":46000,"confidence_score":82,"reasoning":"cvd divergence"}}"#
                .to_string(),
        ];
        for frame in frames {
            ws.send(Message::text(frame)).await.unwrap();
        }

        // Keep the connection open until the client closes it.
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (tx, mut rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();
    let client = StreamClient::new(
        client_config(format!("ws://{addr}/api/ws"), Duration::from_millis(50)),
        tx,
        cancel.clone(),
    );
    let task = tokio::spawn(client.run());

    let mut updates = Vec::new();
    let mut signals = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while (updates.is_empty() || signals.is_empty()) && tokio::time::Instant::now() < deadline {
        match tokio::time::timeout(Duration::from_millis(500), rx.recv()).await {
            Ok(Some(StreamEvent::Update(update))) => updates.push(update),
            Ok(Some(StreamEvent::Signal(signal))) => signals.push(signal),
            Ok(Some(StreamEvent::State(_))) => {}
            Ok(None) | Err(_) => break,
        }
    }

    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].symbol, "BTCUSDT");
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].signal_type, "BUY");

    // Nothing else arrives for the bogus frames.
    let extra = tokio::time::timeout(Duration::from_millis(200), async {
        loop {
            match rx.recv().await {
                Some(StreamEvent::Update(_) | StreamEvent::Signal(_)) => break true,
                Some(StreamEvent::State(_)) => {}
                None => break false,
            }
        }
    })
    .await;
    assert!(extra.is_err(), "unexpected extra dispatch");

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn client_keeps_retrying_at_the_fixed_delay() {
    // Nothing listens on the target port.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (tx, mut rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();
    let client = StreamClient::new(
        client_config(format!("ws://{addr}/api/ws"), Duration::from_millis(40)),
        tx,
        cancel.clone(),
    );
    let task = tokio::spawn(client.run());

    tokio::time::sleep(Duration::from_millis(300)).await;
    cancel.cancel();
    task.await.unwrap();

    let mut connecting = 0;
    let mut connected = 0;
    while let Ok(event) = rx.try_recv() {
        if let StreamEvent::State(state) = event {
            match state {
                ConnectionState::Connecting => connecting += 1,
                ConnectionState::Connected => connected += 1,
                _ => {}
            }
        }
    }

    assert!(connecting >= 3, "expected repeated attempts, saw {connecting}");
    assert_eq!(connected, 0);
}

#[tokio::test]
async fn close_is_terminal_and_stops_connect_attempts() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let attempts = Arc::new(AtomicUsize::new(0));

    let server_attempts = Arc::clone(&attempts);
    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            server_attempts.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                if let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await {
                    while let Some(Ok(_)) = ws.next().await {}
                }
            });
        }
    });

    let delay = Duration::from_millis(40);
    let (tx, mut rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();
    let client = StreamClient::new(
        client_config(format!("ws://{addr}/api/ws"), delay),
        tx,
        cancel.clone(),
    );
    let task = tokio::spawn(client.run());

    // Wait until connected, then close.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let mut saw_connected = false;
    while !saw_connected && tokio::time::Instant::now() < deadline {
        if let Ok(Some(StreamEvent::State(ConnectionState::Connected))) =
            tokio::time::timeout(Duration::from_millis(500), rx.recv()).await
        {
            saw_connected = true;
        }
    }
    assert!(saw_connected);

    cancel.cancel();
    task.await.unwrap();

    let attempts_at_close = attempts.load(Ordering::SeqCst);
    tokio::time::sleep(delay * 4).await;
    assert_eq!(attempts.load(Ordering::SeqCst), attempts_at_close);

    // Closed is the last state the client reports.
    let mut last_state = None;
    while let Ok(event) = rx.try_recv() {
        if let StreamEvent::State(state) = event {
            last_state = Some(state);
        }
    }
    assert_eq!(last_state, Some(ConnectionState::Closed));
}

#[tokio::test]
async fn poller_feeds_snapshots_through_the_update_channel() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let body = r#"{"symbol":"BTCUSDT","candles":[{"symbol":"BTCUSDT","timestamp":"2026-08-29T10:00:00Z","open":45000,"high":45300,"low":44900,"close":45200,"volume":120.5}]}"#;
    let response = format!(
        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n{}",
        body.len(),
        body
    );

    tokio::spawn(async move {
        loop {
            let (mut stream, _) = listener.accept().await.unwrap();
            let response = response.clone();
            tokio::spawn(async move {
                let mut buf = [0_u8; 1024];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    let endpoint = BackendLocator::new(false, Some(format!("http://{addr}"))).resolve();
    let (tx, mut rx) = mpsc::channel::<MarketUpdate>(16);
    let cancel = CancellationToken::new();
    let poller = SnapshotPoller::new(
        SnapshotPollerConfig {
            endpoint,
            symbols: vec!["BTCUSDT".to_string()],
            interval: Duration::from_millis(100),
        },
        tx,
        cancel.clone(),
    );
    let task = tokio::spawn(poller.run());

    let update = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(update.symbol, "BTCUSDT");
    assert_eq!(update.price.to_string(), "45200");

    cancel.cancel();
    task.await.unwrap();
}
