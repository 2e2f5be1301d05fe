//! End-to-end tests against a real gateway on a random port.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use tilegate::backend::LocalBackend;
use tilegate::{Gateway, RequestKind, Route};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Helpers
// ============================================================================

async fn start() -> anyhow::Result<Gateway> {
    let stores = LocalBackend::store_pool();
    let gateway = Gateway::builder()
        .port(0)
        .alias("s1=zk1:2181/hbase")
        .pipeline("heat", Arc::new(LocalBackend::new(Arc::clone(&stores))))
        .pipeline("count", Arc::new(LocalBackend::new(stores)))
        .bind()
        .await?;
    Ok(gateway)
}

async fn connect(gateway: &Gateway, route: &Route) -> anyhow::Result<Client> {
    let (client, _) = connect_async(gateway.ws_url(route)).await?;
    Ok(client)
}

async fn send(client: &mut Client, frame: Value) -> anyhow::Result<()> {
    client.send(Message::Text(frame.to_string().into())).await?;
    Ok(())
}

async fn recv(client: &mut Client) -> anyhow::Result<Value> {
    loop {
        let message = timeout(RECV_TIMEOUT, client.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("connection closed"))??;
        if let Message::Text(text) = message {
            return Ok(serde_json::from_str(text.as_str())?);
        }
    }
}

async fn finish(gateway: Gateway, mut client: Client) -> anyhow::Result<()> {
    client.close(None).await?;
    let open = gateway.shutdown(Duration::from_secs(2)).await;
    assert_eq!(open, 0);
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_tile_request_round_trip() -> anyhow::Result<()> {
    let gateway = start().await?;
    let mut client = connect(&gateway, &Route::named(RequestKind::Tile, "heat")).await?;

    send(
        &mut client,
        json!({"type": "heat", "coord": {"x": 1, "y": 2, "z": 3}, "store": "s1"}),
    )
    .await?;
    let response = recv(&mut client).await?;

    assert_eq!(response["type"], "heat");
    assert_eq!(response["coord"], json!({"x": 1, "y": 2, "z": 3}));
    assert_eq!(response["store"], "s1");
    assert_eq!(response["success"], true);
    assert!(response.get("error").is_none());
    assert_eq!(response["row"], "03,1,2");
    assert!(response["digest"].is_string());

    finish(gateway, client).await
}

#[tokio::test]
async fn test_meta_request_on_default_route() -> anyhow::Result<()> {
    let gateway = start().await?;
    let mut client = connect(&gateway, &Route::default_pipeline(RequestKind::Meta)).await?;

    send(&mut client, json!({"type": "levels", "store": "s1", "index": "by_time"})).await?;
    let response = recv(&mut client).await?;

    assert_eq!(response["type"], "levels");
    assert_eq!(response["index"], "by_time");
    assert_eq!(response["success"], true);
    assert!(response.get("row").is_none());

    finish(gateway, client).await
}

#[tokio::test]
async fn test_malformed_frame_keeps_session_open() -> anyhow::Result<()> {
    let gateway = start().await?;
    let mut client = connect(&gateway, &Route::default_pipeline(RequestKind::Tile)).await?;

    client.send(Message::Text("{not json".into())).await?;
    let failure = recv(&mut client).await?;
    assert_eq!(failure["success"], false);
    assert!(failure["error"].as_str().unwrap_or_default().contains("unable to parse"));

    send(
        &mut client,
        json!({"type": "heat", "coord": {"x": 0, "y": 0, "z": 0}, "store": "s1"}),
    )
    .await?;
    let success = recv(&mut client).await?;
    assert_eq!(success["success"], true);
    assert_eq!(success["row"], "00,0,0");

    finish(gateway, client).await
}

#[tokio::test]
async fn test_fast_request_overtakes_slow_one() -> anyhow::Result<()> {
    let gateway = start().await?;
    let mut client = connect(&gateway, &Route::named(RequestKind::Tile, "heat")).await?;

    let started = Instant::now();
    send(
        &mut client,
        json!({"type": "heat", "coord": {"x": 1, "y": 1, "z": 1}, "store": "s1", "tag": "slow", "params": {"delay_ms": 300}}),
    )
    .await?;
    send(
        &mut client,
        json!({"type": "heat", "coord": {"x": 0, "y": 0, "z": 1}, "store": "s1", "tag": "fast"}),
    )
    .await?;

    let first = recv(&mut client).await?;
    assert_eq!(first["tag"], "fast");
    assert_eq!(first["coord"]["x"], 0);
    assert!(started.elapsed() < Duration::from_millis(300));

    let second = recv(&mut client).await?;
    assert_eq!(second["tag"], "slow");
    assert_eq!(second["coord"]["x"], 1);
    assert_eq!(second["params"]["delay_ms"], 300);
    assert_eq!(second["success"], true);

    finish(gateway, client).await
}

#[tokio::test]
async fn test_generation_error_is_sanitized() -> anyhow::Result<()> {
    let gateway = start().await?;
    let mut client = connect(&gateway, &Route::named(RequestKind::Tile, "count")).await?;

    send(
        &mut client,
        json!({
            "type": "count",
            "coord": {"x": 0, "y": 0, "z": 0},
            "store": "s1",
            "params": {"fail": "\u{1b}[1;31mregion offline\u{1b}[0m"}
        }),
    )
    .await?;
    let response = recv(&mut client).await?;

    assert_eq!(response["success"], false);
    assert_eq!(response["error"], "Generation failed: region offline");
    assert_eq!(response["store"], "s1");

    finish(gateway, client).await
}

#[tokio::test]
async fn test_unknown_routes_are_rejected() -> anyhow::Result<()> {
    let gateway = start().await?;

    for path in ["/nope", "/ws/tile/missing"] {
        let url = format!("ws://{}{path}", gateway.local_addr());
        match connect_async(url).await {
            Err(WsError::Http(response)) => assert_eq!(response.status(), 404),
            Err(other) => anyhow::bail!("unexpected error for {path}: {other}"),
            Ok(_) => anyhow::bail!("{path} should be rejected"),
        }
    }

    gateway.shutdown(Duration::from_secs(2)).await;
    Ok(())
}

#[tokio::test]
async fn test_sessions_are_independent() -> anyhow::Result<()> {
    let gateway = start().await?;
    let mut slow = connect(&gateway, &Route::named(RequestKind::Tile, "heat")).await?;
    let mut fast = connect(&gateway, &Route::named(RequestKind::Meta, "count")).await?;

    send(
        &mut slow,
        json!({"type": "heat", "coord": {"x": 0, "y": 0, "z": 0}, "store": "s1", "params": {"delay_ms": 200}}),
    )
    .await?;
    send(&mut fast, json!({"type": "levels", "store": "s2"})).await?;

    let started = Instant::now();
    assert_eq!(recv(&mut fast).await?["success"], true);
    assert!(started.elapsed() < Duration::from_millis(200));
    assert_eq!(recv(&mut slow).await?["success"], true);

    slow.close(None).await?;
    finish(gateway, fast).await
}
