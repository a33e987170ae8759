//! Graceful stop: no new connections, open sessions drained, no scratch left.

use std::time::Duration;

use serde_json::json;

use crate::common::*;

#[tokio::test]
async fn test_stop_closes_sessions_and_refuses_new_connections() {
    let server = spawn_server().await;
    let (mut ws, _) = connect_welcomed(&server).await;

    send_json(&mut ws, json!({ "type": "synthesize", "request_id": "pre", "text": "before stop" })).await;
    recv_until(&mut ws, &["synthesis_complete", "error"]).await;

    server.server.stop();
    server.server.stop();

    let result = tokio::time::timeout(Duration::from_secs(10), server.task)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());

    assert!(server.server.registry().is_empty());
    assert!(!server.server.state().adapter.is_running());
    assert_eq!(std::fs::read_dir(server.scratch.path()).unwrap().count(), 0);

    let url = format!("ws://{}/", server.addr);
    assert!(tokio_tungstenite::connect_async(url).await.is_err());
}

#[tokio::test]
async fn test_in_flight_request_finishes_during_shutdown() {
    let server = spawn_server_with(ToneEngine::slow(Duration::from_millis(300))).await;
    let (mut ws, _) = connect_welcomed(&server).await;

    send_json(&mut ws, json!({ "type": "synthesize", "request_id": "slow", "text": "take your time" })).await;
    let start = recv_json(&mut ws).await;
    assert_eq!(start["type"], "synthesis_start");

    server.server.handle().stop();

    let mut messages = vec![start];
    messages.extend(recv_until(&mut ws, &["synthesis_complete", "error"]).await);
    assert_eq!(assert_well_formed_stream(&messages, "slow"), expected_audio("take your time"));

    tokio::time::timeout(Duration::from_secs(10), server.task)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
    assert_eq!(std::fs::read_dir(server.scratch.path()).unwrap().count(), 0);
}
