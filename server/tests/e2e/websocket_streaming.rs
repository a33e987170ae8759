//! Connection -> request -> streamed audio, over a real socket.

use futures_util::SinkExt;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;
use tts_gateway::session::SessionState;

use crate::common::*;

#[tokio::test]
async fn test_welcome_and_registration() {
    let server = spawn_server().await;
    let (_ws, welcome) = connect_welcomed(&server).await;

    let connection_id = welcome["connection_id"].as_str().unwrap();
    assert!(!welcome["request_id"].as_str().unwrap().is_empty());
    assert_eq!(welcome["version"], "1.0.0");
    assert_eq!(welcome["supported_formats"], json!(["wav"]));
    assert_eq!(welcome["voice_info"]["available_voices"], 2);
    assert_eq!(welcome["voice_info"]["current_voice"], "tone-low");
    assert!(welcome["timestamp"].is_number());

    // The session turns active right after the welcome is written.
    let registry = server.server.registry();
    let mut state = None;
    for _ in 0..40 {
        state = registry.get(connection_id).map(|e| e.state);
        if state == Some(SessionState::Active) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }
    assert_eq!(state, Some(SessionState::Active));
}

#[tokio::test]
async fn test_ping_yields_exactly_one_pong() {
    let server = spawn_server().await;
    let (mut ws, _) = connect_welcomed(&server).await;

    send_json(&mut ws, json!({ "type": "ping", "request_id": "X" })).await;
    send_json(&mut ws, json!({ "type": "ping", "request_id": "Y" })).await;

    let first = recv_json(&mut ws).await;
    assert_eq!(first["type"], "pong");
    assert_eq!(first["request_id"], "X");

    let second = recv_json(&mut ws).await;
    assert_eq!(second["type"], "pong");
    assert_eq!(second["request_id"], "Y");
}

#[tokio::test]
async fn test_synthesis_stream_is_complete_and_consistent() {
    let server = spawn_server().await;
    let (mut ws, _) = connect_welcomed(&server).await;
    let text = "Hello, this is a streaming synthesis test.";

    send_json(&mut ws, json!({ "type": "synthesize", "request_id": "req-1", "text": text })).await;
    let messages = recv_until(&mut ws, &["synthesis_complete", "error"]).await;

    assert_eq!(messages[0]["text_length"], text.chars().count());
    let audio = assert_well_formed_stream(&messages, "req-1");
    assert_eq!(audio, expected_audio(text));
    // 1024-byte chunks in the test config
    assert_eq!(messages.len() - 2, expected_audio(text).len().div_ceil(1024));

    assert_eq!(server.scratch_entries(), 0);
}

#[tokio::test]
async fn test_generated_request_id_is_consistent() {
    let server = spawn_server().await;
    let (mut ws, _) = connect_welcomed(&server).await;

    send_json(&mut ws, json!({ "type": "synthesize", "text": "no id given" })).await;
    let messages = recv_until(&mut ws, &["synthesis_complete", "error"]).await;

    let request_id = messages[0]["request_id"].as_str().unwrap().to_string();
    assert!(!request_id.is_empty());
    assert_well_formed_stream(&messages, &request_id);
}

#[tokio::test]
async fn test_blank_text_yields_single_error() {
    let server = spawn_server().await;
    let (mut ws, _) = connect_welcomed(&server).await;

    for (id, text) in [("empty", ""), ("blank", "   \n\t ")] {
        send_json(&mut ws, json!({ "type": "synthesize", "request_id": id, "text": text })).await;
        send_json(&mut ws, json!({ "type": "ping", "request_id": "after" })).await;

        let error = recv_json(&mut ws).await;
        assert_eq!(error["type"], "error");
        assert_eq!(error["request_id"], id);
        assert_eq!(error["message"], "text must not be empty");

        // Nothing else was produced for the rejected request.
        let next = recv_json(&mut ws).await;
        assert_eq!(next["type"], "pong");
    }
}

#[tokio::test]
async fn test_text_over_limit_is_rejected() {
    let server = spawn_server().await;
    let (mut ws, _) = connect_welcomed(&server).await;

    let text = "a".repeat(10_001);
    send_json(&mut ws, json!({ "type": "synthesize", "request_id": "long", "text": text })).await;
    send_json(&mut ws, json!({ "type": "ping" })).await;

    let error = recv_json(&mut ws).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["request_id"], "long");
    assert!(error["message"].as_str().unwrap().contains("text exceeds limit"));
    assert_eq!(recv_json(&mut ws).await["type"], "pong");
}

#[tokio::test]
async fn test_malformed_payload_keeps_session_open() {
    let server = spawn_server().await;
    let (mut ws, _) = connect_welcomed(&server).await;

    send_raw(&mut ws, "{this is not json").await;
    let error = recv_json(&mut ws).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["request_id"], "invalid");

    send_json(&mut ws, json!({ "type": "synthesize", "request_id": "ok", "text": "recovered" })).await;
    let messages = recv_until(&mut ws, &["synthesis_complete", "error"]).await;
    assert_eq!(assert_well_formed_stream(&messages, "ok"), expected_audio("recovered"));
}

#[tokio::test]
async fn test_unknown_type_echoes_request_id() {
    let server = spawn_server().await;
    let (mut ws, _) = connect_welcomed(&server).await;

    send_json(&mut ws, json!({ "type": "dance", "request_id": "r-9" })).await;
    let error = recv_json(&mut ws).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["request_id"], "r-9");
    assert!(error["message"].as_str().unwrap().contains("dance"));

    send_json(&mut ws, json!({ "type": "ping", "request_id": "still-here" })).await;
    assert_eq!(recv_json(&mut ws).await["request_id"], "still-here");
}

#[tokio::test]
async fn test_get_voices() {
    let server = spawn_server().await;
    let (mut ws, _) = connect_welcomed(&server).await;

    send_json(&mut ws, json!({ "type": "get_voices", "request_id": "v" })).await;
    let info = recv_json(&mut ws).await;
    assert_eq!(info["type"], "voice_info");
    assert_eq!(info["request_id"], "v");
    assert_eq!(info["data"]["voice_index"], 0);
    assert_eq!(info["data"]["rate"], 150);
    assert_eq!(
        info["data"]["voices"],
        json!([{ "id": 0, "name": "tone-low" }, { "id": 1, "name": "tone-high" }])
    );
}

#[tokio::test]
async fn test_engine_failure_reports_error_without_completion() {
    let server = spawn_server().await;
    let (mut ws, _) = connect_welcomed(&server).await;

    send_json(&mut ws, json!({ "type": "synthesize", "request_id": "bad", "text": "please FAIL now" })).await;
    let messages = recv_until(&mut ws, &["synthesis_complete", "error"]).await;

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["type"], "synthesis_start");
    assert_eq!(messages[1]["type"], "error");
    assert_eq!(messages[1]["request_id"], "bad");
    assert!(messages[1]["message"].as_str().unwrap().contains("jammed"));
    assert_eq!(server.scratch_entries(), 0);

    // The session is still usable.
    send_json(&mut ws, json!({ "type": "synthesize", "request_id": "good", "text": "fine now" })).await;
    let messages = recv_until(&mut ws, &["synthesis_complete", "error"]).await;
    assert_well_formed_stream(&messages, "good");
}

#[tokio::test]
async fn test_binary_frames_are_decoded_as_json() {
    let server = spawn_server().await;
    let (mut ws, _) = connect_welcomed(&server).await;

    let payload = json!({ "type": "ping", "request_id": "bin" }).to_string();
    ws.send(Message::Binary(payload.into_bytes().into())).await.unwrap();
    let pong = recv_json(&mut ws).await;
    assert_eq!(pong["type"], "pong");
    assert_eq!(pong["request_id"], "bin");
}

#[tokio::test]
async fn test_binary_frame_with_invalid_utf8_is_rejected() {
    let server = spawn_server().await;
    let (mut ws, _) = connect_welcomed(&server).await;

    let mut payload = br#"{"type":"synthesize","request_id":"u","text":"ab"#.to_vec();
    payload.push(0xFF);
    payload.extend_from_slice(br#"cd"}"#);
    ws.send(Message::Binary(payload.into())).await.unwrap();
    send_json(&mut ws, json!({ "type": "ping", "request_id": "next" })).await;

    let error = recv_json(&mut ws).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["request_id"], "invalid");
    assert!(error["message"].as_str().unwrap().contains("UTF-8"));

    // Nothing was synthesized for the rejected frame.
    let pong = recv_json(&mut ws).await;
    assert_eq!(pong["type"], "pong");
    assert_eq!(pong["request_id"], "next");
}

#[tokio::test]
async fn test_unused_field_of_wrong_type_is_ignored() {
    let server = spawn_server().await;
    let (mut ws, _) = connect_welcomed(&server).await;

    send_raw(&mut ws, r#"{"type":"ping","request_id":"X","text":5}"#).await;
    let pong = recv_json(&mut ws).await;
    assert_eq!(pong["type"], "pong");
    assert_eq!(pong["request_id"], "X");

    send_raw(&mut ws, r#"{"type":"synthesize","request_id":"num","text":5}"#).await;
    let error = recv_json(&mut ws).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["request_id"], "num");
    assert_eq!(error["message"], "field text must be a string");
}

#[tokio::test]
async fn test_concurrent_sessions_stream_independently() {
    let server = spawn_server().await;
    let (mut a, _) = connect_welcomed(&server).await;
    let (mut b, _) = connect_welcomed(&server).await;

    let text_a = "First session speaks about apples and oranges.";
    let text_b = "Second session reads a completely different sentence.";
    send_json(&mut a, json!({ "type": "synthesize", "request_id": "A", "text": text_a })).await;
    send_json(&mut b, json!({ "type": "synthesize", "request_id": "B", "text": text_b })).await;

    let (messages_a, messages_b) = tokio::join!(
        recv_until(&mut a, &["synthesis_complete", "error"]),
        recv_until(&mut b, &["synthesis_complete", "error"]),
    );

    assert!(messages_a.iter().all(|m| m["request_id"] == "A"));
    assert!(messages_b.iter().all(|m| m["request_id"] == "B"));
    assert_eq!(assert_well_formed_stream(&messages_a, "A"), expected_audio(text_a));
    assert_eq!(assert_well_formed_stream(&messages_b, "B"), expected_audio(text_b));
}

#[tokio::test]
async fn test_disconnect_removes_session() {
    let server = spawn_server().await;
    let (mut ws, _) = connect_welcomed(&server).await;
    assert_eq!(server.server.registry().len(), 1);

    ws.close(None).await.unwrap();
    drop(ws);

    assert!(
        server
            .server
            .registry()
            .wait_until_empty(std::time::Duration::from_secs(5))
            .await
    );
}
