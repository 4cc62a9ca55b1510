//! WebSocket channel behavior against a local server.

use std::sync::{Arc, Mutex};

use futures::SinkExt;
use tokio::net::TcpListener;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{
    accept_async, accept_hdr_async,
    tungstenite::{
        handshake::server::{Request, Response},
        Message,
    },
};
use uuid::Uuid;

use vivavoce::channel::{AgentChannel, InboundMessage, WebSocketChannel};
use vivavoce::error::VoiceError;

#[tokio::test(flavor = "multi_thread")]
async fn recv_survives_a_transport_drop_and_resumes_on_a_fresh_socket() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let address = listener
        .local_addr()
        .expect("local addr should be available");

    let resumed_query = Arc::new(Mutex::new(String::new()));
    let resumed_query_capture = Arc::clone(&resumed_query);
    let server = tokio::spawn(async move {
        // First connection dies without a close handshake.
        let (stream, _) = listener.accept().await.expect("server should accept");
        let ws = accept_async(stream).await.expect("handshake should succeed");
        drop(ws);

        // Second connection delivers the event the client was waiting on.
        let (stream, _) = listener.accept().await.expect("server should re-accept");
        let query_capture = Arc::clone(&resumed_query_capture);
        let mut ws = accept_hdr_async(stream, move |req: &Request, response: Response| {
            *query_capture.lock().expect("query lock should not poison") =
                req.uri().query().unwrap_or_default().to_string();
            Ok(response)
        })
        .await
        .expect("re-handshake should succeed");
        ws.send(Message::Text(r#"{"type":"turn_ended"}"#.to_string()))
            .await
            .expect("event should send");
        // Hold the socket open until the client is done reading.
        let _ = futures::StreamExt::next(&mut ws).await;
    });

    let session_id = Uuid::new_v4();
    let channel = WebSocketChannel::connect(
        &format!("ws://{address}"),
        "agent-1",
        session_id,
        None,
        3,
    )
    .await
    .expect("initial connect should succeed");

    let received = timeout(Duration::from_secs(2), channel.recv())
        .await
        .expect("recv should not hang across the drop")
        .expect("dropped socket should heal");
    assert_eq!(received, Some(InboundMessage::TurnEnded));

    // The replacement socket carried the original session parameters.
    let query = resumed_query.lock().expect("query lock should not poison").clone();
    assert!(query.contains("agent_id=agent-1"));
    assert!(query.contains(&format!("session_id={session_id}")));

    channel.close().await.expect("close should succeed");
    server.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn orderly_peer_close_ends_the_stream_without_reconnecting() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let address = listener
        .local_addr()
        .expect("local addr should be available");

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("server should accept");
        let mut ws = accept_async(stream).await.expect("handshake should succeed");
        ws.close(None).await.expect("close frame should send");
        // Dropping the listener here means any reconnect attempt would fail
        // rather than be absorbed silently.
        drop(listener);
    });

    let channel =
        WebSocketChannel::connect(&format!("ws://{address}"), "agent-1", Uuid::new_v4(), None, 3)
            .await
            .expect("connect should succeed");

    let received = timeout(Duration::from_secs(2), channel.recv())
        .await
        .expect("recv should resolve")
        .expect("orderly close is not an error");
    assert_eq!(received, None);

    server.await.expect("server task should finish");
}

#[tokio::test]
async fn connect_surfaces_connection_error_when_the_endpoint_is_down() {
    // Bind then drop to get a port with nothing listening on it.
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let address = listener
        .local_addr()
        .expect("local addr should be available");
    drop(listener);

    let err = WebSocketChannel::connect(
        &format!("ws://{address}"),
        "agent-1",
        Uuid::new_v4(),
        None,
        1,
    )
    .await
    .expect_err("nothing is listening");
    assert!(matches!(err, VoiceError::Connection(_)));
}
