//! WebSocket implementation of the agent conversation channel.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use crate::error::VoiceError;

use super::{AgentChannel, InboundMessage, OutboundMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// JSON-over-WebSocket channel keyed by agent and session id.
///
/// Connection parameters are retained so a transient transport drop can be
/// healed in place: `send` and `recv` re-establish the socket with the same
/// bounded backoff as the initial connect before surfacing a connection
/// error. An orderly close from the peer is not retried.
pub struct WebSocketChannel {
    url: String,
    api_key: Option<String>,
    attempts: u32,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl std::fmt::Debug for WebSocketChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketChannel")
            .field("url", &self.url)
            .field("attempts", &self.attempts)
            .finish_non_exhaustive()
    }
}

impl WebSocketChannel {
    /// Establish the channel, retrying transient failures with backoff.
    ///
    /// Credential rejection (401/403 on the handshake) is surfaced as an
    /// authentication error and never retried; anything else exhausts
    /// `attempts` before becoming a connection error.
    pub async fn connect(
        endpoint: &str,
        agent_id: &str,
        session_id: Uuid,
        api_key: Option<&str>,
        attempts: u32,
    ) -> Result<Self, VoiceError> {
        let separator = if endpoint.contains('?') { '&' } else { '?' };
        let url = format!("{endpoint}{separator}agent_id={agent_id}&session_id={session_id}");

        let ws = Self::establish(&url, api_key, attempts).await?;
        tracing::debug!(%session_id, "channel connected");

        let (sink, stream) = ws.split();
        Ok(Self {
            url,
            api_key: api_key.map(str::to_string),
            attempts,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }

    async fn establish(
        url: &str,
        api_key: Option<&str>,
        attempts: u32,
    ) -> Result<WsStream, VoiceError> {
        let mut backoff = Duration::from_millis(250);
        let mut last_error = String::from("no connection attempt made");

        for attempt in 1..=attempts.max(1) {
            match Self::handshake(url, api_key).await {
                Ok(ws) => {
                    tracing::debug!(attempt, "channel socket established");
                    return Ok(ws);
                }
                Err(err @ VoiceError::Authentication(_)) => return Err(err),
                Err(err) => {
                    tracing::warn!(attempt, attempts, error = %err, "channel connect failed");
                    last_error = err.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }

        Err(VoiceError::Connection(format!(
            "channel unreachable after {attempts} attempts: {last_error}"
        )))
    }

    async fn handshake(url: &str, api_key: Option<&str>) -> Result<WsStream, VoiceError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| VoiceError::Connection(format!("invalid endpoint: {e}")))?;
        if let Some(key) = api_key {
            let value = format!("Bearer {key}")
                .parse()
                .map_err(|_| VoiceError::Configuration("api key is not header-safe".into()))?;
            request.headers_mut().insert("authorization", value);
        }

        let (ws, _response) = connect_async(request).await.map_err(|err| match err {
            WsError::Http(response) if matches!(response.status().as_u16(), 401 | 403) => {
                VoiceError::Authentication(format!(
                    "credentials rejected upstream ({})",
                    response.status()
                ))
            }
            other => VoiceError::Connection(other.to_string()),
        })?;

        Ok(ws)
    }

    /// Replace both halves of a dropped socket with a fresh connection.
    async fn reconnect(&self) -> Result<(), VoiceError> {
        let ws = Self::establish(&self.url, self.api_key.as_deref(), self.attempts).await?;
        let (sink, stream) = ws.split();
        *self.sink.lock().await = sink;
        *self.stream.lock().await = stream;
        tracing::info!("channel reconnected");
        Ok(())
    }
}

#[async_trait]
impl AgentChannel for WebSocketChannel {
    async fn send(&self, message: OutboundMessage) -> Result<(), VoiceError> {
        let text = serde_json::to_string(&message)?;
        let first = self.sink.lock().await.send(Message::Text(text.clone())).await;
        let Err(err) = first else {
            return Ok(());
        };

        tracing::warn!(error = %err, "send hit a dropped channel, reconnecting");
        self.reconnect().await?;
        self.sink
            .lock()
            .await
            .send(Message::Text(text))
            .await
            .map_err(|e| VoiceError::Connection(e.to_string()))
    }

    async fn recv(&self) -> Result<Option<InboundMessage>, VoiceError> {
        loop {
            // The guard must not be held across reconnection, which swaps
            // the stream half out from under it.
            let next = {
                let mut stream = self.stream.lock().await;
                stream.next().await
            };
            match next {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(serde_json::from_str(&text)?));
                }
                // Control frames and binary payloads are not part of the
                // event protocol.
                Some(Ok(Message::Ping(_)))
                | Some(Ok(Message::Pong(_)))
                | Some(Ok(Message::Binary(_)))
                | Some(Ok(Message::Frame(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "recv hit a dropped channel, reconnecting");
                    self.reconnect().await?;
                }
            }
        }
    }

    fn supports_cancellation(&self) -> bool {
        true
    }

    async fn close(&self) -> Result<(), VoiceError> {
        self.sink
            .lock()
            .await
            .close()
            .await
            .map_err(|e| VoiceError::Connection(e.to_string()))
    }
}
