//! WebSocket duplex adapter
//!
//! Implements [`ClientChannel`] over a tokio-tungstenite WebSocket. Raw
//! terminal output travels as binary frames; structured events (status,
//! error, ready, auth prompts, resize) travel as JSON text frames. The
//! HTTP/upgrade layer that produces the `WebSocketStream` is the embedder's
//! business.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::debug;

use crate::channel::{AuthPrompt, ClientChannel, ClientEvent, ServerEvent, StatusPhase};
use crate::error::BridgeError;

/// Outbound JSON frames (server to client).
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ServerFrame {
    Status { phase: StatusPhase, message: String },
    Error { message: String },
    Ready,
    AuthPrompt { prompts: Vec<AuthPrompt> },
}

/// Inbound JSON frames (client to server).
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ClientFrame {
    Data { data: String },
    Resize { rows: u16, cols: u16 },
    AuthResponse { answers: Vec<String> },
}

/// One client's WebSocket connection, as seen by the bridge.
pub struct WsChannel<S> {
    inner: WebSocketStream<S>,
    closed: bool,
}

impl<S> WsChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already-upgraded WebSocket stream.
    pub fn new(inner: WebSocketStream<S>) -> Self {
        Self {
            inner,
            closed: false,
        }
    }
}

#[async_trait]
impl<S> ClientChannel for WsChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, event: ServerEvent) -> Result<(), BridgeError> {
        if self.closed {
            return Err(BridgeError::ClientDisconnected);
        }

        let message = match event {
            ServerEvent::Data(bytes) => Message::Binary(bytes.to_vec()),
            ServerEvent::Status { phase, message } => {
                json_frame(&ServerFrame::Status { phase, message })?
            }
            ServerEvent::Error { message } => json_frame(&ServerFrame::Error { message })?,
            ServerEvent::Ready => json_frame(&ServerFrame::Ready)?,
            ServerEvent::AuthPrompt { prompts } => {
                json_frame(&ServerFrame::AuthPrompt { prompts })?
            }
        };

        self.inner
            .send(message)
            .await
            .map_err(|_| BridgeError::ClientDisconnected)
    }

    async fn recv(&mut self) -> Option<ClientEvent> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Binary(data)) => return Some(ClientEvent::Data(Bytes::from(data))),
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientFrame>(&text) {
                    Ok(ClientFrame::Data { data }) => {
                        return Some(ClientEvent::Data(Bytes::from(data.into_bytes())))
                    }
                    Ok(ClientFrame::Resize { rows, cols }) => {
                        return Some(ClientEvent::Resize { rows, cols })
                    }
                    Ok(ClientFrame::AuthResponse { answers }) => {
                        return Some(ClientEvent::AuthResponse { answers })
                    }
                    // Legacy clients send keystrokes as plain text.
                    Err(_) => return Some(ClientEvent::Data(Bytes::from(text.into_bytes()))),
                },
                Ok(Message::Close(_)) => {
                    debug!("websocket close frame received");
                    return None;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                Err(e) => {
                    debug!("websocket receive error: {}", e);
                    return None;
                }
            }
        }
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let _ = self.inner.close(None).await;
        }
    }
}

fn json_frame(frame: &ServerFrame) -> Result<Message, BridgeError> {
    serde_json::to_string(frame)
        .map(Message::Text)
        .map_err(|e| BridgeError::ProtocolError(format!("frame encoding failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::protocol::Role;

    async fn ws_pair() -> (
        WsChannel<tokio::io::DuplexStream>,
        WebSocketStream<tokio::io::DuplexStream>,
    ) {
        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        let server =
            WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        let client =
            WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        (WsChannel::new(server), client)
    }

    #[tokio::test]
    async fn binary_frames_are_raw_keystrokes() {
        let (mut channel, mut client) = ws_pair().await;

        client
            .send(Message::Binary(vec![0x1b, b'[', b'A']))
            .await
            .unwrap();
        assert_eq!(
            channel.recv().await,
            Some(ClientEvent::Data(Bytes::from_static(&[0x1b, b'[', b'A'])))
        );
    }

    #[tokio::test]
    async fn resize_frames_decode_as_resize_events() {
        let (mut channel, mut client) = ws_pair().await;

        client
            .send(Message::Text(
                r#"{"type":"resize","rows":40,"cols":120}"#.into(),
            ))
            .await
            .unwrap();
        assert_eq!(
            channel.recv().await,
            Some(ClientEvent::Resize { rows: 40, cols: 120 })
        );
    }

    #[tokio::test]
    async fn auth_responses_decode() {
        let (mut channel, mut client) = ws_pair().await;

        client
            .send(Message::Text(
                r#"{"type":"authResponse","answers":["123456"]}"#.into(),
            ))
            .await
            .unwrap();
        assert_eq!(
            channel.recv().await,
            Some(ClientEvent::AuthResponse {
                answers: vec!["123456".into()]
            })
        );
    }

    #[tokio::test]
    async fn unparseable_text_falls_back_to_raw_data() {
        let (mut channel, mut client) = ws_pair().await;

        client.send(Message::Text("ls -la\r".into())).await.unwrap();
        assert_eq!(
            channel.recv().await,
            Some(ClientEvent::Data(Bytes::from_static(b"ls -la\r")))
        );
    }

    #[tokio::test]
    async fn status_goes_out_as_json_and_data_as_binary() {
        let (mut channel, mut client) = ws_pair().await;

        channel
            .send(ServerEvent::Status {
                phase: StatusPhase::AuthInProgress,
                message: "hold on".into(),
            })
            .await
            .unwrap();
        channel
            .send(ServerEvent::Data(Bytes::from_static(b"motd\r\n")))
            .await
            .unwrap();

        match client.next().await.unwrap().unwrap() {
            Message::Text(text) => {
                assert!(text.contains(r#""type":"status""#));
                assert!(text.contains(r#""phase":"auth_in_progress""#));
            }
            other => panic!("expected text frame, got {:?}", other),
        }
        match client.next().await.unwrap().unwrap() {
            Message::Binary(data) => assert_eq!(data, b"motd\r\n"),
            other => panic!("expected binary frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn client_close_surfaces_as_none() {
        let (mut channel, mut client) = ws_pair().await;
        client.close(None).await.unwrap();
        assert_eq!(channel.recv().await, None);
    }
}
