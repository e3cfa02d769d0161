//! WebSocket halves as session transports

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use beacon_core::{Error, Inbound, Outbound, Result};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;

/// A peer that stopped reading can block the close handshake indefinitely.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct WsOutbound(SplitSink<WebSocket, Message>);

pub struct WsInbound(SplitStream<WebSocket>);

/// Split an upgraded socket into session transports
pub fn split(socket: WebSocket) -> (WsOutbound, WsInbound) {
    let (sink, stream) = socket.split();
    (WsOutbound(sink), WsInbound(stream))
}

#[async_trait]
impl Outbound for WsOutbound {
    async fn deliver(&mut self, message: &str) -> Result<()> {
        self.0
            .send(Message::Text(message.to_string()))
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }

    async fn close(&mut self) {
        let closing = async {
            let _ = self.0.send(Message::Close(None)).await;
            let _ = self.0.close().await;
        };
        if tokio::time::timeout(CLOSE_TIMEOUT, closing).await.is_err() {
            tracing::debug!("WebSocket close timed out");
        }
    }
}

#[async_trait]
impl Inbound for WsInbound {
    async fn receive(&mut self) -> Option<Result<String>> {
        while let Some(frame) = self.0.next().await {
            match frame {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(_)) => return None,
                // Pings are answered by the socket itself; binary frames are ignored.
                Ok(_) => continue,
                Err(e) => return Some(Err(Error::Transport(e.to_string()))),
            }
        }
        None
    }
}
