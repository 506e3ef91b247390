// WebSocket support for Trellis
//
// Message bridging, connection handles, and named broadcast channels.
// The HTTP upgrade handshake itself belongs to the gateway; these
// utilities take over once a socket stream exists.

use crate::Error;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio_tungstenite::tungstenite::Message as TungsteniteMessage;
use tokio_tungstenite::WebSocketStream;
use tracing::warn;

/// WebSocket message type
#[derive(Debug, Clone)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

impl From<TungsteniteMessage> for WsMessage {
    fn from(msg: TungsteniteMessage) -> Self {
        match msg {
            TungsteniteMessage::Text(text) => WsMessage::Text(text.to_string()),
            TungsteniteMessage::Binary(data) => WsMessage::Binary(data.to_vec()),
            TungsteniteMessage::Ping(data) => WsMessage::Ping(data.to_vec()),
            TungsteniteMessage::Pong(data) => WsMessage::Pong(data.to_vec()),
            _ => WsMessage::Close,
        }
    }
}

impl From<WsMessage> for TungsteniteMessage {
    fn from(msg: WsMessage) -> Self {
        match msg {
            WsMessage::Text(text) => TungsteniteMessage::text(text),
            WsMessage::Binary(data) => TungsteniteMessage::binary(data),
            WsMessage::Ping(data) => TungsteniteMessage::Ping(data.into()),
            WsMessage::Pong(data) => TungsteniteMessage::Pong(data.into()),
            WsMessage::Close => TungsteniteMessage::Close(None),
        }
    }
}

/// Handle for sending messages to one WebSocket connection
pub struct WsConnection {
    id: String,
    tx: broadcast::Sender<WsMessage>,
}

impl WsConnection {
    pub fn new(id: String) -> (Self, broadcast::Receiver<WsMessage>) {
        let (tx, rx) = broadcast::channel(100);
        (Self { id, tx }, rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sender(&self) -> broadcast::Sender<WsMessage> {
        self.tx.clone()
    }

    pub async fn send(&self, message: WsMessage) -> Result<(), Error> {
        self.tx
            .send(message)
            .map_err(|e| Error::Internal(format!("Failed to send message: {}", e)))?;
        Ok(())
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), Error> {
        self.send(WsMessage::Text(text.into())).await
    }

    pub async fn send_json<T: serde::Serialize>(&self, data: &T) -> Result<(), Error> {
        let json = serde_json::to_string(data).map_err(|e| Error::Serialization(e.to_string()))?;
        self.send_text(json).await
    }
}

/// Named channel broadcasting to multiple connections
pub struct WsChannel {
    name: String,
    connections: Arc<RwLock<HashMap<String, broadcast::Sender<WsMessage>>>>,
}

impl WsChannel {
    pub fn new(name: String) -> Self {
        Self {
            name,
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn add_connection(&self, id: String, tx: broadcast::Sender<WsMessage>) {
        let mut connections = self.connections.write().await;
        connections.insert(id, tx);
    }

    pub async fn remove_connection(&self, id: &str) {
        let mut connections = self.connections.write().await;
        connections.remove(id);
    }

    pub async fn broadcast(&self, message: WsMessage) -> Result<(), Error> {
        let connections = self.connections.read().await;
        for tx in connections.values() {
            let _ = tx.send(message.clone());
        }
        Ok(())
    }

    pub async fn broadcast_text(&self, text: impl Into<String>) -> Result<(), Error> {
        self.broadcast(WsMessage::Text(text.into())).await
    }

    pub async fn broadcast_json<T: serde::Serialize>(&self, data: &T) -> Result<(), Error> {
        let json = serde_json::to_string(data).map_err(|e| Error::Serialization(e.to_string()))?;
        self.broadcast_text(json).await
    }

    pub async fn connection_count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }
}

/// Registry of named channels
#[derive(Default)]
pub struct WsChannelRegistry {
    channels: Arc<RwLock<HashMap<String, Arc<WsChannel>>>>,
}

impl WsChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_create(&self, name: &str) -> Arc<WsChannel> {
        let mut channels = self.channels.write().await;
        channels
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(WsChannel::new(name.to_string())))
            .clone()
    }

    pub async fn get(&self, name: &str) -> Option<Arc<WsChannel>> {
        let channels = self.channels.read().await;
        channels.get(name).cloned()
    }

    pub async fn remove(&self, name: &str) {
        let mut channels = self.channels.write().await;
        channels.remove(name);
    }
}

/// Drive a WebSocket stream, feeding incoming messages to a handler
/// until the peer closes or the handler fails.
pub async fn handle_socket<S, F, Fut>(
    mut stream: WebSocketStream<S>,
    mut handler: F,
) -> Result<(), Error>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    F: FnMut(WsMessage) -> Fut,
    Fut: std::future::Future<Output = Result<(), Error>>,
{
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(msg) => {
                if msg.is_close() {
                    break;
                }
                let ws_msg: WsMessage = msg.into();
                if let Err(e) = handler(ws_msg).await {
                    warn!(error = %e, "WebSocket handler error");
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "WebSocket stream error");
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connection_send_reaches_receiver() {
        let (conn, mut rx) = WsConnection::new("c1".to_string());
        conn.send_text("hello").await.unwrap();
        match rx.recv().await.unwrap() {
            WsMessage::Text(text) => assert_eq!(text, "hello"),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn channel_broadcasts_to_all_connections() {
        let channel = WsChannel::new("updates".to_string());
        let (a, mut rx_a) = WsConnection::new("a".to_string());
        let (b, mut rx_b) = WsConnection::new("b".to_string());
        channel.add_connection(a.id().to_string(), a.sender()).await;
        channel.add_connection(b.id().to_string(), b.sender()).await;

        channel.broadcast_text("ping").await.unwrap();

        assert!(matches!(rx_a.recv().await.unwrap(), WsMessage::Text(_)));
        assert!(matches!(rx_b.recv().await.unwrap(), WsMessage::Text(_)));
        assert_eq!(channel.connection_count().await, 2);

        channel.remove_connection("a").await;
        assert_eq!(channel.connection_count().await, 1);
    }

    #[tokio::test]
    async fn registry_reuses_channels() {
        let registry = WsChannelRegistry::new();
        let first = registry.get_or_create("room").await;
        let second = registry.get_or_create("room").await;
        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.get("other").await.is_none());
        registry.remove("room").await;
        assert!(registry.get("room").await.is_none());
    }

    #[tokio::test]
    async fn json_broadcast_serializes() {
        let channel = WsChannel::new("json".to_string());
        let (conn, mut rx) = WsConnection::new("c".to_string());
        channel
            .add_connection(conn.id().to_string(), conn.sender())
            .await;
        channel
            .broadcast_json(&serde_json::json!({"n": 1}))
            .await
            .unwrap();
        match rx.recv().await.unwrap() {
            WsMessage::Text(text) => assert_eq!(text, r#"{"n":1}"#),
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
