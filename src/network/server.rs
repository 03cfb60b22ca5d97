//! WebSocket Game Server
//!
//! Async WebSocket transport for the trivia matchmaker. Accepts
//! connections, decodes JSON frames, and feeds events to the session
//! controller. Malformed or out-of-place events are logged and dropped;
//! nothing a single client sends can crash the process or touch another
//! room.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::content::ContentPool;
use crate::game::room::ConnectionId;
use crate::network::controller::SessionController;
use crate::network::protocol::{ClientMessage, ServerMessage};
use crate::SESSION_DURATION_SECS;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Fixed match duration from room creation.
    pub session_duration: Duration,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().unwrap(),
            max_connections: 1000,
            session_duration: Duration::from_secs(SESSION_DURATION_SECS),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// The matchmaking state machine.
    controller: Arc<SessionController>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a server with the built-in question set.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_content(config, ContentPool::default())
    }

    /// Create a server over a custom question set.
    pub fn with_content(config: ServerConfig, content: ContentPool) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let controller = Arc::new(SessionController::new(content, config.session_duration));

        Self {
            config,
            controller,
            shutdown_tx,
        }
    }

    /// The controller backing this server.
    pub fn controller(&self) -> &Arc<SessionController> {
        &self.controller
    }

    /// Run the accept loop until shutdown.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Trivia duel server listening on {}", self.config.bind_addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.controller.connection_count().await >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Spawn the read/write tasks for one connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let controller = Arc::clone(&self.controller);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

            let connection_id = controller.connect(msg_tx).await;

            // Writer task: serialize outbound events in channel order.
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                match ClientMessage::from_json(&text) {
                                    Ok(event) => {
                                        Self::dispatch(&controller, connection_id, event).await;
                                    }
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                    }
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }

            sender_task.abort();
            controller.disconnect(connection_id).await;
            info!("Client {} cleaned up", addr);
        });
    }

    /// Route one decoded event. Controller rejections are benign: the
    /// room may have just ended or the event arrived in the wrong state.
    async fn dispatch(
        controller: &Arc<SessionController>,
        id: ConnectionId,
        event: ClientMessage,
    ) {
        let result = match event {
            ClientMessage::JoinQueue { character } => {
                Arc::clone(controller).join_queue(id, character).await
            }
            ClientMessage::RequestQuestion { room } => {
                controller.request_question(id, &room).await
            }
            ClientMessage::Answer {
                room,
                index,
                answer,
            } => controller.submit_answer(id, &room, index, &answer).await,
        };

        if let Err(e) = result {
            debug!(connection = %id, "Ignored event: {}", e);
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.session_duration, Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_server_creation() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let server = GameServer::new(config);

        assert_eq!(server.controller().connection_count().await, 0);
        assert_eq!(server.controller().room_count().await, 0);
        assert_eq!(server.controller().queue_len().await, 0);
    }

    #[tokio::test]
    async fn test_server_shutdown() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let server = GameServer::new(config);
        server.shutdown();
        // Should not panic
    }
}
