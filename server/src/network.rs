//! Server network layer: TCP transport tasks and the authoritative tick loop.
//!
//! Every socket gets a reader task and a writer task. They only move bytes;
//! all game state lives in [`Server`] and is touched from `run` alone.

use crate::connection_manager::{ConnectionId, ConnectionManager};
use crate::game::ServerGame;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};

pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

const READ_CHUNK: usize = 4096;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    Opened {
        id: ConnectionId,
        addr: SocketAddr,
        outbound: mpsc::UnboundedSender<Vec<u8>>,
        shutdown: oneshot::Sender<()>,
    },
    Received {
        id: ConnectionId,
        data: Vec<u8>,
    },
    Closed {
        id: ConnectionId,
    },
}

/// The loop's grip on a connection's tasks. Dropping it closes the socket.
#[derive(Debug)]
struct ConnectionHandle {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    shutdown: oneshot::Sender<()>,
}

/// Main server coordinating networking and game simulation
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    game: ServerGame,
    connections: ConnectionManager,
    handles: HashMap<ConnectionId, ConnectionHandle>,
    tick_duration: Duration,
    tick_count: u64,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn bind(addr: &str, tick_duration: Duration) -> Result<Self, ServerError> {
        Self::bind_with_game(addr, tick_duration, ServerGame::new()).await
    }

    /// Binds with a caller-supplied session, e.g. one built with a fixed seed.
    pub async fn bind_with_game(
        addr: &str,
        tick_duration: Duration,
        game: ServerGame,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            game,
            connections: ConnectionManager::new(),
            handles: HashMap::new(),
            tick_duration,
            tick_count: 0,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn game(&self) -> &ServerGame {
        &self.game
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Spawns task that accepts sockets and starts their reader/writer tasks
    fn spawn_acceptor(&self, listener: TcpListener) {
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut next_id: ConnectionId = 1;

            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                        }
                        let id = next_id;
                        next_id = next_id.wrapping_add(1);

                        let (read_half, write_half) = stream.into_split();
                        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                        let (shutdown_tx, shutdown_rx) = oneshot::channel();

                        // Opened must reach the loop before any Received for this id.
                        let opened = ServerMessage::Opened {
                            id,
                            addr,
                            outbound: outbound_tx,
                            shutdown: shutdown_tx,
                        };
                        if server_tx.send(opened).is_err() {
                            error!("Server loop is gone, stopping acceptor");
                            break;
                        }

                        tokio::spawn(Self::read_loop(id, read_half, shutdown_rx, server_tx.clone()));
                        tokio::spawn(Self::write_loop(id, write_half, outbound_rx));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    async fn read_loop(
        id: ConnectionId,
        mut socket: OwnedReadHalf,
        mut shutdown: oneshot::Receiver<()>,
        server_tx: mpsc::UnboundedSender<ServerMessage>,
    ) {
        let mut buffer = vec![0u8; READ_CHUNK];

        loop {
            tokio::select! {
                result = socket.read(&mut buffer) => {
                    let message = match result {
                        Ok(0) => ServerMessage::Closed { id },
                        Ok(len) => ServerMessage::Received { id, data: buffer[..len].to_vec() },
                        Err(e) => {
                            debug!("Read error on connection {}: {}", id, e);
                            ServerMessage::Closed { id }
                        }
                    };
                    let closed = matches!(message, ServerMessage::Closed { .. });
                    if server_tx.send(message).is_err() || closed {
                        break;
                    }
                }
                _ = &mut shutdown => break,
            }
        }
    }

    async fn write_loop(
        id: ConnectionId,
        mut socket: OwnedWriteHalf,
        mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    ) {
        while let Some(bytes) = outbound.recv().await {
            if let Err(e) = socket.write_all(&bytes).await {
                debug!("Write error on connection {}: {}", id, e);
                break;
            }
        }
        let _ = socket.shutdown().await;
    }

    /// Applies one transport event to the session.
    pub fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Opened {
                id,
                addr,
                outbound,
                shutdown,
            } => {
                let player = self.game.spawn_player();
                self.connections.add_connection(id, addr, player);
                self.handles
                    .insert(id, ConnectionHandle { outbound, shutdown });
            }
            ServerMessage::Received { id, data } => {
                if !self.connections.push_received(id, &data) {
                    return;
                }
                if let Err(e) = self.connections.drain_messages(id, &mut self.game) {
                    warn!("Closing connection {}: {}", id, e);
                    self.close_connection(id);
                }
            }
            ServerMessage::Closed { id } => self.close_connection(id),
        }
    }

    /// Stops the connection's tasks and removes its player in one step.
    fn close_connection(&mut self, id: ConnectionId) {
        if let Some(handle) = self.handles.remove(&id) {
            let _ = handle.shutdown.send(());
        }
        if let Some(connection) = self.connections.remove_connection(id) {
            self.game.remove_player(connection.player);
        }
    }

    /// Advances the session one tick and broadcasts its state.
    pub fn tick(&mut self) {
        self.game.update(self.tick_duration.as_secs_f32());
        self.tick_count += 1;

        for (id, e) in self.connections.queue_state(&self.game) {
            error!("Failed to encode state for connection {}: {}", id, e);
            self.close_connection(id);
        }
        self.flush();

        if self.tick_count % 60 == 0 && !self.connections.is_empty() {
            debug!(
                "Tick {}: {} connections, phase {:?}",
                self.tick_count,
                self.connections.len(),
                self.game.game.phase
            );
        }
    }

    fn flush(&mut self) {
        for (id, bytes) in self.connections.take_outbound() {
            let Some(handle) = self.handles.get(&id) else {
                continue;
            };
            // A dead writer means the reader reports Closed shortly.
            if handle.outbound.send(bytes).is_err() {
                debug!("Writer for connection {} has stopped", id);
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), ServerError> {
        let listener = self.listener.take().ok_or("server is already running")?;
        self.spawn_acceptor(listener);

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(message) => self.handle_message(message),
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => self.tick(),
            }
        }

        Ok(())
    }
}
