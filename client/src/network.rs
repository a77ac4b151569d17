//! Client network layer: the server connection and the per-frame run loop.

use crate::game::ClientSession;
use crate::input::InputManager;
use crate::rendering::Renderer;
use log::{debug, error, info};
use shared::ProtocolError;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

const READ_CHUNK: usize = 4096;

/// Anything that ends a client session.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("lost connection to server")]
    ConnectionLost,
    #[error("malformed message from server: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("failed to connect: {0}")]
    Io(#[from] std::io::Error),
}

/// Messages sent from the socket reader task to the client
#[derive(Debug)]
pub enum ConnectionEvent {
    Received(Vec<u8>),
    Closed,
}

/// The one connection a client holds.
///
/// Messages are encoded into `send_buffer` and handed to the writer task on
/// the next poll; received bytes accumulate in `recv_buffer` until decoded.
pub struct ServerConnection {
    pub send_buffer: Vec<u8>,
    pub recv_buffer: Vec<u8>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
}

impl ServerConnection {
    /// Must be called inside a tokio runtime; the socket tasks are spawned on it.
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        info!("Connected to {}", addr);

        let (read_half, write_half) = stream.into_split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::read_loop(read_half, events_tx));
        tokio::spawn(Self::write_loop(write_half, outbound_rx));

        Ok(Self {
            send_buffer: Vec::new(),
            recv_buffer: Vec::new(),
            outbound: outbound_tx,
            events: events_rx,
        })
    }

    async fn read_loop(mut socket: OwnedReadHalf, events: mpsc::UnboundedSender<ConnectionEvent>) {
        let mut buffer = vec![0u8; READ_CHUNK];
        loop {
            let event = match socket.read(&mut buffer).await {
                Ok(0) => ConnectionEvent::Closed,
                Ok(len) => ConnectionEvent::Received(buffer[..len].to_vec()),
                Err(e) => {
                    debug!("Read error: {}", e);
                    ConnectionEvent::Closed
                }
            };
            let closed = matches!(event, ConnectionEvent::Closed);
            if events.send(event).is_err() || closed {
                break;
            }
        }
    }

    async fn write_loop(mut socket: OwnedWriteHalf, mut outbound: mpsc::UnboundedReceiver<Vec<u8>>) {
        while let Some(bytes) = outbound.recv().await {
            if let Err(e) = socket.write_all(&bytes).await {
                debug!("Write error: {}", e);
                break;
            }
        }
    }

    fn flush(&mut self) -> Result<(), ClientError> {
        if self.send_buffer.is_empty() {
            return Ok(());
        }
        let bytes = std::mem::take(&mut self.send_buffer);
        self.outbound
            .send(bytes)
            .map_err(|_| ClientError::ConnectionLost)
    }

    fn apply_event(&mut self, event: ConnectionEvent) -> Result<(), ClientError> {
        match event {
            ConnectionEvent::Received(data) => {
                self.recv_buffer.extend_from_slice(&data);
                Ok(())
            }
            ConnectionEvent::Closed => Err(ClientError::ConnectionLost),
        }
    }

    /// Sends queued bytes and takes whatever has arrived, without waiting.
    /// Returns whether any bytes were received.
    pub fn poll(&mut self) -> Result<bool, ClientError> {
        self.flush()?;

        let mut received = false;
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    self.apply_event(event)?;
                    received = true;
                }
                Err(mpsc::error::TryRecvError::Empty) => return Ok(received),
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    return Err(ClientError::ConnectionLost)
                }
            }
        }
    }

    /// Like [`poll`](Self::poll) but waits up to `wait` for the first event.
    pub async fn poll_for(&mut self, wait: Duration) -> Result<bool, ClientError> {
        self.flush()?;

        match tokio::time::timeout(wait, self.events.recv()).await {
            Ok(Some(event)) => self.apply_event(event)?,
            Ok(None) => return Err(ClientError::ConnectionLost),
            Err(_) => return Ok(false),
        }
        self.poll()?;
        Ok(true)
    }
}

/// A connected game client: session state, input, rendering and transport.
pub struct Client {
    connection: ServerConnection,
    session: ClientSession,
    input_manager: InputManager,
    renderer: Renderer,
}

impl Client {
    pub fn new(connection: ServerConnection, width: usize, height: usize) -> Self {
        Self {
            connection,
            session: ClientSession::new(),
            input_manager: InputManager::new(),
            renderer: Renderer::new(width, height),
        }
    }

    /// Runs one frame: queue input, poll, decode state, draw.
    pub fn frame(&mut self) -> Result<(), ClientError> {
        let intents = self.input_manager.update(&mut self.session.controls);
        for intent in intents {
            if let Some(message) = self.session.handle_intent(intent) {
                debug!("Sending {:?}", message);
                message.encode(&mut self.connection.send_buffer);
            }
        }
        self.session
            .controls_message()
            .encode(&mut self.connection.send_buffer);

        self.connection.poll()?;
        self.session.apply_messages(&mut self.connection.recv_buffer)?;

        self.renderer.render(&self.session);
        Ok(())
    }

    pub async fn run(&mut self) -> Result<(), ClientError> {
        loop {
            if let Err(e) = self.frame() {
                error!("{}", e);
                return Err(e);
            }
            macroquad::window::next_frame().await;
        }
    }
}
