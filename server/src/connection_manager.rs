//! Connection bookkeeping for the authoritative loop.
//!
//! Each open connection owns an inbound buffer (bytes not yet decoded) and
//! an outbound buffer (encoded messages not yet handed to the writer task),
//! and maps to exactly one player in the session.

use crate::game::ServerGame;
use log::{debug, info};
use shared::messages::recv_client_message;
use shared::{PlayerId, ProtocolError};
use std::collections::HashMap;
use std::net::SocketAddr;

pub type ConnectionId = u32;

#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    pub player: PlayerId,
    /// Received bytes waiting for a complete message.
    pub recv_buffer: Vec<u8>,
    /// Encoded messages waiting to be written.
    pub send_buffer: Vec<u8>,
}

impl Connection {
    pub fn new(id: ConnectionId, addr: SocketAddr, player: PlayerId) -> Self {
        Self {
            id,
            addr,
            player,
            recv_buffer: Vec::new(),
            send_buffer: Vec::new(),
        }
    }
}

/// All open connections, keyed by the id the transport assigned.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    connections: HashMap<ConnectionId, Connection>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
        }
    }

    pub fn add_connection(&mut self, id: ConnectionId, addr: SocketAddr, player: PlayerId) {
        info!("Connection {} from {} plays as {:?}", id, addr, player);
        self.connections.insert(id, Connection::new(id, addr, player));
    }

    /// Forgets the connection and returns it so the caller can remove its player.
    pub fn remove_connection(&mut self, id: ConnectionId) -> Option<Connection> {
        let connection = self.connections.remove(&id)?;
        info!("Connection {} from {} closed", id, connection.addr);
        Some(connection)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn player_for(&self, id: ConnectionId) -> Option<PlayerId> {
        self.connections.get(&id).map(|c| c.player)
    }

    /// Sorted so broadcasts go out in a stable order.
    pub fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.connections.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Appends freshly received bytes to the connection's inbound buffer.
    /// Returns false for unknown connections.
    pub fn push_received(&mut self, id: ConnectionId, data: &[u8]) -> bool {
        match self.connections.get_mut(&id) {
            Some(connection) => {
                connection.recv_buffer.extend_from_slice(data);
                true
            }
            None => false,
        }
    }

    /// Decodes and applies every complete message buffered for `id`.
    ///
    /// Returns how many messages were applied. An error means the
    /// connection broke the protocol and must be closed; anything decoded
    /// before the bad message has already been applied.
    pub fn drain_messages(
        &mut self,
        id: ConnectionId,
        game: &mut ServerGame,
    ) -> Result<usize, ProtocolError> {
        let Some(connection) = self.connections.get_mut(&id) else {
            return Ok(0);
        };

        let mut handled = 0;
        while let Some(message) = recv_client_message(&mut connection.recv_buffer)? {
            debug!("Connection {} sent {:?}", id, message);
            game.handle_message(connection.player, message);
            handled += 1;
        }
        Ok(handled)
    }

    /// Appends one State message per connection, each from its own player's view.
    pub fn queue_state(&mut self, game: &ServerGame) -> Vec<(ConnectionId, ProtocolError)> {
        let mut failed = Vec::new();
        for id in self.ids() {
            let Some(connection) = self.connections.get_mut(&id) else {
                continue;
            };
            if let Err(e) = game.encode_state(&mut connection.send_buffer, connection.player) {
                failed.push((id, e));
            }
        }
        failed
    }

    /// Takes every non-empty outbound buffer, leaving them empty.
    pub fn take_outbound(&mut self) -> Vec<(ConnectionId, Vec<u8>)> {
        let mut outbound = Vec::new();
        for id in self.ids() {
            if let Some(connection) = self.connections.get_mut(&id) {
                if !connection.send_buffer.is_empty() {
                    outbound.push((id, std::mem::take(&mut connection.send_buffer)));
                }
            }
        }
        outbound
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
