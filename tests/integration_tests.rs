//! Integration tests for the server loop and client session over real TCP
//!
//! Each test starts a server on an ephemeral port and drives it with the
//! client library's connection and session types.

use client::game::ClientSession;
use client::network::{ClientError, ServerConnection};
use server::game::ServerGame;
use server::network::Server;
use shared::messages::send_login;
use shared::{ClientMessage, Phase, Role, REDACTION_CHAR};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::sleep;

const WAIT: Duration = Duration::from_secs(3);

async fn start_server(seed: u64) -> SocketAddr {
    let mut server = Server::bind_with_game(
        "127.0.0.1:0",
        Duration::from_millis(10),
        ServerGame::with_seed(seed),
    )
    .await
    .expect("Failed to bind server");
    let addr = server.local_addr();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    addr
}

struct TestClient {
    connection: ServerConnection,
    session: ClientSession,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let connection = ServerConnection::connect(&addr.to_string())
            .await
            .expect("Failed to connect");
        Self {
            connection,
            session: ClientSession::new(),
        }
    }

    /// Queues `message` and hands it to the writer straight away.
    fn send(&mut self, message: ClientMessage) {
        message.encode(&mut self.connection.send_buffer);
        self.connection.poll().expect("Connection closed while sending");
    }

    /// Polls until `done` holds for the mirrored state, or the deadline passes.
    async fn wait_until<F>(&mut self, done: F) -> Result<bool, ClientError>
    where
        F: Fn(&ClientSession) -> bool,
    {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            self.connection.poll_for(Duration::from_millis(50)).await?;
            self.session
                .apply_messages(&mut self.connection.recv_buffer)?;
            if done(&self.session) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Connects two clients and waits until both see themselves in their slots.
async fn two_clients(addr: SocketAddr) -> (TestClient, TestClient) {
    let mut first = TestClient::connect(addr).await;
    assert!(first.wait_until(|s| s.game.self_index == 1).await.unwrap());

    let mut second = TestClient::connect(addr).await;
    assert!(second.wait_until(|s| s.game.self_index == 2).await.unwrap());
    assert!(first.wait_until(|s| s.game.players.len() == 2).await.unwrap());

    (first, second)
}

/// LOBBY TESTS
mod lobby_tests {
    use super::*;

    #[tokio::test]
    async fn complementary_logins_enter_communication() {
        let addr = start_server(1).await;
        let (mut first, mut second) = two_clients(addr).await;

        first.send(ClientMessage::Login(Role::Communicator));
        assert!(first
            .wait_until(|s| s.game.role_1 == Role::Communicator)
            .await
            .unwrap());

        second.send(ClientMessage::Login(Role::Operative));
        assert!(second
            .wait_until(|s| s.game.phase == Phase::Communication)
            .await
            .unwrap());
        assert!(first
            .wait_until(|s| s.game.phase == Phase::Communication)
            .await
            .unwrap());

        assert_eq!(first.session.my_role(), Role::Communicator);
        assert_eq!(second.session.my_role(), Role::Operative);
    }

    #[tokio::test]
    async fn colliding_logins_nudge_the_earlier_player() {
        let addr = start_server(2).await;
        let (mut first, mut second) = two_clients(addr).await;

        first.send(ClientMessage::Login(Role::Communicator));
        assert!(first
            .wait_until(|s| s.game.role_1 == Role::Communicator)
            .await
            .unwrap());

        second.send(ClientMessage::Login(Role::Communicator));
        assert!(first
            .wait_until(|s| s.game.role_2 == Role::Communicator)
            .await
            .unwrap());

        let game = &first.session.game;
        assert_eq!(game.phase, Phase::Lobby);
        assert_eq!(game.role_1, Role::Unknown);
        assert_eq!(game.selected_role_1, 1);
        // The cursor follows the server's nudge.
        assert_eq!(first.session.start_selected, 1);

        first.send(ClientMessage::Login(Role::Operative));
        assert!(second
            .wait_until(|s| s.game.phase == Phase::Communication)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn selected_role_updates_only_the_cursor() {
        let addr = start_server(3).await;
        let (mut first, mut second) = two_clients(addr).await;

        first.send(ClientMessage::SelectedRole(1));
        assert!(second
            .wait_until(|s| s.game.selected_role_1 == 1)
            .await
            .unwrap());
        assert_eq!(second.session.game.role_1, Role::Unknown);
        assert_eq!(second.session.game.phase, Phase::Lobby);
    }

    #[tokio::test]
    async fn third_connection_shares_slot_two() {
        let addr = start_server(4).await;
        let (mut first, _second) = two_clients(addr).await;
        let mut third = TestClient::connect(addr).await;
        assert!(third
            .wait_until(|s| s.game.players.len() == 3)
            .await
            .unwrap());
        assert_eq!(third.session.game.self_index, 2);

        first.send(ClientMessage::Login(Role::Communicator));
        third.send(ClientMessage::Login(Role::Operative));
        assert!(first
            .wait_until(|s| s.game.phase == Phase::Communication)
            .await
            .unwrap());
    }
}

/// INSTRUCTION TESTS
mod instruction_tests {
    use super::*;

    async fn communicating_pair(seed: u64) -> (TestClient, TestClient) {
        let addr = start_server(seed).await;
        let (mut first, mut second) = two_clients(addr).await;
        first.send(ClientMessage::Login(Role::Communicator));
        second.send(ClientMessage::Login(Role::Operative));
        assert!(first
            .wait_until(|s| s.game.phase == Phase::Communication)
            .await
            .unwrap());
        assert!(second
            .wait_until(|s| s.game.phase == Phase::Communication)
            .await
            .unwrap());
        (first, second)
    }

    #[tokio::test]
    async fn instruction_arrives_corrupted() {
        let (mut first, mut second) = communicating_pair(5).await;

        first.send(ClientMessage::Instruction("AB CD EF".to_string()));
        assert!(second
            .wait_until(|s| s.game.phase == Phase::Operation)
            .await
            .unwrap());

        let game = &second.session.game;
        let text: Vec<char> = game.corrupted_instruction.chars().collect();
        assert_eq!(text.len(), 8);
        assert_eq!(text[2], ' ');
        assert_eq!(text[5], ' ');
        assert_eq!(text.iter().filter(|c| **c == REDACTION_CHAR).count(), 3);
        assert_eq!(game.found_count, 0);
        assert_eq!(game.attempt_count, 25);
    }

    #[tokio::test]
    async fn resubmission_replaces_instruction() {
        let (mut first, mut second) = communicating_pair(6).await;

        first.send(ClientMessage::Instruction("first try".to_string()));
        assert!(second
            .wait_until(|s| s.game.phase == Phase::Operation)
            .await
            .unwrap());

        first.send(ClientMessage::Instruction("second attempt here".to_string()));
        assert!(second
            .wait_until(|s| s.game.corrupted_instruction.chars().count() == 19)
            .await
            .unwrap());
        assert_eq!(second.session.game.phase, Phase::Operation);
        assert_eq!(second.session.game.attempt_count, 25);
    }
}

/// CONNECTION LIFECYCLE TESTS
mod connection_tests {
    use super::*;

    #[tokio::test]
    async fn malformed_message_disconnects_only_the_sender() {
        let addr = start_server(7).await;
        let (mut first, mut second) = two_clients(addr).await;

        // Login declaring a two-byte payload.
        second
            .connection
            .send_buffer
            .extend_from_slice(&[b'L', 2, 0, 0, 1, 1]);

        let result = second.wait_until(|_| false).await;
        assert!(matches!(result, Err(ClientError::ConnectionLost)));

        assert!(first
            .wait_until(|s| s.game.players.len() == 1 && s.game.self_index == 1)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn byte_at_a_time_delivery() {
        let addr = start_server(8).await;

        let mut raw = TcpStream::connect(addr).await.unwrap();
        raw.set_nodelay(true).unwrap();
        let mut observer = TestClient::connect(addr).await;
        assert!(observer
            .wait_until(|s| s.game.players.len() == 2)
            .await
            .unwrap());

        let mut bytes = Vec::new();
        send_login(&mut bytes, Role::Operative);
        for byte in bytes {
            raw.write_all(&[byte]).await.unwrap();
            raw.flush().await.unwrap();
            sleep(Duration::from_millis(15)).await;
        }

        assert!(observer
            .wait_until(|s| s.game.role_1 == Role::Operative)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn disconnect_frees_the_front_slot() {
        let addr = start_server(9).await;
        let (first, mut second) = two_clients(addr).await;

        drop(first);
        assert!(second
            .wait_until(|s| s.game.players.len() == 1 && s.game.self_index == 1)
            .await
            .unwrap());
    }

    #[test]
    fn bind_rejects_port_in_use() {
        tokio_test::block_on(async {
            let server = Server::bind("127.0.0.1:0", Duration::from_millis(10))
                .await
                .unwrap();
            let taken = server.local_addr().to_string();
            assert!(Server::bind(&taken, Duration::from_millis(10)).await.is_err());
        });
    }
}
