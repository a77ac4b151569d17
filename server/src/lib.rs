//! # Cipher Ops Server Library
//!
//! The authoritative side of the two-player Communicator/Operative game.
//! The server owns the only writable copy of the [`shared::Game`], decides
//! role arbitration, corrupts instructions, and broadcasts one State
//! message per connection every tick.
//!
//! ## Architecture
//!
//! A single loop owns the session. Socket reader and writer tasks only
//! shuttle bytes over channels, so game state is never shared across tasks
//! and needs no locking. A connection that breaks the protocol is closed
//! and its player removed before the loop looks at the next event.
//!
//! ## Module Organization
//!
//! - [`game`]: the session (spawning, role arbitration, instructions).
//! - [`physics`]: the movement step run every tick.
//! - [`connection_manager`]: per-connection buffers and the drain loop.
//! - [`network`]: TCP transport tasks and the tick loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut server = Server::bind("0.0.0.0:15466", Duration::from_secs_f32(shared::TICK)).await?;
//!     server.run().await
//! }
//! ```

pub mod connection_manager;
pub mod game;
pub mod network;
pub mod physics;
