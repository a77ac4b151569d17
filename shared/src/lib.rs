//! Types and wire protocol shared by the Cipher Ops server and client.
//!
//! - [`game`]: the game state both sides agree on (players, phase, roles,
//!   instruction counters).
//! - [`wire`]: the `[type, 24-bit length][payload]` envelope and its
//!   incremental decoding contract.
//! - [`messages`]: one encode/decode pair per message kind.
//! - [`corruption`]: the redaction applied to submitted instructions.

pub mod corruption;
pub mod game;
pub mod math;
pub mod messages;
pub mod wire;

pub use corruption::{corrupt_instruction, REDACTION_CHAR};
pub use game::{Button, Controls, ControlsUpdate, Game, Phase, Player, PlayerId, Role, Slot};
pub use math::{Color, Vector2};
pub use messages::ClientMessage;
pub use wire::{MessageKind, ProtocolError};

/// Server update rate in ticks per second.
pub const TICK_RATE: u32 = 30;
/// Seconds per server tick.
pub const TICK: f32 = 1.0 / TICK_RATE as f32;

pub const ARENA_MIN: Vector2 = Vector2::new(-0.75, -1.0);
pub const ARENA_MAX: Vector2 = Vector2::new(0.75, 1.0);

pub const PLAYER_RADIUS: f32 = 0.06;
pub const PLAYER_SPEED: f32 = 2.0;
pub const PLAYER_ACCEL_HALFLIFE: f32 = 0.25;
