//! # Cipher Ops Client Library
//!
//! The player-facing side of the Communicator/Operative game. The client
//! holds no authority: it mirrors whatever State the server last sent and
//! turns keyboard input into Controls, SelectedRole, Login and Instruction
//! messages.
//!
//! ## Frame Loop
//!
//! Once per rendered frame the client queues a Controls message, polls its
//! connection without waiting, decodes every complete State message, and
//! draws the current phase. A closed connection or a malformed message ends
//! the session.
//!
//! ## Module Organization
//!
//! - [`network`]: the server connection and the run loop.
//! - [`game`]: the mirrored [`shared::Game`] plus lobby cursor and typing box.
//! - [`input`]: keyboard sampling into controls and intents.
//! - [`rendering`]: per-phase text and the arena view.

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
