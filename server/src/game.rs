//! Authoritative game session: player arena, lobby role arbitration and
//! instruction handling.

use crate::physics;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::game::{
    INITIAL_ATTEMPT_COUNT, INITIAL_FOUND_COUNT, SELECT_COMMUNICATOR, SELECT_OPERATIVE,
};
use shared::math::mix;
use shared::messages::{send_state, ClientMessage};
use shared::{
    corrupt_instruction, Color, ControlsUpdate, Game, Phase, Player, PlayerId, ProtocolError,
    Role, Slot, Vector2, ARENA_MAX, ARENA_MIN, PLAYER_RADIUS,
};

/// What a Login did to the lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The other slot has not committed yet.
    Waiting,
    /// Both slots picked the same role; the other slot was reset and nudged.
    Collision,
    /// Roles are complementary; the game moved to Communication.
    Ready,
    /// The sender is not in the game (already removed).
    Ignored,
}

#[derive(Debug)]
pub struct ServerGame {
    pub game: Game,
    rng: StdRng,
    next_player_id: u32,
    next_player_number: u32,
}

impl ServerGame {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Reproducible spawns and corruption.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            game: Game::new(),
            rng,
            next_player_id: 1,
            next_player_number: 1,
        }
    }

    /// Appends a player near the middle of the arena with a random colour.
    pub fn spawn_player(&mut self) -> PlayerId {
        let id = PlayerId(self.next_player_id);
        self.next_player_id += 1;

        let name = format!("Player {}", self.next_player_number);
        self.next_player_number += 1;

        let mut player = Player::new(id, name);
        let inset = 2.0 * PLAYER_RADIUS;
        player.position = Vector2::new(
            mix(
                ARENA_MIN.x + inset,
                ARENA_MAX.x - inset,
                0.4 + 0.2 * self.rng.gen::<f32>(),
            ),
            mix(
                ARENA_MIN.y + inset,
                ARENA_MAX.y - inset,
                0.4 + 0.2 * self.rng.gen::<f32>(),
            ),
        );

        let mut color = Color {
            r: 0.0,
            g: 0.0,
            b: 0.0,
        };
        while color.is_black() {
            color = Color {
                r: self.rng.gen(),
                g: self.rng.gen(),
                b: self.rng.gen(),
            };
        }
        player.color = color.normalize();

        info!(
            "Spawned {} ({:?}) at ({:.2}, {:.2})",
            player.name, id, player.position.x, player.position.y
        );
        self.game.players.push(player);
        id
    }

    /// Returns false if the player was already gone.
    pub fn remove_player(&mut self, id: PlayerId) -> bool {
        match self.game.players.iter().position(|p| p.id == id) {
            Some(index) => {
                let player = self.game.players.remove(index);
                info!("Removed {} ({:?})", player.name, id);
                true
            }
            None => false,
        }
    }

    pub fn handle_message(&mut self, id: PlayerId, message: ClientMessage) {
        match message {
            ClientMessage::Controls(update) => self.apply_controls(id, &update),
            ClientMessage::Login(role) => {
                self.login(id, role);
            }
            ClientMessage::SelectedRole(selected) => self.select_role(id, selected),
            ClientMessage::Instruction(text) => self.submit_instruction(id, text),
        }
    }

    pub fn apply_controls(&mut self, id: PlayerId, update: &ControlsUpdate) {
        if let Some(player) = self.game.player_mut(id) {
            player.controls.apply(update);
        }
    }

    /// Moves the sender's lobby cursor. Never touches committed roles or the phase.
    pub fn select_role(&mut self, id: PlayerId, selected: u8) {
        let Some(slot) = self.game.slot_of(id) else {
            return;
        };
        *self.game.selected_role_mut(slot) = selected;
        debug!("Slot {} highlights {}", slot.number(), Role::from_selection(selected).label());
    }

    /// Commits the sender's slot to `role` and arbitrates against the other slot.
    pub fn login(&mut self, id: PlayerId, role: Role) -> LoginOutcome {
        let Some(slot) = self.game.slot_of(id) else {
            return LoginOutcome::Ignored;
        };
        if let Some(player) = self.game.player_mut(id) {
            player.role = role;
        }

        *self.game.committed_role_mut(slot) = role;
        // Unknown has no cursor position; the table below still applies.
        if let Some(selection) = role.selection() {
            *self.game.selected_role_mut(slot) = selection;
        }
        info!("Slot {} logged in as {}", slot.number(), role.label());

        let other = slot.other();
        let other_role = self.game.committed_role(other);
        if other_role == Role::Unknown {
            LoginOutcome::Waiting
        } else if other_role == role {
            *self.game.committed_role_mut(other) = Role::Unknown;
            *self.game.selected_role_mut(other) = if role == Role::Communicator {
                SELECT_OPERATIVE
            } else {
                SELECT_COMMUNICATOR
            };
            info!(
                "Both slots picked {}; slot {} reset and nudged",
                role.label(),
                other.number()
            );
            LoginOutcome::Collision
        } else {
            if self.game.phase != Phase::Communication {
                info!("Roles complete, entering Communication");
            }
            self.game.phase = Phase::Communication;
            LoginOutcome::Ready
        }
    }

    /// Stores a fresh instruction, re-corrupts it and (re)enters Operation.
    pub fn submit_instruction(&mut self, id: PlayerId, text: String) {
        if self.game.player(id).is_none() {
            return;
        }
        self.game.corrupted_instruction = corrupt_instruction(&text, &mut self.rng);
        self.game.instruction_text = text;
        self.game.found_count = INITIAL_FOUND_COUNT;
        self.game.attempt_count = INITIAL_ATTEMPT_COUNT;
        self.game.phase = Phase::Operation;
        info!(
            "Instruction accepted ({} chars), entering Operation",
            self.game.instruction_text.chars().count()
        );
    }

    /// Runs one movement step and clears per-tick press counters.
    pub fn update(&mut self, elapsed: f32) {
        physics::step(&mut self.game.players, elapsed);
    }

    /// Appends the State message for the connection owning `perspective`.
    pub fn encode_state(&self, out: &mut Vec<u8>, perspective: PlayerId) -> Result<(), ProtocolError> {
        send_state(out, &self.game, Some(perspective))
    }

    pub fn slot_of(&self, id: PlayerId) -> Option<Slot> {
        self.game.slot_of(id)
    }
}

impl Default for ServerGame {
    fn default() -> Self {
        Self::new()
    }
}
