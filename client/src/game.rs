//! Client-side session: the mirrored game state plus local UI state.

use crate::input::Intent;
use log::{debug, info};
use shared::game::SELECT_COMMUNICATOR;
use shared::messages::recv_state;
use shared::{ClientMessage, Controls, ControlsUpdate, Game, Phase, ProtocolError, Role};

/// Longest instruction the typing box accepts, in characters.
pub const MAX_TYPED_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct ClientSession {
    /// Last state received from the server.
    pub game: Game,
    pub controls: Controls,
    /// Lobby cursor: 0 = Communicator, 1 = Operative.
    pub start_selected: u8,
    /// Instruction being typed by the Communicator.
    pub typed: String,
    last_server_selection: Option<u8>,
}

impl ClientSession {
    pub fn new() -> Self {
        Self {
            game: Game::new(),
            controls: Controls::default(),
            start_selected: SELECT_COMMUNICATOR,
            typed: String::new(),
            last_server_selection: None,
        }
    }

    /// Decodes every complete State message in `buf`.
    ///
    /// Returns how many were applied; an error is fatal to the session.
    pub fn apply_messages(&mut self, buf: &mut Vec<u8>) -> Result<usize, ProtocolError> {
        let mut applied = 0;
        while recv_state(buf, &mut self.game)? {
            self.follow_server_selection();
            applied += 1;
        }
        Ok(applied)
    }

    /// Moves the lobby cursor when the server changed this slot's selection.
    fn follow_server_selection(&mut self) {
        if self.game.phase != Phase::Lobby {
            return;
        }
        let Some(slot) = self.game.self_slot() else {
            return;
        };
        let selected = self.game.selected_role(slot);
        if let Some(previous) = self.last_server_selection {
            if previous != selected && selected != self.start_selected {
                info!(
                    "Server moved selection to {}",
                    Role::from_selection(selected).label()
                );
                self.start_selected = selected;
            }
        }
        self.last_server_selection = Some(selected);
    }

    /// Role this client committed to, as last reported by the server.
    pub fn my_role(&self) -> Role {
        self.game
            .self_slot()
            .map_or(Role::Unknown, |slot| self.game.committed_role(slot))
    }

    /// Turns one input intent into the message it should send, if any.
    pub fn handle_intent(&mut self, intent: Intent) -> Option<ClientMessage> {
        match (self.game.phase, intent) {
            (Phase::Lobby, Intent::ToggleSelection) => {
                self.start_selected = (self.start_selected + 1) % 2;
                Some(ClientMessage::SelectedRole(self.start_selected))
            }
            (Phase::Lobby, Intent::Login) => Some(ClientMessage::Login(Role::from_selection(
                self.start_selected,
            ))),
            (Phase::Lobby, _) => None,
            (_, intent) if self.my_role() == Role::Communicator => self.edit_instruction(intent),
            _ => None,
        }
    }

    fn edit_instruction(&mut self, intent: Intent) -> Option<ClientMessage> {
        match intent {
            Intent::Type(c) => {
                if !c.is_control() && self.typed.chars().count() < MAX_TYPED_CHARS {
                    self.typed.push(c);
                }
                None
            }
            Intent::Backspace => {
                self.typed.pop();
                None
            }
            Intent::Submit => {
                if self.typed.is_empty() {
                    return None;
                }
                let text = std::mem::take(&mut self.typed);
                debug!("Submitting instruction of {} chars", text.chars().count());
                Some(ClientMessage::Instruction(text))
            }
            _ => None,
        }
    }

    /// Snapshot of the controls for this frame; press counters restart at zero.
    pub fn controls_message(&mut self) -> ClientMessage {
        let update = ControlsUpdate {
            buttons: self.controls.buttons().map(|b| b.to_wire()),
        };
        self.controls.reset_downs();
        ClientMessage::Controls(update)
    }
}

impl Default for ClientSession {
    fn default() -> Self {
        Self::new()
    }
}
