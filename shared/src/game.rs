//! Game state shared by the server (authoritative copy) and the client
//! (decoded mirror of the latest broadcast).

use crate::math::{Color, Vector2};
use log::warn;

/// Value of `selected_role_*` while the Communicator entry is highlighted.
pub const SELECT_COMMUNICATOR: u8 = 0;
/// Value of `selected_role_*` while the Operative entry is highlighted.
pub const SELECT_OPERATIVE: u8 = 1;

/// Operation-phase counters after an instruction is accepted.
pub const INITIAL_FOUND_COUNT: u8 = 0;
pub const INITIAL_ATTEMPT_COUNT: u8 = 25;

/// Stable identity of a player for the lifetime of its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PlayerId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Role {
    #[default]
    Unknown = 0,
    Communicator = 1,
    Operative = 2,
}

impl Role {
    /// Bytes other than 1 and 2 decode as `Unknown`.
    pub fn from_u8(value: u8) -> Role {
        match value {
            1 => Role::Communicator,
            2 => Role::Operative,
            _ => Role::Unknown,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Lobby cursor position that highlights this role.
    pub fn selection(self) -> Option<u8> {
        match self {
            Role::Communicator => Some(SELECT_COMMUNICATOR),
            Role::Operative => Some(SELECT_OPERATIVE),
            Role::Unknown => None,
        }
    }

    /// Role highlighted by a lobby cursor position.
    pub fn from_selection(selected: u8) -> Role {
        if selected == SELECT_COMMUNICATOR {
            Role::Communicator
        } else {
            Role::Operative
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Unknown => "Unknown",
            Role::Communicator => "Communicator",
            Role::Operative => "Operative",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Phase {
    #[default]
    Lobby = 0,
    Communication = 1,
    Operation = 2,
}

impl Phase {
    pub fn from_u8(value: u8) -> Option<Phase> {
        match value {
            0 => Some(Phase::Lobby),
            1 => Some(Phase::Communication),
            2 => Some(Phase::Operation),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Join-order position of a player, used for role bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    One,
    Two,
}

impl Slot {
    pub fn other(self) -> Slot {
        match self {
            Slot::One => Slot::Two,
            Slot::Two => Slot::One,
        }
    }

    /// 1 or 2, as carried in `self_index`.
    pub fn number(self) -> u8 {
        match self {
            Slot::One => 1,
            Slot::Two => 2,
        }
    }

    pub fn from_number(number: u8) -> Option<Slot> {
        match number {
            1 => Some(Slot::One),
            2 => Some(Slot::Two),
            _ => None,
        }
    }
}

/// A single control input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Button {
    /// Times the button went down since the last tick, saturating at 255.
    pub downs: u8,
    /// Whether the button is held right now.
    pub pressed: bool,
}

impl Button {
    pub fn add_downs(&mut self, downs: u8) {
        let total = self.downs as u32 + downs as u32;
        if total > u8::MAX as u32 {
            warn!("got a whole lot of downs ({}), saturating", total);
        }
        self.downs = total.min(u8::MAX as u32) as u8;
    }

    /// Wire byte: `pressed` in the high bit, the low seven bits of `downs` below it.
    pub fn to_wire(&self) -> u8 {
        if self.downs & 0x80 != 0 {
            warn!("button pressed {} times in one frame, sending low bits only", self.downs);
        }
        (if self.pressed { 0x80 } else { 0x00 }) | (self.downs & 0x7f)
    }

    /// Overwrites `pressed` and accumulates `downs` from a wire byte.
    pub fn apply_wire(&mut self, byte: u8) {
        self.pressed = byte & 0x80 != 0;
        self.add_downs(byte & 0x7f);
    }
}

/// Raw button bytes of one decoded Controls message, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlsUpdate {
    pub buttons: [u8; 5],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Controls {
    pub left: Button,
    pub right: Button,
    pub up: Button,
    pub down: Button,
    pub jump: Button,
}

impl Controls {
    /// Buttons in wire order.
    pub fn buttons(&self) -> [&Button; 5] {
        [&self.left, &self.right, &self.up, &self.down, &self.jump]
    }

    pub fn buttons_mut(&mut self) -> [&mut Button; 5] {
        [
            &mut self.left,
            &mut self.right,
            &mut self.up,
            &mut self.down,
            &mut self.jump,
        ]
    }

    pub fn apply(&mut self, update: &ControlsUpdate) {
        for (button, byte) in self.buttons_mut().into_iter().zip(update.buttons) {
            button.apply_wire(byte);
        }
    }

    pub fn reset_downs(&mut self) {
        for button in self.buttons_mut() {
            button.downs = 0;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    /// Server-assigned identity. Not carried on the wire; decoded players
    /// are numbered by their position in the State message.
    pub id: PlayerId,
    pub controls: Controls,
    pub position: Vector2,
    pub velocity: Vector2,
    pub color: Color,
    pub name: String,
    pub role: Role,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            controls: Controls::default(),
            position: Vector2::ZERO,
            velocity: Vector2::ZERO,
            color: Color::WHITE,
            name: name.into(),
            role: Role::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Game {
    /// Join order: index 0 is slot one.
    pub players: Vec<Player>,
    pub phase: Phase,

    // Lobby
    pub role_1: Role,
    pub role_2: Role,
    pub selected_role_1: u8,
    pub selected_role_2: u8,
    /// 0 = unset, 1 = Player 1, 2 = Player 2. Only meaningful on a client.
    pub self_index: u8,

    // Communication
    pub instruction_text: String,

    // Operation
    pub corrupted_instruction: String,
    pub found_count: u8,
    pub attempt_count: u8,
}

impl Game {
    pub fn new() -> Self {
        Self {
            players: Vec::new(),
            phase: Phase::Lobby,
            role_1: Role::Unknown,
            role_2: Role::Unknown,
            selected_role_1: SELECT_COMMUNICATOR,
            selected_role_2: SELECT_OPERATIVE,
            self_index: 0,
            instruction_text: String::new(),
            corrupted_instruction: String::new(),
            found_count: INITIAL_FOUND_COUNT,
            attempt_count: INITIAL_ATTEMPT_COUNT,
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    /// Slot one is the front of the player list; everyone else is slot two.
    pub fn slot_of(&self, id: PlayerId) -> Option<Slot> {
        let index = self.players.iter().position(|p| p.id == id)?;
        Some(if index == 0 { Slot::One } else { Slot::Two })
    }

    /// `self_index` to advertise to the connection that owns `id`.
    pub fn self_index_for(&self, id: PlayerId) -> u8 {
        match self.players.iter().position(|p| p.id == id) {
            Some(0) => 1,
            Some(_) if self.players.len() >= 2 => 2,
            _ => 0,
        }
    }

    pub fn committed_role(&self, slot: Slot) -> Role {
        match slot {
            Slot::One => self.role_1,
            Slot::Two => self.role_2,
        }
    }

    pub fn committed_role_mut(&mut self, slot: Slot) -> &mut Role {
        match slot {
            Slot::One => &mut self.role_1,
            Slot::Two => &mut self.role_2,
        }
    }

    pub fn selected_role(&self, slot: Slot) -> u8 {
        match slot {
            Slot::One => self.selected_role_1,
            Slot::Two => self.selected_role_2,
        }
    }

    pub fn selected_role_mut(&mut self, slot: Slot) -> &mut u8 {
        match slot {
            Slot::One => &mut self.selected_role_1,
            Slot::Two => &mut self.selected_role_2,
        }
    }

    /// Slot the receiving client was told it occupies.
    pub fn self_slot(&self) -> Option<Slot> {
        Slot::from_number(self.self_index)
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}
