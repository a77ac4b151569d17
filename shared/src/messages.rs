//! Encode/decode pairs for every message kind.
//!
//! | Kind         | Direction       | Payload                                   |
//! |--------------|-----------------|-------------------------------------------|
//! | Controls     | client → server | 5 button bytes `[pressed:1 \| downs:7]`   |
//! | State        | server → client | phase, self index, players, phase tail    |
//! | Login        | client → server | 1 role byte                               |
//! | SelectedRole | client → server | 1 byte, 0 or 1                            |
//! | Instruction  | client → server | u16 length + UTF-8 bytes                  |

use crate::game::{Controls, ControlsUpdate, Game, Phase, Player, PlayerId, Role};
use crate::math::{Color, Vector2};
use crate::wire::{
    recv_frame, truncate_utf8, FrameWriter, MessageKind, PayloadReader, ProtocolError,
    HEADER_SIZE,
};

pub const CONTROLS_SIZE: usize = 5;
pub const LOGIN_SIZE: usize = 1;
pub const SELECTED_ROLE_SIZE: usize = 1;

/// Longest instruction, in bytes, the u16 length prefix can carry.
pub const MAX_INSTRUCTION_BYTES: usize = u16::MAX as usize;
/// Player names are truncated to this many bytes on the wire.
pub const MAX_NAME_BYTES: usize = u8::MAX as usize;

// ---------------------------------------------------------------- Controls

pub fn send_controls(out: &mut Vec<u8>, controls: &Controls) {
    let mut writer = FrameWriter::begin(out, MessageKind::Controls);
    for button in controls.buttons() {
        writer.write_u8(button.to_wire());
    }
    // Five bytes always fit.
    let _ = writer.finish();
}

pub fn recv_controls(buf: &mut Vec<u8>) -> Result<Option<ControlsUpdate>, ProtocolError> {
    recv_frame(buf, MessageKind::Controls, Some(CONTROLS_SIZE), |reader| {
        let mut buttons = [0u8; CONTROLS_SIZE];
        for byte in buttons.iter_mut() {
            *byte = reader.read_u8()?;
        }
        Ok(ControlsUpdate { buttons })
    })
}

// ------------------------------------------------------------------- Login

pub fn send_login(out: &mut Vec<u8>, role: Role) {
    let mut writer = FrameWriter::begin(out, MessageKind::Login);
    writer.write_u8(role.as_u8());
    let _ = writer.finish();
}

pub fn recv_login(buf: &mut Vec<u8>) -> Result<Option<Role>, ProtocolError> {
    recv_frame(buf, MessageKind::Login, Some(LOGIN_SIZE), |reader| {
        Ok(Role::from_u8(reader.read_u8()?))
    })
}

// ------------------------------------------------------------ SelectedRole

/// Any non-zero `selected` is sent as 1.
pub fn send_selected_role(out: &mut Vec<u8>, selected: u8) {
    let mut writer = FrameWriter::begin(out, MessageKind::SelectedRole);
    writer.write_u8(if selected != 0 { 1 } else { 0 });
    let _ = writer.finish();
}

pub fn recv_selected_role(buf: &mut Vec<u8>) -> Result<Option<u8>, ProtocolError> {
    recv_frame(
        buf,
        MessageKind::SelectedRole,
        Some(SELECTED_ROLE_SIZE),
        |reader| Ok(if reader.read_u8()? != 0 { 1 } else { 0 }),
    )
}

// ------------------------------------------------------------- Instruction

/// Text longer than 65535 bytes is cut at the last whole character that fits.
pub fn send_instruction(out: &mut Vec<u8>, text: &str) {
    let text = truncate_utf8(text, MAX_INSTRUCTION_BYTES);
    let mut writer = FrameWriter::begin(out, MessageKind::Instruction);
    writer.write_u16(text.len() as u16);
    writer.write_bytes(text.as_bytes());
    let _ = writer.finish();
}

pub fn recv_instruction(buf: &mut Vec<u8>) -> Result<Option<String>, ProtocolError> {
    recv_frame(buf, MessageKind::Instruction, None, |reader| {
        let len = reader.read_u16()? as usize;
        reader.read_string(len)
    })
}

// ------------------------------------------------------------------- State

/// Appends a State message for `game`.
///
/// When `perspective` names a player in the game, that player is written
/// first and `self_index` is set to its slot number; the others follow in
/// join order.
pub fn send_state(
    out: &mut Vec<u8>,
    game: &Game,
    perspective: Option<PlayerId>,
) -> Result<(), ProtocolError> {
    let perspective = perspective.and_then(|id| game.player(id));
    let self_index = perspective.map_or(0, |p| game.self_index_for(p.id));

    let mut writer = FrameWriter::begin(out, MessageKind::State);
    writer.write_u8(game.phase.as_u8());
    writer.write_u8(self_index);

    let ordered: Vec<&Player> = perspective
        .into_iter()
        .chain(
            game.players
                .iter()
                .filter(|p| perspective.map_or(true, |first| first.id != p.id)),
        )
        .take(u8::MAX as usize)
        .collect();

    writer.write_u8(ordered.len() as u8);
    for player in ordered {
        write_player(&mut writer, player);
    }

    match game.phase {
        Phase::Lobby => {
            writer.write_u8(game.role_1.as_u8());
            writer.write_u8(game.role_2.as_u8());
            writer.write_u8(game.selected_role_1);
            writer.write_u8(game.selected_role_2);
        }
        Phase::Operation => {
            let text = truncate_utf8(&game.corrupted_instruction, MAX_INSTRUCTION_BYTES);
            writer.write_u16(text.len() as u16);
            writer.write_bytes(text.as_bytes());
            writer.write_u8(game.found_count);
            writer.write_u8(game.attempt_count);
        }
        Phase::Communication => {}
    }

    writer.finish()
}

fn write_player(writer: &mut FrameWriter<'_>, player: &Player) {
    writer.write_f32(player.position.x);
    writer.write_f32(player.position.y);
    writer.write_f32(player.velocity.x);
    writer.write_f32(player.velocity.y);
    writer.write_f32(player.color.r);
    writer.write_f32(player.color.g);
    writer.write_f32(player.color.b);

    let name = truncate_utf8(&player.name, MAX_NAME_BYTES);
    writer.write_u8(name.len() as u8);
    writer.write_bytes(name.as_bytes());
}

fn read_player(reader: &mut PayloadReader<'_>, index: usize) -> Result<Player, ProtocolError> {
    let position = Vector2::new(reader.read_f32()?, reader.read_f32()?);
    let velocity = Vector2::new(reader.read_f32()?, reader.read_f32()?);
    let color = Color {
        r: reader.read_f32()?,
        g: reader.read_f32()?,
        b: reader.read_f32()?,
    };
    let name_len = reader.read_u8()? as usize;
    let name = String::from_utf8_lossy(reader.read_bytes(name_len)?).into_owned();

    let mut player = Player::new(PlayerId(index as u32), name);
    player.position = position;
    player.velocity = velocity;
    player.color = color;
    Ok(player)
}

struct LobbyTail {
    role_1: Role,
    role_2: Role,
    selected_role_1: u8,
    selected_role_2: u8,
}

struct OperationTail {
    corrupted_instruction: String,
    found_count: u8,
    attempt_count: u8,
}

struct StateSnapshot {
    phase: Phase,
    self_index: u8,
    players: Vec<Player>,
    lobby: Option<LobbyTail>,
    operation: Option<OperationTail>,
}

/// Decodes one State message into `game`.
///
/// The player list, phase and `self_index` are replaced; the phase tail
/// overwrites only the fields it carries, so values from earlier phases
/// (such as the committed roles) stay readable after the lobby closes.
/// `game` is left untouched when decoding fails.
pub fn recv_state(buf: &mut Vec<u8>, game: &mut Game) -> Result<bool, ProtocolError> {
    let snapshot = recv_frame(buf, MessageKind::State, None, |reader| {
        let phase_byte = reader.read_u8()?;
        let phase = Phase::from_u8(phase_byte).ok_or(ProtocolError::UnknownPhase(phase_byte))?;
        let self_index = reader.read_u8()?;

        let player_count = reader.read_u8()? as usize;
        let mut players = Vec::with_capacity(player_count);
        for index in 0..player_count {
            players.push(read_player(reader, index)?);
        }

        let lobby = match phase {
            Phase::Lobby => Some(LobbyTail {
                role_1: Role::from_u8(reader.read_u8()?),
                role_2: Role::from_u8(reader.read_u8()?),
                selected_role_1: reader.read_u8()?,
                selected_role_2: reader.read_u8()?,
            }),
            _ => None,
        };

        let operation = match phase {
            Phase::Operation => {
                let len = reader.read_u16()? as usize;
                let corrupted_instruction =
                    String::from_utf8_lossy(reader.read_bytes(len)?).into_owned();
                Some(OperationTail {
                    corrupted_instruction,
                    found_count: reader.read_u8()?,
                    attempt_count: reader.read_u8()?,
                })
            }
            _ => None,
        };

        Ok(StateSnapshot {
            phase,
            self_index,
            players,
            lobby,
            operation,
        })
    })?;

    let Some(snapshot) = snapshot else {
        return Ok(false);
    };

    game.phase = snapshot.phase;
    game.self_index = snapshot.self_index;
    game.players = snapshot.players;
    if let Some(lobby) = snapshot.lobby {
        game.role_1 = lobby.role_1;
        game.role_2 = lobby.role_2;
        game.selected_role_1 = lobby.selected_role_1;
        game.selected_role_2 = lobby.selected_role_2;
    }
    if let Some(operation) = snapshot.operation {
        game.corrupted_instruction = operation.corrupted_instruction;
        game.found_count = operation.found_count;
        game.attempt_count = operation.attempt_count;
    }
    Ok(true)
}

// ---------------------------------------------------------- client → server

/// Any message a client may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Controls(ControlsUpdate),
    Login(Role),
    SelectedRole(u8),
    Instruction(String),
}

impl ClientMessage {
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            ClientMessage::Controls(update) => {
                let mut writer = FrameWriter::begin(out, MessageKind::Controls);
                writer.write_bytes(&update.buttons);
                let _ = writer.finish();
            }
            ClientMessage::Login(role) => send_login(out, *role),
            ClientMessage::SelectedRole(selected) => send_selected_role(out, *selected),
            ClientMessage::Instruction(text) => send_instruction(out, text),
        }
    }
}

/// Probes each client message kind against the front of `buf` in turn.
///
/// `Ok(None)` means nothing complete is buffered yet. A header carrying any
/// other type tag is an error, since nothing would ever consume it.
pub fn recv_client_message(buf: &mut Vec<u8>) -> Result<Option<ClientMessage>, ProtocolError> {
    if let Some(update) = recv_controls(buf)? {
        return Ok(Some(ClientMessage::Controls(update)));
    }
    if let Some(role) = recv_login(buf)? {
        return Ok(Some(ClientMessage::Login(role)));
    }
    if let Some(selected) = recv_selected_role(buf)? {
        return Ok(Some(ClientMessage::SelectedRole(selected)));
    }
    if let Some(text) = recv_instruction(buf)? {
        return Ok(Some(ClientMessage::Instruction(text)));
    }
    if buf.len() >= HEADER_SIZE && !is_client_kind(buf[0]) {
        return Err(ProtocolError::UnknownKind(buf[0]));
    }
    Ok(None)
}

fn is_client_kind(tag: u8) -> bool {
    matches!(
        MessageKind::from_tag(tag),
        Some(
            MessageKind::Controls
                | MessageKind::Login
                | MessageKind::SelectedRole
                | MessageKind::Instruction
        )
    )
}
