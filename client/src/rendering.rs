use crate::game::ClientSession;
use macroquad::prelude::*;
use shared::{Phase, Player, Role, Vector2, ARENA_MAX, ARENA_MIN, PLAYER_RADIUS};

const MARGIN_LEFT: f32 = 20.0;
const MARGIN_TOP: f32 = 40.0;
const LINE_SPACING: f32 = 28.0;
const FONT_SIZE: f32 = 26.0;
const SMALL_FONT_SIZE: f32 = 18.0;

const BRIEFING: [&str; 3] = [
    "Welcome back to the terminal, comrade. All current intelligence points to a restaurant.",
    "It may conceal clues vital to your next move. You and your team must investigate immediately.",
    "Time is of the essence.",
];

pub struct Renderer {
    width: f32,
    height: f32,
}

impl Renderer {
    pub fn new(width: usize, height: usize) -> Self {
        Renderer {
            width: width as f32,
            height: height as f32,
        }
    }

    pub fn render(&self, session: &ClientSession) {
        clear_background(Color::from_rgba(26, 26, 26, 255));

        match session.game.phase {
            Phase::Lobby => self.draw_lines(&lobby_lines(session.start_selected)),
            Phase::Communication | Phase::Operation => {
                self.draw_arena(&session.game.players);
                self.draw_lines(&status_lines(session));
            }
        }
    }

    fn draw_lines(&self, lines: &[(String, bool)]) {
        let mut y = MARGIN_TOP;
        for (text, small) in lines {
            let size = if *small { SMALL_FONT_SIZE } else { FONT_SIZE };
            draw_text(text, MARGIN_LEFT, y, size, WHITE);
            y += LINE_SPACING;
        }
    }

    fn draw_arena(&self, players: &[Player]) {
        let (x0, y0) = world_to_screen(ARENA_MIN, self.width, self.height);
        let (x1, y1) = world_to_screen(ARENA_MAX, self.width, self.height);
        let border = Color::from_rgba(255, 0, 255, 255);
        draw_rectangle_lines(x0, y1, x1 - x0, y0 - y1, 2.0, border);

        let scale = arena_scale(self.width, self.height);
        for player in players {
            let (x, y) = world_to_screen(player.position, self.width, self.height);
            let color = Color::new(player.color.r, player.color.g, player.color.b, 1.0);
            draw_circle(x, y, PLAYER_RADIUS * scale, color);
            draw_text(&player.name, x - 20.0, y - PLAYER_RADIUS * scale - 4.0, 14.0, WHITE);
        }
    }
}

/// Pixels per arena unit, fitting the arena plus a player radius of margin.
fn arena_scale(width: f32, height: f32) -> f32 {
    let span_x = ARENA_MAX.x - ARENA_MIN.x + 2.0 * PLAYER_RADIUS;
    let span_y = ARENA_MAX.y - ARENA_MIN.y + 2.0 * PLAYER_RADIUS;
    (width / span_x).min(height / span_y)
}

/// Arena coordinates (y up, centered) to window pixels (y down).
pub fn world_to_screen(point: Vector2, width: f32, height: f32) -> (f32, f32) {
    let scale = arena_scale(width, height);
    let center = (ARENA_MAX + ARENA_MIN) * 0.5;
    (
        width * 0.5 + (point.x - center.x) * scale,
        height * 0.5 - (point.y - center.y) * scale,
    )
}

/// Lobby text; the flag marks the smaller briefing font.
pub fn lobby_lines(start_selected: u8) -> Vec<(String, bool)> {
    let mut lines: Vec<(String, bool)> = BRIEFING.iter().map(|l| (l.to_string(), true)).collect();
    lines.push((String::new(), true));
    lines.push(("Enter your identity for further instruction:".to_string(), true));
    lines.push((String::new(), true));

    for (index, role) in [Role::Communicator, Role::Operative].iter().enumerate() {
        let label = if start_selected as usize == index {
            format!("> {} <", role.label())
        } else {
            format!("  {}", role.label())
        };
        lines.push((label, false));
    }
    lines.push((String::new(), false));
    lines.push(("[Enter] Log In".to_string(), false));
    lines
}

/// Heads-up text for the phases after the lobby.
pub fn status_lines(session: &ClientSession) -> Vec<(String, bool)> {
    let game = &session.game;
    let role = session.my_role();
    let mut lines = vec![(format!("Identity: {}", role.label()), true)];

    match (game.phase, role) {
        (Phase::Communication, Role::Communicator) => {
            lines.push(("Transmit your instruction:".to_string(), false));
            lines.push((format!("{}_", session.typed), false));
        }
        (Phase::Communication, _) => {
            lines.push(("Awaiting instruction from the Communicator...".to_string(), false));
        }
        (Phase::Operation, _) => {
            lines.push(("Intercepted instruction:".to_string(), false));
            lines.push((game.corrupted_instruction.clone(), false));
            lines.push((
                format!("Found: {}   Attempts left: {}", game.found_count, game.attempt_count),
                true,
            ));
            if role == Role::Communicator {
                lines.push((format!("New instruction: {}_", session.typed), true));
            }
        }
        (Phase::Lobby, _) => {}
    }
    lines
}
