//! Keyboard sampling: movement controls and per-phase intents

use macroquad::prelude::*;
use shared::{Button, Controls};

/// A discrete user action, interpreted by the session according to phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Flip the lobby cursor between Communicator and Operative.
    ToggleSelection,
    /// Commit to the highlighted role.
    Login,
    Type(char),
    Backspace,
    /// Send the typed instruction.
    Submit,
}

/// Collects keyboard state once per frame
pub struct InputManager {
    // Previous frame key states for edge detection
    prev_enter: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self { prev_enter: false }
    }

    /// Updates `controls` from held keys and returns this frame's intents.
    pub fn update(&mut self, controls: &mut Controls) -> Vec<Intent> {
        // Support both WASD and arrow keys
        let bindings: [(&mut Button, [KeyCode; 2]); 5] = [
            (&mut controls.left, [KeyCode::A, KeyCode::Left]),
            (&mut controls.right, [KeyCode::D, KeyCode::Right]),
            (&mut controls.up, [KeyCode::W, KeyCode::Up]),
            (&mut controls.down, [KeyCode::S, KeyCode::Down]),
            (&mut controls.jump, [KeyCode::Space, KeyCode::Space]),
        ];
        for (button, keys) in bindings {
            let held = keys.iter().any(|k| is_key_down(*k));
            let went_down = keys.iter().any(|k| is_key_pressed(*k));
            record(button, held, went_down);
        }

        let mut intents = Vec::new();

        let toggle = [KeyCode::W, KeyCode::Up, KeyCode::S, KeyCode::Down]
            .iter()
            .any(|k| is_key_pressed(*k));
        if toggle {
            intents.push(Intent::ToggleSelection);
        }

        while let Some(c) = get_char_pressed() {
            if !c.is_control() {
                intents.push(Intent::Type(c));
            }
        }
        if is_key_pressed(KeyCode::Backspace) {
            intents.push(Intent::Backspace);
        }

        let enter = is_key_down(KeyCode::Enter) || is_key_down(KeyCode::KpEnter);
        if enter && !self.prev_enter {
            intents.extend(enter_intents());
        }
        self.prev_enter = enter;

        intents
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Enter logs in while in the lobby and submits afterwards; the session
/// ignores whichever does not apply.
fn enter_intents() -> [Intent; 2] {
    [Intent::Login, Intent::Submit]
}

fn record(button: &mut Button, held: bool, went_down: bool) {
    button.pressed = held;
    if went_down {
        button.add_downs(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_manager_creation() {
        let input_manager = InputManager::new();
        assert!(!input_manager.prev_enter);
    }

    #[test]
    fn test_record_counts_presses() {
        let mut button = Button::default();
        record(&mut button, true, true);
        record(&mut button, true, false);
        record(&mut button, false, false);
        record(&mut button, true, true);

        assert_eq!(button.downs, 2);
        assert!(button.pressed);
    }

    #[test]
    fn test_record_saturates() {
        let mut button = Button {
            downs: 255,
            pressed: false,
        };
        record(&mut button, true, true);
        assert_eq!(button.downs, 255);
    }

    #[test]
    fn test_enter_covers_both_phases() {
        let intents = enter_intents();
        assert!(intents.contains(&Intent::Login));
        assert!(intents.contains(&Intent::Submit));
    }
}
