//! Keyboard edges to input commands

use crate::protocol::Command;
use crate::world::{Entity, Intent};

struct Binding {
    code: &'static str,
    intent: u8,
    repeat: bool,
}

const BINDINGS: [Binding; 5] = [
    Binding {
        code: "Space",
        intent: Intent::JUMP,
        repeat: false,
    },
    Binding {
        code: "KeyW",
        intent: Intent::UP,
        repeat: true,
    },
    Binding {
        code: "KeyS",
        intent: Intent::DOWN,
        repeat: true,
    },
    Binding {
        code: "KeyA",
        intent: Intent::LEFT,
        repeat: true,
    },
    Binding {
        code: "KeyD",
        intent: Intent::RIGHT,
        repeat: true,
    },
];

fn binding(code: &str) -> Option<&'static Binding> {
    BINDINGS.iter().find(|b| b.code == code)
}

/// Intent bit bound to a physical key code, if any.
pub fn intent_for(code: &str) -> Option<u8> {
    binding(code).map(|b| b.intent)
}

/// Key down sets the bound intent. Auto-repeat of jump is ignored.
pub fn key_down(entity: Entity, code: &str, repeat: bool) -> Option<Command> {
    let binding = binding(code)?;
    if repeat && !binding.repeat {
        return None;
    }
    Some(Command::input(entity, binding.intent, 0))
}

/// Key up clears the bound intent.
pub fn key_up(entity: Entity, code: &str) -> Option<Command> {
    let binding = binding(code)?;
    Some(Command::input(entity, 0, binding.intent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_keys_set_and_clear() {
        let entity = Entity::from_bits(5);
        let down = key_down(entity, "KeyW", false).unwrap();
        assert_eq!((down.on, down.off), (Intent::UP, 0));
        let up = key_up(entity, "KeyW").unwrap();
        assert_eq!((up.on, up.off), (0, Intent::UP));
        assert!(key_down(entity, "KeyD", true).is_some());
    }

    #[test]
    fn jump_ignores_auto_repeat() {
        let entity = Entity::from_bits(5);
        assert!(key_down(entity, "Space", false).is_some());
        assert!(key_down(entity, "Space", true).is_none());
        assert_eq!(intent_for("Space"), Some(Intent::JUMP));
        assert_eq!(intent_for("KeyQ"), None);
    }
}
