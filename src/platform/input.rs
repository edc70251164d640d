//! Raw input events as delivered by the host
//!
//! Coordinates are already converted to playfield units by the host.

/// Keys the engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Space,
}

impl Key {
    /// Map a DOM `KeyboardEvent.key` value
    pub fn from_dom(key: &str) -> Option<Self> {
        match key {
            "ArrowUp" | "w" | "W" => Some(Key::Up),
            "ArrowDown" | "s" | "S" => Some(Key::Down),
            "ArrowLeft" | "a" | "A" => Some(Key::Left),
            "ArrowRight" | "d" | "D" => Some(Key::Right),
            " " | "Spacebar" => Some(Key::Space),
            _ => None,
        }
    }
}

/// A single host input event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawInput {
    KeyDown {
        key: Key,
        /// Auto-repeat from a held key
        repeat: bool,
        timestamp_ms: f64,
    },
    KeyUp {
        key: Key,
        timestamp_ms: f64,
    },
    /// Mouse button or touch start
    PointerDown { x: f32, y: f32, timestamp_ms: f64 },
    /// Mouse or touch move
    PointerMove { x: f32, y: f32, timestamp_ms: f64 },
    /// Mouse button release or touch end
    PointerUp { timestamp_ms: f64 },
}

impl RawInput {
    pub fn timestamp_ms(&self) -> f64 {
        match *self {
            RawInput::KeyDown { timestamp_ms, .. }
            | RawInput::KeyUp { timestamp_ms, .. }
            | RawInput::PointerDown { timestamp_ms, .. }
            | RawInput::PointerMove { timestamp_ms, .. }
            | RawInput::PointerUp { timestamp_ms } => timestamp_ms,
        }
    }

    /// Pointer coordinates, if any
    pub fn position(&self) -> Option<(f32, f32)> {
        match *self {
            RawInput::PointerDown { x, y, .. } | RawInput::PointerMove { x, y, .. } => Some((x, y)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dom_key_mapping() {
        assert_eq!(Key::from_dom("ArrowUp"), Some(Key::Up));
        assert_eq!(Key::from_dom("W"), Some(Key::Up));
        assert_eq!(Key::from_dom("s"), Some(Key::Down));
        assert_eq!(Key::from_dom("d"), Some(Key::Right));
        assert_eq!(Key::from_dom(" "), Some(Key::Space));
        assert_eq!(Key::from_dom("Escape"), None);
    }
}
