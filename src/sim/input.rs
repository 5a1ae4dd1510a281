//! Two-button input model
//!
//! Platform handlers write key transitions into [`InputState`]; the level
//! loop samples it exactly once per tick.

/// Logical buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Hold / tap action (Space)
    Primary,
    /// Resistance (ArrowLeft)
    Directional,
}

impl Key {
    /// Map a DOM `KeyboardEvent.key` or `.code` value
    pub fn from_code(code: &str) -> Option<Key> {
        match code {
            " " | "Space" | "Spacebar" => Some(Key::Primary),
            "ArrowLeft" | "Left" => Some(Key::Directional),
            _ => None,
        }
    }
}

/// Input snapshot for one simulation tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickInput {
    /// Primary key currently held
    pub primary: bool,
    /// Directional key currently held
    pub directional: bool,
    /// Fresh primary presses since the previous sample
    pub taps: u32,
}

impl TickInput {
    pub fn held(primary: bool, directional: bool) -> Self {
        Self {
            primary,
            directional,
            taps: 0,
        }
    }

    pub fn tap() -> Self {
        Self {
            primary: true,
            directional: false,
            taps: 1,
        }
    }
}

/// Random per-tick inputs for property tests
#[cfg(test)]
pub(crate) mod arb {
    use proptest::prelude::*;

    use super::TickInput;

    /// Any key state with up to two fresh taps
    pub fn tick_input() -> impl Strategy<Value = TickInput> {
        (any::<bool>(), any::<bool>(), 0u32..3).prop_map(|(primary, directional, taps)| TickInput {
            primary: primary || taps > 0,
            directional,
            taps,
        })
    }

    /// A run of inputs, each with a frame delta of 0 to 100 ms
    pub fn ticks(max_len: usize) -> impl Strategy<Value = Vec<(TickInput, f32)>> {
        prop::collection::vec((tick_input(), 0.0f32..=100.0), 1..max_len)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InputState {
    primary: bool,
    directional: bool,
    pending_taps: u32,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key pressed. `repeat` is the platform's auto-repeat flag.
    pub fn key_down(&mut self, key: Key, repeat: bool) {
        match key {
            Key::Primary => {
                if !repeat && !self.primary {
                    self.pending_taps = self.pending_taps.saturating_add(1);
                }
                self.primary = true;
            }
            Key::Directional => self.directional = true,
        }
    }

    pub fn key_up(&mut self, key: Key) {
        match key {
            Key::Primary => self.primary = false,
            Key::Directional => self.directional = false,
        }
    }

    /// Release everything, e.g. when the window loses focus
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Snapshot held state and drain the tap counter
    pub fn sample(&mut self) -> TickInput {
        let taps = std::mem::take(&mut self.pending_taps);
        TickInput {
            primary: self.primary,
            directional: self.directional,
            taps,
        }
    }
}

/// Rising-edge detector owned by a level, fed once per tick
#[derive(Debug, Clone, Default)]
pub struct EdgeDetector {
    previous: bool,
}

impl EdgeDetector {
    /// True on a fresh press: held now but not last tick, or a tap was
    /// recorded in between samples
    pub fn pressed(&mut self, input: &TickInput) -> bool {
        let edge = (input.primary && !self.previous) || input.taps > 0;
        self.previous = input.primary;
        edge
    }

    pub fn previous(&self) -> bool {
        self.previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping() {
        assert_eq!(Key::from_code(" "), Some(Key::Primary));
        assert_eq!(Key::from_code("Space"), Some(Key::Primary));
        assert_eq!(Key::from_code("ArrowLeft"), Some(Key::Directional));
        assert_eq!(Key::from_code("ArrowRight"), None);
    }

    #[test]
    fn test_repeat_does_not_tap() {
        let mut input = InputState::new();
        input.key_down(Key::Primary, false);
        input.key_down(Key::Primary, true);
        input.key_down(Key::Primary, true);
        let s = input.sample();
        assert!(s.primary);
        assert_eq!(s.taps, 1);
    }

    #[test]
    fn test_sample_drains_taps() {
        let mut input = InputState::new();
        input.key_down(Key::Primary, false);
        input.key_up(Key::Primary);
        input.key_down(Key::Primary, false);
        input.key_up(Key::Primary);
        assert_eq!(input.sample().taps, 2);
        assert_eq!(input.sample().taps, 0);
    }

    #[test]
    fn test_edge_detector_fires_once_per_press() {
        let mut edge = EdgeDetector::default();
        let held = TickInput::held(true, false);
        assert!(edge.pressed(&held));
        assert!(!edge.pressed(&held));
        assert!(!edge.pressed(&TickInput::default()));
        assert!(edge.pressed(&held));
    }

    #[test]
    fn test_edge_detector_sees_tap_between_samples() {
        let mut edge = EdgeDetector::default();
        // Press and release both happened inside one frame
        let quick = TickInput {
            primary: false,
            directional: false,
            taps: 1,
        };
        assert!(edge.pressed(&quick));
    }
}
